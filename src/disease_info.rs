//! Symptom, treatment and prevention text for a diagnosis.
//!
//! Lookup order: curated store, then the built-in table keyed by normalized
//! disease name, then deterministic boilerplate. The result is never empty.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;
use crate::recommend::disease_key;
use crate::store::DiseaseInfoStore;

const BUILTIN_DISEASE_INFO: &str = include_str!("../data/disease_info.json");

pub const DEFAULT_TREATMENT: &str =
    "Apply recommended pesticides and follow good agricultural practices";
pub const DEFAULT_PREVENTION: &str = "Maintain proper plant spacing and avoid overhead watering";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseaseInfo {
    pub symptoms: String,
    pub treatment: String,
    pub prevention: String,
}

impl DiseaseInfo {
    pub fn new(
        symptoms: impl Into<String>,
        treatment: impl Into<String>,
        prevention: impl Into<String>,
    ) -> Self {
        Self {
            symptoms: symptoms.into(),
            treatment: treatment.into(),
            prevention: prevention.into(),
        }
    }

    /// Boilerplate used when no curated entry exists.
    pub fn synthesize(plant: &str, disease: &str) -> Self {
        Self::new(
            format!("Symptoms of {disease} in {plant}"),
            DEFAULT_TREATMENT,
            DEFAULT_PREVENTION,
        )
    }

    /// Copies each field of `other` over a blank field of `self`.
    fn fill_blanks(&mut self, other: &DiseaseInfo) {
        for (field, source) in [
            (&mut self.symptoms, &other.symptoms),
            (&mut self.treatment, &other.treatment),
            (&mut self.prevention, &other.prevention),
        ] {
            if field.trim().is_empty() {
                field.clone_from(source);
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuiltinDiseaseInfo {
    entries: HashMap<String, DiseaseInfo>,
}

impl BuiltinDiseaseInfo {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let raw: HashMap<String, DiseaseInfo> = serde_json::from_str(text)?;
        Ok(Self {
            entries: raw
                .into_iter()
                .map(|(key, info)| (disease_key(&key), info))
                .collect(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_json(&text).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_json(BUILTIN_DISEASE_INFO)
            .map_err(|e| ConfigError::Parse("disease_info.json".into(), e))
    }

    pub fn get(&self, disease: &str) -> Option<&DiseaseInfo> {
        self.entries.get(&disease_key(disease))
    }
}

pub struct DiseaseInfoLookup {
    store: Arc<dyn DiseaseInfoStore>,
    builtin: BuiltinDiseaseInfo,
}

impl DiseaseInfoLookup {
    pub fn new(store: Arc<dyn DiseaseInfoStore>, builtin: BuiltinDiseaseInfo) -> Self {
        Self { store, builtin }
    }

    pub fn describe(&self, plant: &str, disease: &str) -> DiseaseInfo {
        let mut info = match self.store.lookup(&plant.to_lowercase(), &disease.to_lowercase()) {
            Ok(Some(info)) => info,
            Ok(None) => DiseaseInfo::default(),
            Err(e) => {
                warn!("Disease info store unavailable: {}", e);
                DiseaseInfo::default()
            }
        };

        // Curated rows may carry NULL columns; fill field by field.
        if let Some(builtin) = self.builtin.get(disease) {
            info.fill_blanks(builtin);
        }
        info.fill_blanks(&DiseaseInfo::synthesize(plant, disease));
        info
    }
}
