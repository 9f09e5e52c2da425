//! Class id → plant/disease label table.
//!
//! The table is the coupling point with the deployed classifier: it must
//! match the labeling the model was trained with, and it is swapped as data
//! whenever the model is.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LabelError;

/// Class list shipped with the default PlantVillage classifier.
const BUILTIN_CLASS_LIST: &str = include_str!("../data/class_list.txt");

/// Separator between plant and disease in class list entries.
const CLASS_SEPARATOR: &str = "___";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassLabel {
    pub plant: String,
    pub disease: String,
}

impl ClassLabel {
    pub fn new(plant: impl Into<String>, disease: impl Into<String>) -> Self {
        Self {
            plant: plant.into(),
            disease: disease.into(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.disease.to_lowercase().contains("healthy")
    }
}

#[derive(Deserialize)]
struct LabelEntry {
    id: usize,
    plant: String,
    disease: String,
}

#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    labels: BTreeMap<usize, ClassLabel>,
}

impl LabelTable {
    /// Builds a table, rejecting duplicate ids and empty names.
    pub fn from_entries<I>(entries: I) -> Result<Self, LabelError>
    where
        I: IntoIterator<Item = (usize, ClassLabel)>,
    {
        let mut labels = BTreeMap::new();
        for (id, label) in entries {
            if label.plant.trim().is_empty() || label.disease.trim().is_empty() {
                return Err(LabelError::EmptyName(id));
            }
            if labels.insert(id, label).is_some() {
                return Err(LabelError::DuplicateId(id));
            }
        }
        Ok(Self { labels })
    }

    /// Parses a JSON array of `{"id", "plant", "disease"}` objects.
    pub fn from_json(text: &str) -> Result<Self, LabelError> {
        let entries: Vec<LabelEntry> = serde_json::from_str(text)?;
        Self::from_entries(
            entries
                .into_iter()
                .map(|e| (e.id, ClassLabel::new(e.plant, e.disease))),
        )
    }

    /// Parses a class list with one `Plant___Disease` label per line.
    ///
    /// The line index is the class id. Underscores in the plant name become
    /// spaces; the disease name is kept verbatim.
    pub fn from_class_list(text: &str) -> Result<Self, LabelError> {
        let mut entries = Vec::new();
        for (id, line) in text.trim_end().lines().enumerate() {
            let line = line.trim();
            let (plant, disease) =
                line.split_once(CLASS_SEPARATOR)
                    .ok_or_else(|| LabelError::MalformedLine {
                        line: id + 1,
                        content: line.to_string(),
                    })?;
            entries.push((id, ClassLabel::new(plant.replace('_', " "), disease.trim())));
        }
        Self::from_entries(entries)
    }

    /// Loads a table from disk; `.json` files are parsed as JSON, anything
    /// else as a class list.
    pub fn load(path: &Path) -> Result<Self, LabelError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| LabelError::Io(path.to_path_buf(), e))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&text),
            _ => Self::from_class_list(&text),
        }
    }

    pub fn builtin() -> Result<Self, LabelError> {
        Self::from_class_list(BUILTIN_CLASS_LIST)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &ClassLabel)> {
        self.labels.iter().map(|(id, label)| (*id, label))
    }
}

/// Resolves classifier output ids to labels. No fuzzy matching.
#[derive(Debug, Clone)]
pub struct LabelResolver {
    table: LabelTable,
}

impl LabelResolver {
    pub fn new(table: LabelTable) -> Self {
        Self { table }
    }

    pub fn resolve(&self, class_id: usize) -> Result<&ClassLabel, LabelError> {
        self.table
            .labels
            .get(&class_id)
            .ok_or(LabelError::UnknownClass { class_id })
    }

    pub fn table(&self) -> &LabelTable {
        &self.table
    }
}
