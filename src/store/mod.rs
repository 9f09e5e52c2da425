//! Curated reference data: pesticides and disease descriptions.
//!
//! The pipeline only sees the [`PesticideStore`] and [`DiseaseInfoStore`]
//! traits. [`SqliteStore`] backs the server; [`MemoryStore`] serves the CLI
//! when no database is configured.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{SeedSummary, SqliteStore};

use crate::disease_info::DiseaseInfo;
use crate::error::StoreError;
use crate::recommend::PesticideRecord;

pub trait PesticideStore: Send + Sync {
    /// Records whose target plant equals `plant` OR whose target disease
    /// equals `disease`, cheapest first. Both arguments are lowercase.
    fn query_by_plant_or_disease(
        &self,
        plant: &str,
        disease: &str,
    ) -> Result<Vec<PesticideRecord>, StoreError>;

    fn list_pesticides(&self) -> Result<Vec<PesticideRecord>, StoreError>;
}

pub trait DiseaseInfoStore: Send + Sync {
    /// Curated description for a lowercase plant/disease pair.
    fn lookup(&self, plant: &str, disease: &str) -> Result<Option<DiseaseInfo>, StoreError>;
}

/// A pesticide row together with the plant and disease it targets.
#[derive(Debug, Clone, PartialEq)]
pub struct CuratedPesticide {
    pub target_plant: String,
    pub target_disease: String,
    pub record: PesticideRecord,
}

impl CuratedPesticide {
    pub fn new(
        target_plant: impl Into<String>,
        target_disease: impl Into<String>,
        record: PesticideRecord,
    ) -> Self {
        Self {
            target_plant: target_plant.into(),
            target_disease: target_disease.into(),
            record,
        }
    }
}

/// A disease description row keyed by lowercase plant and disease.
#[derive(Debug, Clone, PartialEq)]
pub struct CuratedDisease {
    pub plant: String,
    pub disease: String,
    pub severity: String,
    pub info: DiseaseInfo,
}

fn pesticide(
    name: &str,
    kind: &str,
    active_ingredient: &str,
    application_rate: &str,
    price: f64,
    description: &str,
) -> PesticideRecord {
    PesticideRecord {
        name: name.to_string(),
        kind: kind.to_string(),
        active_ingredient: active_ingredient.to_string(),
        application_rate: application_rate.to_string(),
        price,
        description: description.to_string(),
    }
}

/// Sample pesticide rows inserted by `seed`.
pub fn sample_pesticides() -> Vec<CuratedPesticide> {
    vec![
        CuratedPesticide::new(
            "tomato",
            "bacterial_spot",
            pesticide(
                "Copper Hydroxide",
                "Bactericide",
                "Copper Hydroxide 53.8%",
                "2-3g/L",
                250.0,
                "Effective against bacterial diseases",
            ),
        ),
        CuratedPesticide::new(
            "tomato",
            "early_blight",
            pesticide(
                "Mancozeb",
                "Fungicide",
                "Mancozeb 75%",
                "2g/L",
                180.0,
                "Broad spectrum fungicide",
            ),
        ),
        CuratedPesticide::new(
            "potato",
            "late_blight",
            pesticide(
                "Metalaxyl + Mancozeb",
                "Fungicide",
                "Metalaxyl 8% + Mancozeb 64%",
                "2.5g/L",
                320.0,
                "Systemic fungicide",
            ),
        ),
    ]
}

/// Sample disease rows inserted by `seed`.
pub fn sample_diseases() -> Vec<CuratedDisease> {
    let row = |plant: &str, disease: &str, symptoms: &str, treatment: &str, prevention: &str, severity: &str| {
        CuratedDisease {
            plant: plant.to_string(),
            disease: disease.to_string(),
            severity: severity.to_string(),
            info: DiseaseInfo::new(symptoms, treatment, prevention),
        }
    };

    vec![
        row(
            "tomato",
            "bacterial_spot",
            "Small dark spots on leaves",
            "Apply copper-based bactericides",
            "Avoid overhead watering",
            "medium",
        ),
        row(
            "tomato",
            "early_blight",
            "Brown spots with concentric rings",
            "Apply fungicides regularly",
            "Ensure good air circulation",
            "high",
        ),
        row(
            "potato",
            "late_blight",
            "Dark lesions on leaves",
            "Apply systemic fungicides",
            "Plant resistant varieties",
            "high",
        ),
    ]
}
