//! Pesticide recommendations for a diagnosed plant/disease pair.
//!
//! The curated store is queried first; when it has nothing to say (or is
//! unreachable, depending on [`StoreErrorPolicy`]) the built-in default
//! table keyed by normalized disease name is used instead.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, StoreError};
use crate::store::PesticideStore;

const BUILTIN_DEFAULT_PESTICIDES: &str = include_str!("../data/default_pesticides.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PesticideRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub active_ingredient: String,
    pub application_rate: String,
    pub price: f64,
    pub description: String,
}

/// Lookup key for the default tables: lowercased, spaces become underscores.
pub fn disease_key(disease: &str) -> String {
    disease.to_lowercase().replace(' ', "_")
}

/// What to do when the curated store fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum StoreErrorPolicy {
    /// Log and continue with the default table.
    #[default]
    Fallback,
    /// Fail the request.
    Fail,
}

/// Default recommendations, in declared order per disease key.
#[derive(Debug, Clone, Default)]
pub struct DefaultPesticideTable {
    entries: HashMap<String, Vec<PesticideRecord>>,
}

impl DefaultPesticideTable {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let raw: HashMap<String, Vec<PesticideRecord>> = serde_json::from_str(text)?;
        let entries = raw
            .into_iter()
            .map(|(key, records)| (disease_key(&key), records))
            .collect();
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_json(&text).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_json(BUILTIN_DEFAULT_PESTICIDES)
            .map_err(|e| ConfigError::Parse("default_pesticides.json".into(), e))
    }

    /// Records for a disease name; unknown diseases yield an empty list.
    pub fn get(&self, disease: &str) -> Vec<PesticideRecord> {
        self.entries
            .get(&disease_key(disease))
            .cloned()
            .unwrap_or_default()
    }
}

pub struct RecommendationLookup {
    store: Arc<dyn PesticideStore>,
    defaults: DefaultPesticideTable,
    policy: StoreErrorPolicy,
}

impl RecommendationLookup {
    pub fn new(
        store: Arc<dyn PesticideStore>,
        defaults: DefaultPesticideTable,
        policy: StoreErrorPolicy,
    ) -> Self {
        Self {
            store,
            defaults,
            policy,
        }
    }

    /// Ranked pesticides for a plant/disease pair.
    ///
    /// Curated matches (same plant OR same disease) come back cheapest first.
    /// Only a store failure under [`StoreErrorPolicy::Fail`] is an error.
    pub fn recommend(&self, plant: &str, disease: &str) -> Result<Vec<PesticideRecord>, StoreError> {
        let plant = plant.to_lowercase();
        let disease_lower = disease.to_lowercase();

        match self.store.query_by_plant_or_disease(&plant, &disease_lower) {
            Ok(mut records) if !records.is_empty() => {
                records.sort_by(|a, b| a.price.total_cmp(&b.price));
                debug!("{} curated pesticides for {}/{}", records.len(), plant, disease_lower);
                return Ok(records);
            }
            Ok(_) => {}
            Err(e) => match self.policy {
                StoreErrorPolicy::Fail => return Err(e),
                StoreErrorPolicy::Fallback => {
                    warn!("Pesticide store unavailable, using default table: {}", e);
                }
            },
        }

        Ok(self.defaults.get(disease))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CuratedPesticide, MemoryStore};

    struct BrokenStore;

    impl PesticideStore for BrokenStore {
        fn query_by_plant_or_disease(
            &self,
            _plant: &str,
            _disease: &str,
        ) -> Result<Vec<PesticideRecord>, StoreError> {
            Err(StoreError::Poisoned)
        }

        fn list_pesticides(&self) -> Result<Vec<PesticideRecord>, StoreError> {
            Err(StoreError::Poisoned)
        }
    }

    fn record(name: &str, price: f64) -> PesticideRecord {
        PesticideRecord {
            name: name.into(),
            kind: "Fungicide".into(),
            active_ingredient: String::new(),
            application_rate: String::new(),
            price,
            description: String::new(),
        }
    }

    fn lookup(store: Arc<dyn PesticideStore>, policy: StoreErrorPolicy) -> RecommendationLookup {
        RecommendationLookup::new(store, DefaultPesticideTable::builtin().unwrap(), policy)
    }

    #[test]
    fn disease_key_normalizes_case_and_spaces() {
        assert_eq!(disease_key("Early blight"), "early_blight");
        assert_eq!(disease_key("Late_Blight"), "late_blight");
    }

    #[test]
    fn empty_store_falls_back_to_default_table_order() {
        let lookup = lookup(Arc::new(MemoryStore::default()), StoreErrorPolicy::Fallback);
        let recs = lookup.recommend("tomato", "early_blight").unwrap();
        let names: Vec<_> = recs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Mancozeb 75% WP", "Chlorothalonil 75% WP"]);
    }

    #[test]
    fn default_table_accepts_spaced_names() {
        let lookup = lookup(Arc::new(MemoryStore::default()), StoreErrorPolicy::Fallback);
        let recs = lookup.recommend("Potato", "Late blight").unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].kind, "Systemic Fungicide");
    }

    #[test]
    fn unknown_disease_yields_empty_list() {
        let lookup = lookup(Arc::new(MemoryStore::default()), StoreErrorPolicy::Fallback);
        assert!(lookup.recommend("Grape", "Esca_(Black_Measles)").unwrap().is_empty());
    }

    #[test]
    fn curated_results_are_cheapest_first_and_match_plant_or_disease() {
        let store = MemoryStore::default();
        store.insert_pesticide(CuratedPesticide::new("tomato", "leaf_mold", record("C", 300.0))).unwrap();
        store.insert_pesticide(CuratedPesticide::new("potato", "early_blight", record("A", 90.5))).unwrap();
        store.insert_pesticide(CuratedPesticide::new("grape", "black_rot", record("X", 1.0))).unwrap();
        store.insert_pesticide(CuratedPesticide::new("tomato", "bacterial_spot", record("B", 120.0))).unwrap();

        let lookup = lookup(Arc::new(store), StoreErrorPolicy::Fallback);
        let recs = lookup.recommend("Tomato", "Early_blight").unwrap();

        let names: Vec<_> = recs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);
        assert!(recs.windows(2).all(|w| w[0].price <= w[1].price));
    }

    #[test]
    fn store_failure_policy_controls_fallback() {
        let fallback = lookup(Arc::new(BrokenStore), StoreErrorPolicy::Fallback);
        assert_eq!(fallback.recommend("Potato", "Late_blight").unwrap().len(), 1);

        let strict = lookup(Arc::new(BrokenStore), StoreErrorPolicy::Fail);
        assert!(strict.recommend("Potato", "Late_blight").is_err());
    }
}
