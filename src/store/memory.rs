use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{sample_diseases, sample_pesticides, CuratedDisease, CuratedPesticide, DiseaseInfoStore, PesticideStore};
use crate::disease_info::DiseaseInfo;
use crate::error::StoreError;
use crate::recommend::PesticideRecord;

/// In-process curated store.
#[derive(Default)]
pub struct MemoryStore {
    pesticides: Mutex<Vec<CuratedPesticide>>,
    diseases: Mutex<HashMap<(String, String), DiseaseInfo>>,
}

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    m.lock().map_err(|_| StoreError::Poisoned)
}

impl MemoryStore {
    /// A store pre-filled with the sample reference rows.
    pub fn seeded() -> Self {
        Self {
            pesticides: Mutex::new(sample_pesticides()),
            diseases: Mutex::new(
                sample_diseases()
                    .into_iter()
                    .map(|d| ((d.plant, d.disease), d.info))
                    .collect(),
            ),
        }
    }

    pub fn insert_pesticide(&self, pesticide: CuratedPesticide) -> Result<(), StoreError> {
        lock(&self.pesticides)?.push(pesticide);
        Ok(())
    }

    pub fn insert_disease(&self, disease: CuratedDisease) -> Result<(), StoreError> {
        lock(&self.diseases)?.insert((disease.plant, disease.disease), disease.info);
        Ok(())
    }
}

impl PesticideStore for MemoryStore {
    fn query_by_plant_or_disease(
        &self,
        plant: &str,
        disease: &str,
    ) -> Result<Vec<PesticideRecord>, StoreError> {
        let rows = lock(&self.pesticides)?;
        let mut matched: Vec<PesticideRecord> = rows
            .iter()
            .filter(|p| p.target_plant == plant || p.target_disease == disease)
            .map(|p| p.record.clone())
            .collect();
        matched.sort_by(|a, b| a.price.total_cmp(&b.price));
        Ok(matched)
    }

    fn list_pesticides(&self) -> Result<Vec<PesticideRecord>, StoreError> {
        let rows = lock(&self.pesticides)?;
        Ok(rows.iter().map(|p| p.record.clone()).collect())
    }
}

impl DiseaseInfoStore for MemoryStore {
    fn lookup(&self, plant: &str, disease: &str) -> Result<Option<DiseaseInfo>, StoreError> {
        let rows = lock(&self.diseases)?;
        Ok(rows.get(&(plant.to_string(), disease.to_string())).cloned())
    }
}
