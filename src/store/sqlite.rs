use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use super::{sample_diseases, sample_pesticides, DiseaseInfoStore, PesticideStore};
use crate::disease_info::DiseaseInfo;
use crate::error::StoreError;
use crate::recommend::PesticideRecord;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS pesticides (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    type TEXT NOT NULL,
    target_disease TEXT NOT NULL,
    target_plant TEXT,
    active_ingredient TEXT,
    application_rate TEXT,
    price REAL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS diseases (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    plant_name TEXT NOT NULL,
    disease_name TEXT NOT NULL,
    symptoms TEXT,
    treatment TEXT,
    prevention TEXT,
    severity TEXT
);
";

const PESTICIDE_COLUMNS: &str =
    "name, type, active_ingredient, application_rate, price, description";

/// Curated store backed by a SQLite file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        info!("Opening SQLite database at {}", path.display());
        let conn = Connection::open(path)?;
        Self::with_schema(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        debug!("Opening in-memory SQLite database");
        Self::with_schema(Connection::open_in_memory()?)
    }

    fn with_schema(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError>,
    {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&mut conn)
    }

    /// Inserts the sample pesticide and disease rows. Rows already present
    /// are left alone, so seeding twice is harmless.
    pub fn seed(&self) -> Result<SeedSummary, StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut summary = SeedSummary::default();

            for p in sample_pesticides() {
                summary.pesticides += tx.execute(
                    "INSERT INTO pesticides (name, type, target_disease, target_plant, active_ingredient, application_rate, price, description)
                     SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8
                     WHERE NOT EXISTS (
                         SELECT 1 FROM pesticides WHERE name = ?1 AND target_disease = ?3 AND target_plant = ?4
                     )",
                    params![
                        p.record.name,
                        p.record.kind,
                        p.target_disease,
                        p.target_plant,
                        p.record.active_ingredient,
                        p.record.application_rate,
                        p.record.price,
                        p.record.description,
                    ],
                )?;
            }

            for d in sample_diseases() {
                summary.diseases += tx.execute(
                    "INSERT INTO diseases (plant_name, disease_name, symptoms, treatment, prevention, severity)
                     SELECT ?1, ?2, ?3, ?4, ?5, ?6
                     WHERE NOT EXISTS (
                         SELECT 1 FROM diseases WHERE plant_name = ?1 AND disease_name = ?2
                     )",
                    params![
                        d.plant,
                        d.disease,
                        d.info.symptoms,
                        d.info.treatment,
                        d.info.prevention,
                        d.severity,
                    ],
                )?;
            }

            tx.commit()?;
            info!(
                "Seeded {} pesticides and {} diseases",
                summary.pesticides, summary.diseases
            );
            Ok(summary)
        })
    }
}

/// Number of rows inserted by [`SqliteStore::seed`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SeedSummary {
    pub pesticides: usize,
    pub diseases: usize,
}

fn row_to_pesticide(row: &Row<'_>) -> rusqlite::Result<PesticideRecord> {
    Ok(PesticideRecord {
        name: row.get(0)?,
        kind: row.get(1)?,
        active_ingredient: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        application_rate: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        price: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
        description: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
    })
}

impl PesticideStore for SqliteStore {
    fn query_by_plant_or_disease(
        &self,
        plant: &str,
        disease: &str,
    ) -> Result<Vec<PesticideRecord>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PESTICIDE_COLUMNS} FROM pesticides
                 WHERE target_plant = ?1 OR target_disease = ?2
                 ORDER BY price ASC"
            ))?;
            let rows = stmt.query_map(params![plant, disease], row_to_pesticide)?;
            let records = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
    }

    fn list_pesticides(&self) -> Result<Vec<PesticideRecord>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PESTICIDE_COLUMNS} FROM pesticides ORDER BY id"
            ))?;
            let rows = stmt.query_map([], row_to_pesticide)?;
            let records = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
    }
}

impl DiseaseInfoStore for SqliteStore {
    fn lookup(&self, plant: &str, disease: &str) -> Result<Option<DiseaseInfo>, StoreError> {
        self.with_conn(|conn| {
            let info = conn
                .query_row(
                    "SELECT symptoms, treatment, prevention FROM diseases
                     WHERE plant_name = ?1 AND disease_name = ?2",
                    params![plant, disease],
                    |row| {
                        Ok(DiseaseInfo::new(
                            row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                            row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                            row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                        ))
                    },
                )
                .optional()?;
            Ok(info)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_database_returns_nothing() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store
            .query_by_plant_or_disease("tomato", "early_blight")
            .unwrap()
            .is_empty());
        assert!(store.lookup("tomato", "early_blight").unwrap().is_none());
    }

    #[test]
    fn seeding_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = store.seed().unwrap();
        assert_eq!(first, SeedSummary { pesticides: 3, diseases: 3 });

        let second = store.seed().unwrap();
        assert_eq!(second, SeedSummary::default());
        assert_eq!(store.list_pesticides().unwrap().len(), 3);
    }

    #[test]
    fn query_orders_by_price_and_uses_or_semantics() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.seed().unwrap();

        let tomato = store.query_by_plant_or_disease("tomato", "late_blight").unwrap();
        let names: Vec<_> = tomato.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Mancozeb", "Copper Hydroxide", "Metalaxyl + Mancozeb"]);
        assert!(tomato.windows(2).all(|w| w[0].price <= w[1].price));
    }

    #[test]
    fn disease_lookup_reads_seeded_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.seed().unwrap();

        let info = store.lookup("tomato", "early_blight").unwrap().unwrap();
        assert_eq!(info.symptoms, "Brown spots with concentric rings");
        assert_eq!(info.prevention, "Ensure good air circulation");
    }

    #[test]
    fn null_disease_columns_never_reach_the_caller_blank() {
        use std::sync::Arc;

        use crate::disease_info::{BuiltinDiseaseInfo, DiseaseInfoLookup};

        let store = SqliteStore::open_in_memory().unwrap();
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO diseases (plant_name, disease_name) VALUES ('grape', 'black_rot')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        let raw = store.lookup("grape", "black_rot").unwrap().unwrap();
        assert!(raw.symptoms.is_empty());

        let lookup = DiseaseInfoLookup::new(Arc::new(store), BuiltinDiseaseInfo::builtin().unwrap());
        let info = lookup.describe("Grape", "Black_rot");
        assert_eq!(info.symptoms, "Symptoms of Black_rot in Grape");
        assert!(!info.treatment.is_empty());
        assert!(!info.prevention.is_empty());
    }

    #[test]
    fn file_backed_store_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agri_ai.db");

        SqliteStore::open(&path).unwrap().seed().unwrap();
        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.list_pesticides().unwrap().len(), 3);
    }
}
