//! Command-line / environment configuration shared by both binaries, and the
//! startup wiring that turns it into a ready [`DiagnosisAssembler`].

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, ValueEnum};
use tracing::{info, warn};

use crate::decoder::{ImageDecoder, INPUT_SIZE};
use crate::diagnosis::DiagnosisAssembler;
use crate::disease_info::{BuiltinDiseaseInfo, DiseaseInfoLookup};
use crate::error::ConfigError;
use crate::labels::{LabelResolver, LabelTable};
use crate::model::Classifier;
use crate::recommend::{DefaultPesticideTable, RecommendationLookup, StoreErrorPolicy};
use crate::store::{DiseaseInfoStore, PesticideStore};
use crate::utils::ensure_file;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierMode {
    /// Run the TensorFlow model.
    #[default]
    Real,
    /// Never load a model; every diagnosis is synthetic.
    Mock,
}

/// Settings for the image → diagnosis pipeline.
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    /// Whether to run the real classifier or synthetic diagnoses only
    #[arg(long, env = "CLASSIFIER_MODE", value_enum, default_value_t = ClassifierMode::Real)]
    pub classifier_mode: ClassifierMode,

    /// Frozen TensorFlow graph
    #[arg(long, env = "MODEL_PATH", default_value = "./model/frozen_graph.pb")]
    pub model_path: PathBuf,

    /// Downloaded to --model-path when the file is missing
    #[arg(long, env = "MODEL_URL")]
    pub model_url: Option<String>,

    /// Label table (.json or one `Plant___Disease` per line); built-in table when unset
    #[arg(long, env = "CLASS_LIST_PATH")]
    pub labels_path: Option<PathBuf>,

    /// Downloaded to --labels-path when the file is missing
    #[arg(long, env = "CLASS_LIST_URL")]
    pub labels_url: Option<String>,

    /// Graph operation fed with the image tensor
    #[arg(long, default_value = "x")]
    pub input_op: String,

    /// Graph operation holding class probabilities
    #[arg(long, default_value = "Identity")]
    pub output_op: String,

    /// Substitute a synthetic diagnosis when no classifier is loaded
    #[arg(long, env = "DEGRADED_FALLBACK", default_value_t = true, action = clap::ArgAction::Set)]
    pub degraded_fallback: bool,

    /// Behaviour when the curated pesticide store fails
    #[arg(long, env = "STORE_ERROR_POLICY", value_enum, default_value_t = StoreErrorPolicy::Fallback)]
    pub store_error_policy: StoreErrorPolicy,

    /// Override for the built-in default pesticide table (JSON)
    #[arg(long, env = "DEFAULT_PESTICIDES_PATH")]
    pub default_pesticides_path: Option<PathBuf>,

    /// Override for the built-in disease info table (JSON)
    #[arg(long, env = "DISEASE_INFO_PATH")]
    pub disease_info_path: Option<PathBuf>,

    /// Upload size limit in MiB
    #[arg(
        long,
        env = "MAX_UPLOAD_MB",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..=MAX_UPLOAD_MB_CAP)
    )]
    pub max_upload_mb: u64,
}

const MAX_UPLOAD_MB_CAP: u64 = 1024;

impl PipelineArgs {
    pub fn max_upload_bytes(&self) -> usize {
        usize::try_from(self.max_upload_mb)
            .unwrap_or(usize::MAX)
            .saturating_mul(1024 * 1024)
    }

    /// Fetches missing model artefacts, then loads the classifier.
    ///
    /// Returns `None` in mock mode or when the model cannot be loaded; the
    /// assembler then runs in degraded mode.
    pub async fn load_classifier(&self) -> Option<Arc<dyn Classifier>> {
        if self.classifier_mode == ClassifierMode::Mock {
            info!("Classifier mode is mock; diagnoses will be synthetic");
            return None;
        }

        if let Some(url) = &self.model_url {
            if let Err(e) = ensure_file(&self.model_path, url).await {
                warn!("Could not fetch model: {:#}", e);
            }
        }

        self.load_model()
    }

    #[cfg(feature = "tensorflow")]
    fn load_model(&self) -> Option<Arc<dyn Classifier>> {
        use crate::model::TensorflowClassifier;

        match TensorflowClassifier::load(&self.model_path, &self.input_op, &self.output_op) {
            Ok(model) => Some(Arc::new(model)),
            Err(e) => {
                tracing::error!("Failed to load classifier: {}", e);
                None
            }
        }
    }

    #[cfg(not(feature = "tensorflow"))]
    fn load_model(&self) -> Option<Arc<dyn Classifier>> {
        warn!("Built without the `tensorflow` feature; no classifier available");
        None
    }

    /// Loads the label table, downloading it first when a URL is configured.
    pub async fn load_labels(&self) -> Result<LabelTable, ConfigError> {
        let Some(path) = &self.labels_path else {
            return Ok(LabelTable::builtin()?);
        };

        if let Some(url) = &self.labels_url {
            if let Err(e) = ensure_file(path, url).await {
                warn!("Could not fetch label table: {:#}", e);
            }
        }

        let table = LabelTable::load(path)?;
        info!("Loaded {} labels from {}", table.len(), path.display());
        Ok(table)
    }

    /// Wires the assembler from its collaborators.
    pub fn build_assembler(
        &self,
        labels: LabelTable,
        classifier: Option<Arc<dyn Classifier>>,
        pesticides: Arc<dyn PesticideStore>,
        diseases: Arc<dyn DiseaseInfoStore>,
    ) -> Result<DiagnosisAssembler, ConfigError> {
        let defaults = match &self.default_pesticides_path {
            Some(path) => DefaultPesticideTable::load(path)?,
            None => DefaultPesticideTable::builtin()?,
        };
        let builtin_info = match &self.disease_info_path {
            Some(path) => BuiltinDiseaseInfo::load(path)?,
            None => BuiltinDiseaseInfo::builtin()?,
        };

        let assembler = DiagnosisAssembler::new(
            LabelResolver::new(labels),
            RecommendationLookup::new(pesticides, defaults, self.store_error_policy),
            DiseaseInfoLookup::new(diseases, builtin_info),
        )
        .with_decoder(ImageDecoder::new(INPUT_SIZE, self.max_upload_bytes()))
        .with_degraded_fallback(self.degraded_fallback);

        Ok(match classifier {
            Some(classifier) => assembler.with_classifier(classifier),
            None => assembler,
        })
    }
}
