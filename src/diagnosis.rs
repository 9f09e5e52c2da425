//! Image → diagnosis orchestration.
//!
//! [`DiagnosisAssembler`] is the single entry point the HTTP boundary and
//! the CLI call. Collaborators are injected at construction; the assembler
//! itself holds no per-request state.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::decoder::{ImageDecoder, ImageTensor};
use crate::disease_info::{DiseaseInfo, DiseaseInfoLookup};
use crate::error::{ClassifierError, DiagnosisError};
use crate::labels::{ClassLabel, LabelResolver};
use crate::model::{argmax, Classifier};
use crate::recommend::{PesticideRecord, RecommendationLookup};

/// Confidence range sampled for synthetic diagnoses, in percent.
const SYNTHETIC_CONFIDENCE: std::ops::RangeInclusive<f64> = 75.0..=95.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    pub plant: String,
    pub disease: String,
    /// Percentage in `[0, 100]`, two decimals.
    pub confidence: f64,
    pub is_healthy: bool,
    #[serde(rename = "disease_info")]
    pub symptoms: String,
    pub treatment: String,
    pub prevention: String,
    #[serde(rename = "recommended_pesticides")]
    pub pesticides: Vec<PesticideRecord>,
    /// Set when the result was substituted in degraded mode.
    #[serde(default)]
    pub synthetic: bool,
}

struct ExampleDiagnosis {
    plant: &'static str,
    disease: &'static str,
    symptoms: &'static str,
    treatment: &'static str,
    prevention: &'static str,
}

const EXAMPLE_DIAGNOSES: [ExampleDiagnosis; 3] = [
    ExampleDiagnosis {
        plant: "Tomato",
        disease: "Early_blight",
        symptoms: "Brown spots with concentric rings on leaves",
        treatment: "Apply fungicides containing chlorothalonil or mancozeb",
        prevention: "Ensure proper plant spacing and avoid overhead watering",
    },
    ExampleDiagnosis {
        plant: "Potato",
        disease: "Late_blight",
        symptoms: "Dark water-soaked lesions on leaves and stems",
        treatment: "Apply systemic fungicides like metalaxyl",
        prevention: "Plant resistant varieties and ensure good drainage",
    },
    ExampleDiagnosis {
        plant: "Apple",
        disease: "Apple_scab",
        symptoms: "Olive-green to black spots on leaves and fruit",
        treatment: "Apply fungicides during wet weather periods",
        prevention: "Remove fallen leaves and improve air circulation",
    },
];

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub struct DiagnosisAssembler {
    decoder: ImageDecoder,
    classifier: Option<Arc<dyn Classifier>>,
    labels: LabelResolver,
    recommendations: RecommendationLookup,
    disease_info: DiseaseInfoLookup,
    degraded_fallback: bool,
}

impl DiagnosisAssembler {
    /// An assembler with no classifier; call [`Self::with_classifier`] to
    /// attach one.
    pub fn new(
        labels: LabelResolver,
        recommendations: RecommendationLookup,
        disease_info: DiseaseInfoLookup,
    ) -> Self {
        Self {
            decoder: ImageDecoder::default(),
            classifier: None,
            labels,
            recommendations,
            disease_info,
            degraded_fallback: true,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_decoder(mut self, decoder: ImageDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Whether an unavailable classifier is replaced by a synthetic result.
    pub fn with_degraded_fallback(mut self, enabled: bool) -> Self {
        self.degraded_fallback = enabled;
        self
    }

    pub fn decoder(&self) -> &ImageDecoder {
        &self.decoder
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    /// Validates, decodes and diagnoses an upload.
    pub fn diagnose_upload(
        &self,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<DiagnosisResult, DiagnosisError> {
        self.decoder.check_upload(content_type, bytes.len())?;
        let tensor = self.decoder.decode(bytes)?;
        self.assemble(&tensor)
    }

    pub fn assemble(&self, tensor: &ImageTensor) -> Result<DiagnosisResult, DiagnosisError> {
        self.assemble_with(tensor, &mut rand::thread_rng())
    }

    /// Like [`Self::assemble`] with an explicit random source for degraded mode.
    pub fn assemble_with<R: Rng + ?Sized>(
        &self,
        tensor: &ImageTensor,
        rng: &mut R,
    ) -> Result<DiagnosisResult, DiagnosisError> {
        let probabilities = match self.classify(tensor) {
            Ok(probabilities) => probabilities,
            Err(ClassifierError::Unavailable) if self.degraded_fallback => {
                warn!("Classifier unavailable, returning synthetic diagnosis");
                return self.synthesize(rng);
            }
            Err(e) => return Err(DiagnosisError::InferenceUnavailable(e)),
        };

        let (class_id, probability) =
            argmax(&probabilities).map_err(DiagnosisError::InferenceUnavailable)?;

        let label = self.labels.resolve(class_id).map_err(|e| {
            error!(
                "Classifier emitted class {} outside the label table ({} entries); model and label table versions disagree",
                class_id,
                self.labels.table().len()
            );
            DiagnosisError::UnrecognizedClass(e)
        })?;

        let is_healthy = label.is_healthy();
        let info = self.disease_info.describe(&label.plant, &label.disease);
        let pesticides = if is_healthy {
            Vec::new()
        } else {
            self.recommendations
                .recommend(&label.plant, &label.disease)
                .map_err(DiagnosisError::RecommendationUnavailable)?
        };

        debug!(
            "Diagnosed {} / {} (class {}, p={:.4})",
            label.plant, label.disease, class_id, probability
        );

        Ok(DiagnosisResult {
            plant: label.plant.clone(),
            disease: label.disease.clone(),
            confidence: round2(probability as f64 * 100.0),
            is_healthy,
            symptoms: info.symptoms,
            treatment: info.treatment,
            prevention: info.prevention,
            pesticides,
            synthetic: false,
        })
    }

    fn classify(&self, tensor: &ImageTensor) -> Result<Vec<f32>, ClassifierError> {
        match &self.classifier {
            Some(classifier) => classifier.infer(tensor),
            None => Err(ClassifierError::Unavailable),
        }
    }

    fn synthesize<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<DiagnosisResult, DiagnosisError> {
        let example = EXAMPLE_DIAGNOSES
            .choose(rng)
            .unwrap_or(&EXAMPLE_DIAGNOSES[0]);
        let confidence = round2(rng.gen_range(SYNTHETIC_CONFIDENCE));
        let info = DiseaseInfo::new(example.symptoms, example.treatment, example.prevention);

        let is_healthy = ClassLabel::new(example.plant, example.disease).is_healthy();
        let pesticides = if is_healthy {
            Vec::new()
        } else {
            self.recommendations
                .recommend(example.plant, example.disease)
                .map_err(DiagnosisError::RecommendationUnavailable)?
        };

        Ok(DiagnosisResult {
            plant: example.plant.to_string(),
            disease: example.disease.to_string(),
            confidence,
            is_healthy,
            symptoms: info.symptoms,
            treatment: info.treatment,
            prevention: info.prevention,
            pesticides,
            synthetic: true,
        })
    }
}
