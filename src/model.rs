//! Classifier collaborators.
//!
//! The pretrained model is a black box behind [`Classifier`]: it takes the
//! decoded `[1, 224, 224, 3]` tensor and returns one probability per class.

use crate::decoder::ImageTensor;
use crate::error::ClassifierError;

pub trait Classifier: Send + Sync {
    fn infer(&self, tensor: &ImageTensor) -> Result<Vec<f32>, ClassifierError>;
}

/// Index and value of the highest probability. NaN entries are skipped.
pub fn argmax(probabilities: &[f32]) -> Result<(usize, f32), ClassifierError> {
    probabilities
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, p)| !p.is_nan())
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .ok_or_else(|| ClassifierError::Inference("classifier returned no usable scores".into()))
}

#[cfg(feature = "tensorflow")]
pub use self::tf::TensorflowClassifier;

#[cfg(feature = "tensorflow")]
mod tf {
    use std::path::Path;
    use std::sync::Mutex;

    use tensorflow::{Graph, ImportGraphDefOptions, Session, SessionOptions, SessionRunArgs, Tensor};
    use tracing::{debug, info};

    use super::Classifier;
    use crate::decoder::ImageTensor;
    use crate::error::ClassifierError;

    struct Loaded {
        session: Session,
        graph: Graph,
    }

    /// Frozen TensorFlow graph run through a single serialised session.
    pub struct TensorflowClassifier {
        inner: Mutex<Loaded>,
        input_op: String,
        output_op: String,
    }

    impl TensorflowClassifier {
        pub fn load(
            model_path: &Path,
            input_op: impl Into<String>,
            output_op: impl Into<String>,
        ) -> Result<Self, ClassifierError> {
            let model_bytes = std::fs::read(model_path).map_err(|e| {
                ClassifierError::Load(format!("{}: {}", model_path.display(), e))
            })?;

            let mut graph = Graph::new();
            graph
                .import_graph_def(&model_bytes, &ImportGraphDefOptions::new())
                .map_err(|e| ClassifierError::Load(e.to_string()))?;

            let session = Session::new(&SessionOptions::new(), &graph)
                .map_err(|e| ClassifierError::Load(e.to_string()))?;

            info!("Loaded TensorFlow graph from {}", model_path.display());

            Ok(Self {
                inner: Mutex::new(Loaded { session, graph }),
                input_op: input_op.into(),
                output_op: output_op.into(),
            })
        }
    }

    impl Classifier for TensorflowClassifier {
        fn infer(&self, tensor: &ImageTensor) -> Result<Vec<f32>, ClassifierError> {
            let dims: Vec<u64> = tensor.shape().iter().map(|&d| d as u64).collect();
            let mut input = Tensor::<f32>::new(&dims);
            input.copy_from_slice(tensor.data());

            let loaded = self
                .inner
                .lock()
                .map_err(|_| ClassifierError::Inference("session lock poisoned".into()))?;

            let input_operation = loaded
                .graph
                .operation_by_name(&self.input_op)
                .map_err(|e| ClassifierError::Inference(e.to_string()))?
                .ok_or_else(|| {
                    ClassifierError::Inference(format!("input operation '{}' not found", self.input_op))
                })?;

            let output_operation = loaded
                .graph
                .operation_by_name(&self.output_op)
                .map_err(|e| ClassifierError::Inference(e.to_string()))?
                .ok_or_else(|| {
                    ClassifierError::Inference(format!(
                        "output operation '{}' not found",
                        self.output_op
                    ))
                })?;

            let mut args = SessionRunArgs::new();
            args.add_feed(&input_operation, 0, &input);
            let output_token = args.request_fetch(&output_operation, 0);

            loaded
                .session
                .run(&mut args)
                .map_err(|e| ClassifierError::Inference(e.to_string()))?;

            let output: Tensor<f32> = args
                .fetch(output_token)
                .map_err(|e| ClassifierError::Inference(e.to_string()))?;

            debug!("Classifier returned {} scores", output.len());
            Ok(output.to_vec())
        }
    }
}
