//! The inference adapter seam.
//!
//! The catalog does not decide what a file is. A crawl hands each file to an
//! [`InferenceAdapter`], which returns zero or more [`Inference`]s; each one is
//! recorded as an independent guess. The catalog stores the label and
//! descriptor strings verbatim and never branches on [`DataDescriptor`].

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;

use crate::config::InferenceConfig;
use crate::models::GuessInput;

/// Schema label recorded for files with no recoverable structure.
pub const UNSTRUCTURED_LABEL: &str = "unstructured";

/// Whether a guessed file type carries a structural schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataDescriptor {
    Unstructured,
    Structured {
        schema_label: String,
        schema_payload: String,
    },
}

/// One adapter verdict about a file.
#[derive(Debug, Clone, PartialEq)]
pub struct Inference {
    pub type_label: String,
    pub type_descriptor: String,
    pub data: DataDescriptor,
    pub score: f64,
}

impl Inference {
    pub fn into_guess(self) -> GuessInput {
        let (schema_label, schema_descriptor) = match self.data {
            DataDescriptor::Unstructured => (UNSTRUCTURED_LABEL.to_string(), String::new()),
            DataDescriptor::Structured {
                schema_label,
                schema_payload,
            } => (schema_label, schema_payload),
        };
        GuessInput {
            type_label: self.type_label,
            type_descriptor: self.type_descriptor,
            schema_label,
            schema_descriptor,
            score: self.score,
        }
    }
}

/// Produces type/schema guesses for a file.
///
/// # Example
///
/// ```rust
/// use anyhow::Result;
/// use crawlcat::inference::{DataDescriptor, Inference, InferenceAdapter};
/// use std::path::Path;
///
/// struct ByExtension;
///
/// impl InferenceAdapter for ByExtension {
///     fn name(&self) -> &str { "by-extension" }
///
///     fn infer(&mut self, path: &Path) -> Result<Vec<Inference>> {
///         Ok(match path.extension().and_then(|e| e.to_str()) {
///             Some("csv") => vec![Inference {
///                 type_label: "csv".into(),
///                 type_descriptor: "CSV".into(),
///                 data: DataDescriptor::Unstructured,
///                 score: 0.5,
///             }],
///             _ => vec![],
///         })
///     }
/// }
/// ```
pub trait InferenceAdapter: Send {
    fn name(&self) -> &str;

    /// Guess what `path` contains. An error skips the file; an empty vector
    /// records the file with no guesses.
    fn infer(&mut self, path: &Path) -> Result<Vec<Inference>>;
}

/// Placeholder adapter: picks XML or CSV at random with a fixed schema.
pub struct CoinFlipInference {
    rng: StdRng,
    score: f64,
}

impl CoinFlipInference {
    pub fn new(rng: StdRng, score: f64) -> Self {
        Self { rng, score }
    }

    pub fn seeded(seed: u64, score: f64) -> Self {
        Self::new(StdRng::seed_from_u64(seed), score)
    }
}

impl InferenceAdapter for CoinFlipInference {
    fn name(&self) -> &str {
        "coin-flip"
    }

    fn infer(&mut self, _path: &Path) -> Result<Vec<Inference>> {
        let (label, descriptor) = if self.rng.gen_bool(0.5) {
            ("xml", "XML")
        } else {
            ("csv", "CSV")
        };
        Ok(vec![Inference {
            type_label: label.to_string(),
            type_descriptor: descriptor.to_string(),
            data: DataDescriptor::Structured {
                schema_label: "state,governor".to_string(),
                schema_payload: "All the states".to_string(),
            },
            score: self.score,
        }])
    }
}

/// Labels every file as unstructured text.
pub struct UnstructuredInference {
    score: f64,
}

impl UnstructuredInference {
    pub fn new(score: f64) -> Self {
        Self { score }
    }
}

impl InferenceAdapter for UnstructuredInference {
    fn name(&self) -> &str {
        "unstructured"
    }

    fn infer(&mut self, _path: &Path) -> Result<Vec<Inference>> {
        Ok(vec![Inference {
            type_label: UNSTRUCTURED_LABEL.to_string(),
            type_descriptor: "text".to_string(),
            data: DataDescriptor::Unstructured,
            score: self.score,
        }])
    }
}

/// Build the adapter named by `[inference].mode`.
pub fn from_config(config: &InferenceConfig) -> Result<Box<dyn InferenceAdapter>> {
    match config.mode.as_str() {
        "coin-flip" => {
            let rng = match config.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            Ok(Box::new(CoinFlipInference::new(rng, config.score)))
        }
        "unstructured" => Ok(Box::new(UnstructuredInference::new(config.score))),
        other => anyhow::bail!("Unknown inference mode: '{}'", other),
    }
}
