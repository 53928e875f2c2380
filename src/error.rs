//! Typed errors shared across the scoring pipeline.

use std::error::Error as StdError;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Convenient alias for results returned by pipeline modules.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the segmentation-to-scoring pipeline.
///
/// Every variant carries enough context to diagnose the failure without
/// re-running the experiment: the offending parameter and value, the file id,
/// or the path that was missing.
#[derive(Debug)]
pub enum Error {
    /// Invalid static parameter, detected at construction. Fatal.
    Configuration {
        parameter: &'static str,
        message: String,
    },
    /// An operation that requires a trained model was called on an untrained
    /// one. Caller bug, fatal.
    NotTrained { operation: &'static str },
    /// Persisted model state was not found on disk. Recoverable by
    /// retraining.
    ModelNotFound { path: PathBuf },
    /// Feature widths disagreed across extractors/segments during dataset
    /// assembly.
    DataMismatch {
        file_id: String,
        expected: usize,
        actual: usize,
    },
    /// IO or serialization failure at a persistence boundary.
    Persistence { path: PathBuf, message: String },
}

impl Error {
    pub fn configuration(parameter: &'static str, message: impl Into<String>) -> Self {
        Error::Configuration {
            parameter,
            message: message.into(),
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, err: impl Display) -> Self {
        Error::Persistence {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Configuration { parameter, message } => {
                write!(f, "invalid configuration for `{}`: {}", parameter, message)
            }
            Error::NotTrained { operation } => {
                write!(f, "`{}` requires a trained model", operation)
            }
            Error::ModelNotFound { path } => {
                write!(f, "no persisted model at {:?}", path)
            }
            Error::DataMismatch {
                file_id,
                expected,
                actual,
            } => write!(
                f,
                "feature width mismatch in file `{}`: expected {} values, got {}",
                file_id, expected, actual
            ),
            Error::Persistence { path, message } => {
                write!(f, "persistence failure at {:?}: {}", path, message)
            }
        }
    }
}

impl StdError for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_message_names_parameter() {
        let err = Error::configuration("frame_duration_ms", "must be 10, 20, or 30");
        assert!(err.to_string().contains("frame_duration_ms"));
    }

    #[test]
    fn mismatch_message_names_file() {
        let err = Error::DataMismatch {
            file_id: "clip_007".to_string(),
            expected: 26,
            actual: 4,
        };
        let rendered = err.to_string();
        assert!(rendered.contains("clip_007"));
        assert!(rendered.contains("26"));
    }
}
