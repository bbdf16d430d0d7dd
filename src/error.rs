//! Error taxonomy for experiment analysis
//!
//! Three failure classes drive how a run degrades:
//! - `DataIntegrity`: malformed or insufficient input tables, aborts the run
//! - `InsufficientData`: one statistical procedure cannot run on its input
//! - `InvalidParameter`: caller configuration outside its valid domain
//!
//! Every message names the input or parameter at fault.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the analysis engine
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Data integrity violation in {input}: {reason}")]
    DataIntegrity { input: String, reason: String },

    #[error("Insufficient data for {procedure}: {reason}")]
    InsufficientData { procedure: String, reason: String },

    #[error("Invalid parameter {parameter} = {value} (expected {expected})")]
    InvalidParameter {
        parameter: String,
        value: String,
        expected: String,
    },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AnalysisError {
    pub(crate) fn data_integrity(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataIntegrity {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn insufficient(procedure: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InsufficientData {
            procedure: procedure.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(
        parameter: impl Into<String>,
        value: impl ToString,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.to_string(),
            expected: expected.into(),
        }
    }

    /// True when the error only disqualifies a single procedure
    pub fn is_procedure_local(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_names_domain() {
        let err = AnalysisError::invalid("alpha", 1.5, "a value in (0, 1)");
        let msg = err.to_string();
        assert!(msg.contains("alpha"));
        assert!(msg.contains("1.5"));
        assert!(msg.contains("(0, 1)"));
    }

    #[test]
    fn test_data_integrity_names_input() {
        let err = AnalysisError::data_integrity("events row 4, column group", "unknown value 'x'");
        assert!(err.to_string().contains("events row 4, column group"));
        assert!(!err.is_procedure_local());
    }

    #[test]
    fn test_insufficient_data_is_procedure_local() {
        let err = AnalysisError::insufficient("z-test", "control group has n=0");
        assert!(err.is_procedure_local());
    }
}
