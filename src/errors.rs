//! Error types produced while generating parameter studies or parsing build trees.

use std::path::PathBuf;

use thiserror::Error;

/// Error returned when a parameter schema is malformed or incomplete.
///
/// Every variant names the schema key that caused the rejection so the message can be
/// traced back to the offending line of the schema file.
#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    /// Returned when the schema document is not a mapping at the top level.
    #[error("parameter schema must be a mapping of parameter names")]
    NotAMapping,
    /// Returned when the schema defines no parameters at all.
    #[error("parameter schema does not define any parameters")]
    Empty,
    /// Returned when a key required by the generator is absent.
    #[error("parameter schema is missing required key '{key}'")]
    MissingKey {
        /// Name of the absent key.
        key: String,
    },
    /// Returned when a schema key is not a string.
    #[error("parameter schema key {key} is not a string")]
    NonStringKey {
        /// Debug rendering of the offending key.
        key: String,
    },
    /// Returned when a key holds a value of the wrong shape.
    #[error("parameter schema key '{key}' is invalid: {reason}")]
    InvalidValue {
        /// Name of the offending key.
        key: String,
        /// Description of what was expected.
        reason: String,
    },
    /// Returned when a parameter provides no values to sample.
    #[error("parameter schema key '{key}' must provide at least one value")]
    EmptyValues {
        /// Name of the offending key.
        key: String,
    },
    /// Returned when a parameter name is declared more than once.
    #[error("parameter '{key}' is declared more than once")]
    DuplicateParameter {
        /// Repeated parameter name.
        key: String,
    },
    /// Returned when a parameter lists the same value more than once.
    #[error("parameter '{key}' lists the value {value} more than once")]
    DuplicateValue {
        /// Name of the offending parameter.
        key: String,
        /// Rendering of the repeated value.
        value: String,
    },
    /// Returned when a row of a tabular schema does not match the declared parameters.
    #[error(
        "parameter schema key '{key}' row {row} has {found} values, expected {expected}"
    )]
    RaggedRow {
        /// Name of the table key.
        key: String,
        /// Zero based row index.
        row: usize,
        /// Number of declared parameter names.
        expected: usize,
        /// Number of values found in the row.
        found: usize,
    },
    /// Returned when more parameters are requested than the sampler supports.
    #[error(
        "parameter schema key '{key}' requests {requested} dimensions, at most {supported} are supported"
    )]
    TooManyDimensions {
        /// Name of the parameter that exceeded the limit.
        key: String,
        /// Number of parameters in the schema.
        requested: usize,
        /// Largest supported number of parameters.
        supported: usize,
    },
    /// Returned when a distribution name is not supported.
    #[error("parameter schema key '{key}': {source}")]
    UnknownDistribution {
        /// Name of the parameter using the distribution.
        key: String,
        /// Rejected distribution name and the supported choices.
        #[source]
        source: ChoicesError,
    },
    /// Returned when distribution parameters are rejected.
    #[error("parameter schema key '{key}': {source}")]
    InvalidDistribution {
        /// Name of the parameter using the distribution.
        key: String,
        /// Rejected parameters.
        #[source]
        source: DistributionError,
    },
    /// Returned when the schema text is not valid YAML.
    #[error("parameter schema is not valid YAML: {0}")]
    Yaml(String),
    /// Returned when the schema file cannot be read.
    #[error("failed to read parameter schema '{path}': {message}")]
    Read {
        /// Schema path, `-` for STDIN.
        path: PathBuf,
        /// Rendered I/O failure.
        message: String,
    },
}

/// Error returned when a distribution cannot be built from its parameters.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid {family} distribution: {reason}")]
pub struct DistributionError {
    /// Distribution family name.
    pub family: &'static str,
    /// Why the parameters were rejected.
    pub reason: String,
}

/// Error returned when a requested option is not among the supported values.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{option} '{value}' is not supported, choose one of: {}", choices.join(", "))]
pub struct ChoicesError {
    /// Name of the option being configured.
    pub option: String,
    /// Rejected value.
    pub value: String,
    /// Accepted values.
    pub choices: Vec<String>,
}

impl ChoicesError {
    /// Build an error for `option` rejecting `value` in favour of `choices`.
    pub fn new(option: &str, value: &str, choices: &[&str]) -> Self {
        Self {
            option: option.to_string(),
            value: value.to_string(),
            choices: choices.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Error returned while generating, merging or writing a parameter study.
#[derive(Debug, Error)]
pub enum StudyError {
    /// The parameter schema was rejected.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// An option value was not among the supported choices.
    #[error(transparent)]
    Choices(#[from] ChoicesError),
    /// A generator step was called out of order.
    #[error("cannot {operation} a parameter study in state {state}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// Current generator state.
        state: String,
    },
    /// The previous study does not define the same parameters as the new one.
    #[error("previous parameter study defines parameters {previous:?}, expected {current:?}")]
    ParameterMismatch {
        /// Parameters of the previous study.
        previous: Vec<String>,
        /// Parameters of the newly generated study.
        current: Vec<String>,
    },
    /// A required previous study could not be found.
    #[error("previous parameter study '{0}' does not exist")]
    MissingPreviousStudy(PathBuf),
    /// Both a per-set template and a combined output file were requested.
    #[error("output_file_template and output_file are mutually exclusive")]
    ConflictingOutputs,
    /// A persisted study is structurally inconsistent.
    #[error("parameter study '{path}' is malformed: {reason}")]
    MalformedStudy {
        /// Path of the study file.
        path: PathBuf,
        /// Description of the inconsistency.
        reason: String,
    },
    /// A file could not be read.
    #[error("failed to read '{path}': {source}")]
    Read {
        /// Path being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// A file could not be written.
    #[error("failed to write '{path}': {source}")]
    Write {
        /// Path being written.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// A study could not be rendered to JSON.
    #[error("failed to serialize parameter study as JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A study could not be rendered to YAML.
    #[error("failed to serialize parameter study as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Error returned when build-tool tree output cannot be turned into a graph.
#[derive(Debug, Error)]
pub enum TreeParseError {
    /// No nodes were recovered from the tree text.
    #[error("unexpected SCons tree format, no nodes were found; check the target names")]
    NoNodes,
    /// The exclusion pattern is not a valid regular expression.
    #[error("invalid exclusion regex: {0}")]
    Regex(#[from] regex::Error),
    /// The build tool could not be invoked.
    #[error("failed to run '{program}': {source}")]
    Command {
        /// Program that was launched.
        program: String,
        /// Underlying process failure.
        #[source]
        source: std::io::Error,
    },
    /// The build tool exited unsuccessfully.
    #[error("'{program}' exited with status {status}: {stderr}")]
    CommandFailed {
        /// Program that was launched.
        program: String,
        /// Rendered exit status.
        status: String,
        /// Captured standard error.
        stderr: String,
    },
}

/// Error returned while exporting a build graph.
#[derive(Debug, Error)]
pub enum GraphExportError {
    /// The GraphML document could not be written.
    #[error("failed to write GraphML: {0}")]
    Xml(String),
    /// The rendered document is not valid UTF-8.
    #[error("rendered graph is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choices_error_lists_valid_choices() {
        let error = ChoicesError::new("output_file_type", "h5", &["yaml", "json"]);
        assert_eq!(
            error.to_string(),
            "output_file_type 'h5' is not supported, choose one of: yaml, json"
        );
    }

    #[test]
    fn schema_error_names_offending_key() {
        let error = SchemaError::MissingKey {
            key: "num_simulations".to_string(),
        };
        assert!(error.to_string().contains("num_simulations"));
    }
}
