//! Content hashes that identify parameter sets across regenerations.

use sha2::{Digest, Sha256};

use crate::value::ParameterValue;

/// Compute the content hash of one parameter set.
///
/// The row is serialized as one `name:type:value` line per parameter, sorted by
/// parameter name, and digested as a whole with SHA-256. The hash therefore does not
/// depend on column order but does depend on every value and its type.
///
/// # Examples
/// ```
/// use waves::{set_hash, ParameterValue};
///
/// let forward = set_hash(&["a", "b"], &[ParameterValue::Integer(1), ParameterValue::Integer(2)]);
/// let reversed = set_hash(&["b", "a"], &[ParameterValue::Integer(2), ParameterValue::Integer(1)]);
/// assert_eq!(forward, reversed);
/// ```
#[must_use]
pub fn set_hash<S: AsRef<str>>(parameter_names: &[S], values: &[ParameterValue]) -> String {
    let mut lines: Vec<String> = parameter_names
        .iter()
        .zip(values)
        .map(|(name, value)| format!("{}:{}:{}", name.as_ref(), value.type_name(), value.canonical()))
        .collect();
    lines.sort_unstable();
    let mut hasher = Sha256::new();
    hasher.update(lines.join("\n").as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
