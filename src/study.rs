//! The parameter study table and its persisted forms.

use std::path::Path;

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::errors::StudyError;
use crate::hashing::set_hash;
use crate::sampling::Samples;
use crate::value::ParameterValue;

/// Placeholder replaced by the set number in name and file templates.
pub const NUMBER_PLACEHOLDER: &str = "@number";

/// Default template for parameter set names.
pub const DEFAULT_SET_NAME_TEMPLATE: &str = "parameter_set@number";

/// Template that turns a set number into a set name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetNameTemplate {
    /// Template text containing the placeholder.
    template: String,
}

impl SetNameTemplate {
    /// Create a template, appending [`NUMBER_PLACEHOLDER`] when it is missing.
    ///
    /// # Examples
    /// ```
    /// use waves::SetNameTemplate;
    ///
    /// assert_eq!(SetNameTemplate::new("set").render(3), "set3");
    /// assert_eq!(SetNameTemplate::new("set@number_input").render(3), "set3_input");
    /// ```
    #[must_use]
    pub fn new(template: &str) -> Self {
        let template = if template.contains(NUMBER_PLACEHOLDER) {
            template.to_string()
        } else {
            format!("{template}{NUMBER_PLACEHOLDER}")
        };
        Self { template }
    }

    /// Name of set `number`.
    #[must_use]
    pub fn render(&self, number: usize) -> String {
        self.template
            .replace(NUMBER_PLACEHOLDER, &number.to_string())
    }

    /// Template text, placeholder included.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.template
    }
}

impl Default for SetNameTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_SET_NAME_TEMPLATE)
    }
}

/// One row of a parameter study.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterSet {
    /// Unique name of the set within its study.
    pub set_name: String,
    /// Content hash of `values`.
    pub set_hash: String,
    /// Parameter values in column order.
    pub values: Vec<(String, ParameterValue)>,
    /// Unit hypercube coordinates, for distribution based designs.
    pub quantiles: Option<Vec<f64>>,
}

impl ParameterSet {
    /// Value of `parameter`, if the set defines it.
    #[must_use]
    pub fn value(&self, parameter: &str) -> Option<&ParameterValue> {
        self.values
            .iter()
            .find(|(name, _)| name == parameter)
            .map(|(_, value)| value)
    }

    /// Ordered mapping of parameter name to value.
    #[must_use]
    pub fn to_mapping(&self) -> Mapping {
        self.values
            .iter()
            .map(|(name, value)| (Value::String(name.clone()), yaml_value(value)))
            .collect()
    }
}

/// Serialized layout of a study in the JSON dataset format.
#[derive(Debug, Serialize, Deserialize)]
struct StudyRecord {
    /// Column names.
    parameter_names: Vec<String>,
    /// Row names.
    parameter_set_names: Vec<String>,
    /// Row content hashes as written.
    parameter_set_hashes: Vec<String>,
    /// Sample rows.
    samples: Vec<Vec<ParameterValue>>,
    /// Quantile rows for sampled designs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    quantiles: Option<Vec<Vec<f64>>>,
}

/// A collection of parameter sets indexed by set name and parameter name.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterStudy {
    /// Column names.
    parameter_names: Vec<String>,
    /// Row names.
    parameter_set_names: Vec<String>,
    /// Row content hashes.
    parameter_set_hashes: Vec<String>,
    /// Sample table.
    samples: Array2<ParameterValue>,
    /// Quantile table for sampled designs.
    quantiles: Option<Array2<f64>>,
}

impl ParameterStudy {
    /// Name and hash the raw output of a sampler.
    ///
    /// Set `n` is named with `template.render(n)`.
    #[must_use]
    pub fn from_samples(samples: Samples, template: &SetNameTemplate) -> Self {
        let parameter_set_names = (0..samples.samples.nrows())
            .map(|number| template.render(number))
            .collect();
        let parameter_set_hashes = samples
            .samples
            .rows()
            .into_iter()
            .map(|row| hash_row(&samples.parameter_names, row))
            .collect();
        Self {
            parameter_names: samples.parameter_names,
            parameter_set_names,
            parameter_set_hashes,
            samples: samples.samples,
            quantiles: samples.quantiles,
        }
    }

    /// Assemble a study from named rows.
    ///
    /// Quantiles are kept only when every row carries them. Hashes are recomputed.
    pub(crate) fn from_sets(parameter_names: Vec<String>, sets: Vec<ParameterSet>) -> Self {
        let columns = parameter_names.len();
        let samples = Array2::from_shape_fn((sets.len(), columns), |(row, column)| {
            sets[row].values[column].1.clone()
        });
        let quantiles = if !sets.is_empty() && sets.iter().all(|set| set.quantiles.is_some()) {
            Some(Array2::from_shape_fn((sets.len(), columns), |(row, column)| {
                sets[row]
                    .quantiles
                    .as_ref()
                    .map_or(f64::NAN, |quantiles| quantiles[column])
            }))
        } else {
            None
        };
        let parameter_set_hashes = samples
            .rows()
            .into_iter()
            .map(|row| hash_row(&parameter_names, row))
            .collect();
        Self {
            parameter_names,
            parameter_set_names: sets.into_iter().map(|set| set.set_name).collect(),
            parameter_set_hashes,
            samples,
            quantiles,
        }
    }

    /// Column names.
    #[must_use]
    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    /// Row names.
    #[must_use]
    pub fn parameter_set_names(&self) -> &[String] {
        &self.parameter_set_names
    }

    /// Content hashes, parallel to [`ParameterStudy::parameter_set_names`].
    #[must_use]
    pub fn parameter_set_hashes(&self) -> &[String] {
        &self.parameter_set_hashes
    }

    /// Sample table, rows are sets and columns are parameters.
    #[must_use]
    pub fn samples(&self) -> &Array2<ParameterValue> {
        &self.samples
    }

    /// Quantile table with the same layout as the samples, if recorded.
    #[must_use]
    pub fn quantiles(&self) -> Option<&Array2<f64>> {
        self.quantiles.as_ref()
    }

    /// Number of parameter sets.
    #[must_use]
    pub fn set_count(&self) -> usize {
        self.parameter_set_names.len()
    }

    /// The set at row `index`.
    #[must_use]
    pub fn set_at(&self, index: usize) -> Option<ParameterSet> {
        let set_name = self.parameter_set_names.get(index)?.clone();
        let values = self
            .parameter_names
            .iter()
            .cloned()
            .zip(self.samples.row(index).iter().cloned())
            .collect();
        Some(ParameterSet {
            set_name,
            set_hash: self.parameter_set_hashes[index].clone(),
            values,
            quantiles: self
                .quantiles
                .as_ref()
                .map(|quantiles| quantiles.row(index).to_vec()),
        })
    }

    /// The set called `set_name`.
    #[must_use]
    pub fn parameter_set(&self, set_name: &str) -> Option<ParameterSet> {
        let index = self
            .parameter_set_names
            .iter()
            .position(|name| name == set_name)?;
        self.set_at(index)
    }

    /// Every set in row order.
    pub fn parameter_sets(&self) -> impl Iterator<Item = ParameterSet> + '_ {
        (0..self.set_count()).filter_map(move |index| self.set_at(index))
    }

    /// Ordered mapping of set name to its parameter mapping.
    #[must_use]
    pub fn to_mapping(&self) -> Mapping {
        self.parameter_sets()
            .map(|set| (Value::String(set.set_name.clone()), Value::Mapping(set.to_mapping())))
            .collect()
    }

    /// Render the study as the JSON dataset format.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::Json`] when serialization fails.
    pub fn to_json(&self) -> Result<String, StudyError> {
        let record = StudyRecord {
            parameter_names: self.parameter_names.clone(),
            parameter_set_names: self.parameter_set_names.clone(),
            parameter_set_hashes: self.parameter_set_hashes.clone(),
            samples: self.samples.rows().into_iter().map(|row| row.to_vec()).collect(),
            quantiles: self
                .quantiles
                .as_ref()
                .map(|quantiles| quantiles.rows().into_iter().map(|row| row.to_vec()).collect()),
        };
        let mut text = serde_json::to_string_pretty(&record)?;
        text.push('\n');
        Ok(text)
    }

    /// Render the study as a YAML mapping of set names.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::Yaml`] when serialization fails.
    pub fn to_yaml(&self) -> Result<String, StudyError> {
        Ok(serde_yaml::to_string(&self.to_mapping())?)
    }

    /// Parse the JSON dataset format. `path` is only used in error messages.
    ///
    /// Hashes are recomputed from the samples; stored hashes that disagree are logged.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::Json`] for invalid JSON and [`StudyError::MalformedStudy`]
    /// when the arrays disagree in shape.
    pub fn from_json(text: &str, path: &Path) -> Result<Self, StudyError> {
        let record: StudyRecord = serde_json::from_str(text)?;
        let malformed = |reason: String| StudyError::MalformedStudy {
            path: path.to_path_buf(),
            reason,
        };
        let rows = record.samples.len();
        if record.parameter_set_names.len() != rows {
            return Err(malformed(format!(
                "{} set names for {rows} sample rows",
                record.parameter_set_names.len()
            )));
        }
        let columns = record.parameter_names.len();
        if let Some(index) = record.samples.iter().position(|row| row.len() != columns) {
            return Err(malformed(format!(
                "sample row {index} does not have {columns} values"
            )));
        }
        if let Some(quantiles) = &record.quantiles {
            if quantiles.len() != rows || quantiles.iter().any(|row| row.len() != columns) {
                return Err(malformed("quantiles do not match the samples".to_string()));
            }
        }

        let sets = record
            .parameter_set_names
            .into_iter()
            .zip(record.samples)
            .enumerate()
            .map(|(index, (set_name, row))| ParameterSet {
                set_name,
                set_hash: String::new(),
                values: record.parameter_names.iter().cloned().zip(row).collect(),
                quantiles: record
                    .quantiles
                    .as_ref()
                    .map(|quantiles| quantiles[index].clone()),
            })
            .collect();
        let study = Self::from_sets(record.parameter_names, sets);
        for (name, (stored, computed)) in study
            .parameter_set_names
            .iter()
            .zip(record.parameter_set_hashes.iter().zip(&study.parameter_set_hashes))
        {
            if stored != computed {
                tracing::debug!(set = %name, "stored set hash differs from recomputed hash");
            }
        }
        Ok(study)
    }

    /// Parse a YAML mapping of set names. `path` is only used in error messages.
    ///
    /// Column order follows the first set; every set must define the same parameters.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::Yaml`] for invalid YAML and [`StudyError::MalformedStudy`]
    /// when the sets are inconsistent or hold non-scalar values.
    pub fn from_yaml(text: &str, path: &Path) -> Result<Self, StudyError> {
        let document: Mapping = serde_yaml::from_str(text)?;
        let malformed = |reason: String| StudyError::MalformedStudy {
            path: path.to_path_buf(),
            reason,
        };
        let mut parameter_names: Option<Vec<String>> = None;
        let mut sets = Vec::with_capacity(document.len());
        for (set_name, parameters) in &document {
            let set_name = set_name
                .as_str()
                .ok_or_else(|| malformed(format!("set name {set_name:?} is not a string")))?;
            let Value::Mapping(parameters) = parameters else {
                return Err(malformed(format!("set '{set_name}' is not a mapping")));
            };
            let mut values = Vec::with_capacity(parameters.len());
            for (name, value) in parameters {
                let name = name.as_str().ok_or_else(|| {
                    malformed(format!("set '{set_name}' has a non-string parameter name"))
                })?;
                let value = ParameterValue::from_yaml(value).ok_or_else(|| {
                    malformed(format!("set '{set_name}' parameter '{name}' is not a scalar"))
                })?;
                values.push((name.to_string(), value));
            }
            let names = parameter_names
                .get_or_insert_with(|| values.iter().map(|(name, _)| name.clone()).collect());
            let ordered = reorder(names, values)
                .ok_or_else(|| malformed(format!("set '{set_name}' defines different parameters")))?;
            sets.push(ParameterSet {
                set_name: set_name.to_string(),
                set_hash: String::new(),
                values: ordered,
                quantiles: None,
            });
        }
        Ok(Self::from_sets(parameter_names.unwrap_or_default(), sets))
    }

    /// Load a study from disk, choosing the format from the file extension.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::Read`] when the file cannot be read, a
    /// [`StudyError::Choices`] for unknown extensions, or the parse errors of the format.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StudyError> {
        let path = path.as_ref();
        let file_type = crate::writer::OutputFileType::from_path(path)?;
        let text = std::fs::read_to_string(path).map_err(|source| StudyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        match file_type {
            crate::writer::OutputFileType::Json => Self::from_json(&text, path),
            crate::writer::OutputFileType::Yaml => Self::from_yaml(&text, path),
        }
    }
}

/// Hash one row of the sample table.
fn hash_row(parameter_names: &[String], row: ArrayView1<'_, ParameterValue>) -> String {
    set_hash(parameter_names, &row.to_vec())
}

/// Reorder `values` to follow `names`, or `None` when the parameter sets differ.
pub(crate) fn reorder(
    names: &[String],
    mut values: Vec<(String, ParameterValue)>,
) -> Option<Vec<(String, ParameterValue)>> {
    if values.len() != names.len() {
        return None;
    }
    let mut ordered = Vec::with_capacity(names.len());
    for name in names {
        let position = values.iter().position(|(candidate, _)| candidate == name)?;
        ordered.push(values.swap_remove(position));
    }
    Some(ordered)
}

/// YAML rendering of a parameter value.
fn yaml_value(value: &ParameterValue) -> Value {
    match value {
        ParameterValue::Boolean(flag) => Value::Bool(*flag),
        ParameterValue::Integer(integer) => Value::Number((*integer).into()),
        ParameterValue::Float(float) => Value::Number((*float).into()),
        ParameterValue::Text(text) => Value::String(text.clone()),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use ndarray::array;

    use super::*;

    fn study() -> ParameterStudy {
        let samples = Samples {
            parameter_names: vec!["a".to_string(), "b".to_string()],
            samples: array![
                [ParameterValue::Integer(1), ParameterValue::Float(10.5)],
                [ParameterValue::Integer(2), ParameterValue::from("mesh")],
            ],
            quantiles: None,
        };
        ParameterStudy::from_samples(samples, &SetNameTemplate::default())
    }

    #[test]
    fn template_appends_missing_placeholder() {
        assert_eq!(SetNameTemplate::new("set").as_str(), "set@number");
        assert_eq!(SetNameTemplate::default().render(0), "parameter_set0");
    }

    #[test]
    fn sets_are_named_and_hashed_in_row_order() {
        let study = study();
        assert_eq!(study.parameter_set_names(), ["parameter_set0", "parameter_set1"]);
        let second = study.parameter_set("parameter_set1").expect("second set");
        assert_eq!(second.value("b"), Some(&ParameterValue::from("mesh")));
        assert_eq!(
            second.set_hash,
            set_hash(&["a", "b"], &[ParameterValue::Integer(2), ParameterValue::from("mesh")])
        );
    }

    #[test]
    fn yaml_rendering_lists_sets_then_parameters() {
        let text = study().to_yaml().expect("yaml renders");
        assert_eq!(
            text,
            "parameter_set0:\n  a: 1\n  b: 10.5\nparameter_set1:\n  a: 2\n  b: mesh\n"
        );
    }

    #[test]
    fn json_and_yaml_forms_load_back() {
        let original = study();
        let path = PathBuf::from("study.json");
        let from_json =
            ParameterStudy::from_json(&original.to_json().expect("json renders"), &path)
                .expect("json loads");
        assert_eq!(from_json, original);
        let from_yaml =
            ParameterStudy::from_yaml(&original.to_yaml().expect("yaml renders"), &path)
                .expect("yaml loads");
        assert_eq!(from_yaml, original);
    }

    #[test]
    fn yaml_sets_with_different_parameters_are_rejected() {
        let error = ParameterStudy::from_yaml(
            "set0:\n  a: 1\nset1:\n  b: 2\n",
            Path::new("study.yaml"),
        )
        .expect_err("inconsistent sets");
        assert!(matches!(error, StudyError::MalformedStudy { .. }));
    }
}
