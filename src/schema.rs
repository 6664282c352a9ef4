//! Parameter schema parsing and validation.
//!
//! A schema is a YAML mapping. What the mapping must contain depends on the generator:
//!
//! * Cartesian product and one-at-a-time: every key is a parameter holding a list of
//!   scalar values.
//! * Latin hypercube and Sobol sequence: a positive `num_simulations` and one
//!   distribution mapping per parameter.
//! * Custom study: `parameter_names` and a `parameter_samples` table with one row per
//!   set.

use std::collections::HashSet;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use serde_yaml::{Mapping, Value};

use crate::distribution::Distribution;
use crate::errors::{ChoicesError, SchemaError};
use crate::sampling::{
    CartesianProduct, CustomStudy, LatinHypercube, OneAtATime, SobolSequence, StudyDesign,
};
use crate::value::ParameterValue;

/// Names accepted by [`GeneratorKind::from_str`].
pub const GENERATOR_CHOICES: [&str; 5] = [
    "cartesian_product",
    "latin_hypercube",
    "sobol_sequence",
    "custom_study",
    "one_at_a_time",
];

/// Schema key holding the number of sets for space-filling generators.
pub const NUM_SIMULATIONS_KEY: &str = "num_simulations";
/// Schema key holding the parameter names of a custom study.
pub const PARAMETER_NAMES_KEY: &str = "parameter_names";
/// Schema key holding the sample table of a custom study.
pub const PARAMETER_SAMPLES_KEY: &str = "parameter_samples";

/// Parameter study designs supported by the generator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeneratorKind {
    /// Full outer product of discrete value lists.
    CartesianProduct,
    /// Latin hypercube sampling of continuous distributions.
    LatinHypercube,
    /// Sobol low-discrepancy sampling of continuous distributions.
    SobolSequence,
    /// User supplied sample table.
    CustomStudy,
    /// One parameter varied at a time around a nominal set.
    OneAtATime,
}

impl GeneratorKind {
    /// Every supported generator, in documentation order.
    pub const ALL: [Self; 5] = [
        Self::CartesianProduct,
        Self::LatinHypercube,
        Self::SobolSequence,
        Self::CustomStudy,
        Self::OneAtATime,
    ];

    /// Subcommand style name of the generator.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CartesianProduct => "cartesian_product",
            Self::LatinHypercube => "latin_hypercube",
            Self::SobolSequence => "sobol_sequence",
            Self::CustomStudy => "custom_study",
            Self::OneAtATime => "one_at_a_time",
        }
    }

    /// Whether the generator draws quantiles on the unit hypercube.
    #[must_use]
    pub const fn has_quantiles(self) -> bool {
        matches!(self, Self::LatinHypercube | Self::SobolSequence)
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GeneratorKind {
    type Err = ChoicesError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| ChoicesError::new("generator", name, &GENERATOR_CHOICES))
    }
}

/// Declarative description of the parameters of a study.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterSchema {
    mapping: Mapping,
}

impl ParameterSchema {
    /// Wrap an already parsed YAML mapping.
    #[must_use]
    pub fn new(mapping: Mapping) -> Self {
        Self { mapping }
    }

    /// Parse a schema from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Yaml`] for invalid YAML and [`SchemaError::NotAMapping`]
    /// when the document is not a mapping.
    ///
    /// # Examples
    /// ```
    /// use waves::ParameterSchema;
    ///
    /// let schema = ParameterSchema::from_yaml_str("width: [1, 2]").unwrap();
    /// assert_eq!(schema.keys(), vec!["width"]);
    /// ```
    pub fn from_yaml_str(text: &str) -> Result<Self, SchemaError> {
        let document: Value =
            serde_yaml::from_str(text).map_err(|error| SchemaError::Yaml(error.to_string()))?;
        match document {
            Value::Mapping(mapping) => Ok(Self::new(mapping)),
            _ => Err(SchemaError::NotAMapping),
        }
    }

    /// Read a schema from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Read`] when the file cannot be read, otherwise the errors
    /// of [`ParameterSchema::from_yaml_str`].
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|error| SchemaError::Read {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;
        Self::from_yaml_str(&text)
    }

    /// Read a schema from any reader, typically STDIN.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Read`] when the reader fails, otherwise the errors of
    /// [`ParameterSchema::from_yaml_str`].
    pub fn from_reader(mut reader: impl Read) -> Result<Self, SchemaError> {
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .map_err(|error| SchemaError::Read {
                path: "-".into(),
                message: error.to_string(),
            })?;
        Self::from_yaml_str(&text)
    }

    /// Top level keys in declaration order. Non-string keys are skipped.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.mapping.keys().filter_map(Value::as_str).collect()
    }

    /// Underlying YAML mapping.
    #[must_use]
    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    /// Validate the schema for `kind` and build the matching study design.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] naming the offending key when the schema does not have
    /// the structure `kind` requires.
    pub fn validate(&self, kind: GeneratorKind) -> Result<StudyDesign, SchemaError> {
        let design = match kind {
            GeneratorKind::CartesianProduct => {
                StudyDesign::CartesianProduct(CartesianProduct::new(self.value_lists()?))
            }
            GeneratorKind::OneAtATime => {
                StudyDesign::OneAtATime(OneAtATime::new(self.value_lists()?))
            }
            GeneratorKind::LatinHypercube => {
                let (num_simulations, parameters) = self.distributions()?;
                StudyDesign::LatinHypercube(LatinHypercube::new(num_simulations, parameters))
            }
            GeneratorKind::SobolSequence => {
                let (num_simulations, parameters) = self.distributions()?;
                StudyDesign::SobolSequence(SobolSequence::new(num_simulations, parameters)?)
            }
            GeneratorKind::CustomStudy => {
                let (names, rows) = self.table()?;
                StudyDesign::CustomStudy(CustomStudy::new(names, rows))
            }
        };
        Ok(design)
    }

    /// Iterate the mapping with string keys, rejecting any other key type.
    fn entries(&self) -> Result<Vec<(&str, &Value)>, SchemaError> {
        if self.mapping.is_empty() {
            return Err(SchemaError::Empty);
        }
        self.mapping
            .iter()
            .map(|(key, value)| match key.as_str() {
                Some(name) => Ok((name, value)),
                None => Err(SchemaError::NonStringKey {
                    key: format!("{key:?}"),
                }),
            })
            .collect()
    }

    /// Parameters that map to lists of discrete values.
    fn value_lists(&self) -> Result<Vec<(String, Vec<ParameterValue>)>, SchemaError> {
        self.entries()?
            .into_iter()
            .map(|(key, value)| {
                let Value::Sequence(items) = value else {
                    return Err(SchemaError::InvalidValue {
                        key: key.to_string(),
                        reason: "expected a list of values".to_string(),
                    });
                };
                if items.is_empty() {
                    return Err(SchemaError::EmptyValues {
                        key: key.to_string(),
                    });
                }
                let values = scalars(key, items)?;
                if let Some(repeated) = values
                    .iter()
                    .enumerate()
                    .find_map(|(index, value)| values[..index].contains(value).then_some(value))
                {
                    return Err(SchemaError::DuplicateValue {
                        key: key.to_string(),
                        value: repeated.canonical(),
                    });
                }
                Ok((key.to_string(), values))
            })
            .collect()
    }

    /// `num_simulations` plus one distribution per parameter.
    fn distributions(&self) -> Result<(usize, Vec<(String, Distribution)>), SchemaError> {
        let entries = self.entries()?;
        let num_simulations = self
            .mapping
            .get(NUM_SIMULATIONS_KEY)
            .ok_or_else(|| SchemaError::MissingKey {
                key: NUM_SIMULATIONS_KEY.to_string(),
            })?
            .as_u64()
            .filter(|count| *count > 0)
            .ok_or_else(|| SchemaError::InvalidValue {
                key: NUM_SIMULATIONS_KEY.to_string(),
                reason: "expected a positive integer".to_string(),
            })?;
        let num_simulations =
            usize::try_from(num_simulations).map_err(|_| SchemaError::InvalidValue {
                key: NUM_SIMULATIONS_KEY.to_string(),
                reason: "too many simulations".to_string(),
            })?;

        let mut parameters = Vec::new();
        for (key, value) in entries {
            if key == NUM_SIMULATIONS_KEY {
                continue;
            }
            let Value::Mapping(definition) = value else {
                return Err(SchemaError::InvalidValue {
                    key: key.to_string(),
                    reason: "expected a distribution mapping".to_string(),
                });
            };
            parameters.push((key.to_string(), Distribution::from_schema(key, definition)?));
        }
        if parameters.is_empty() {
            return Err(SchemaError::Empty);
        }
        Ok((num_simulations, parameters))
    }

    /// Parameter names and the explicit sample table of a custom study.
    #[allow(clippy::type_complexity)]
    fn table(&self) -> Result<(Vec<String>, Vec<Vec<ParameterValue>>), SchemaError> {
        let names = self.required_sequence(PARAMETER_NAMES_KEY)?;
        if names.is_empty() {
            return Err(SchemaError::EmptyValues {
                key: PARAMETER_NAMES_KEY.to_string(),
            });
        }
        let mut seen = HashSet::new();
        let mut parameter_names = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_str().ok_or_else(|| SchemaError::InvalidValue {
                key: PARAMETER_NAMES_KEY.to_string(),
                reason: format!("parameter name {name:?} is not a string"),
            })?;
            if !seen.insert(name) {
                return Err(SchemaError::DuplicateParameter {
                    key: name.to_string(),
                });
            }
            parameter_names.push(name.to_string());
        }

        let rows = self.required_sequence(PARAMETER_SAMPLES_KEY)?;
        if rows.is_empty() {
            return Err(SchemaError::EmptyValues {
                key: PARAMETER_SAMPLES_KEY.to_string(),
            });
        }
        let mut samples = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let Value::Sequence(cells) = row else {
                return Err(SchemaError::InvalidValue {
                    key: PARAMETER_SAMPLES_KEY.to_string(),
                    reason: format!("row {index} is not a list"),
                });
            };
            if cells.len() != parameter_names.len() {
                return Err(SchemaError::RaggedRow {
                    key: PARAMETER_SAMPLES_KEY.to_string(),
                    row: index,
                    expected: parameter_names.len(),
                    found: cells.len(),
                });
            }
            samples.push(scalars(PARAMETER_SAMPLES_KEY, cells)?);
        }
        Ok((parameter_names, samples))
    }

    /// Fetch a key that must hold a list.
    fn required_sequence(&self, key: &str) -> Result<&Vec<Value>, SchemaError> {
        match self.mapping.get(key) {
            Some(Value::Sequence(items)) => Ok(items),
            Some(_) => Err(SchemaError::InvalidValue {
                key: key.to_string(),
                reason: "expected a list".to_string(),
            }),
            None => Err(SchemaError::MissingKey {
                key: key.to_string(),
            }),
        }
    }
}

/// Convert a list of YAML scalars, naming `key` when an entry is not a scalar.
fn scalars(key: &str, items: &[Value]) -> Result<Vec<ParameterValue>, SchemaError> {
    items
        .iter()
        .map(|item| {
            ParameterValue::from_yaml(item).ok_or_else(|| SchemaError::InvalidValue {
                key: key.to_string(),
                reason: format!("{item:?} is not a scalar value"),
            })
        })
        .collect()
}
