//! The parameter generator pipeline: validate, generate, merge and write.

use std::ffi::OsStr;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::StudyError;
use crate::merge::merge_studies;
use crate::sampling::{Sampler, StudyDesign};
use crate::schema::{GeneratorKind, ParameterSchema};
use crate::study::{ParameterStudy, SetNameTemplate, DEFAULT_SET_NAME_TEMPLATE};
use crate::writer::{write_study, OutputFileType, OutputTarget, WriteReport, WriteSettings};

/// Options controlling naming, merging and output of a parameter study.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorOptions {
    /// Per-set output file template. Also used as the set name template.
    pub output_file_template: Option<String>,
    /// Single output file holding every set.
    pub output_file: Option<PathBuf>,
    /// Output serialization format.
    pub output_file_type: OutputFileType,
    /// Set name template used when no output file template is given.
    pub set_name_template: String,
    /// Previously written study to merge with.
    pub previous_parameter_study: Option<PathBuf>,
    /// Fail instead of warning when the previous study does not exist.
    pub require_previous_parameter_study: bool,
    /// Rewrite output files even when their content is unchanged.
    pub overwrite: bool,
    /// Print intended writes instead of writing.
    pub dryrun: bool,
    /// Write a manifest of the output files.
    pub write_meta: bool,
    /// Drop previous sets that are not part of the new generation.
    pub prune_previous: bool,
    /// Seed for randomised designs.
    pub seed: Option<u64>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            output_file_template: None,
            output_file: None,
            output_file_type: OutputFileType::Yaml,
            set_name_template: DEFAULT_SET_NAME_TEMPLATE.to_string(),
            previous_parameter_study: None,
            require_previous_parameter_study: false,
            overwrite: false,
            dryrun: false,
            write_meta: false,
            prune_previous: false,
            seed: None,
        }
    }
}

impl GeneratorOptions {
    /// Template used to name parameter sets.
    ///
    /// With an output file template, set names come from its file name and the
    /// directory part only decides where the per-set files go.
    #[must_use]
    pub fn set_name_template(&self) -> SetNameTemplate {
        let template = match self.output_file_template.as_deref() {
            Some(template) => Path::new(template)
                .file_name()
                .and_then(OsStr::to_str)
                .unwrap_or(template),
            None => &self.set_name_template,
        };
        SetNameTemplate::new(template)
    }

    /// Settings for the output writer.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::ConflictingOutputs`] when both an output file template and
    /// an output file are configured.
    pub fn write_settings(&self) -> Result<WriteSettings, StudyError> {
        let target = match (&self.output_file_template, &self.output_file) {
            (Some(_), Some(_)) => return Err(StudyError::ConflictingOutputs),
            (Some(template), None) => OutputTarget::PerSet(
                Path::new(template)
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default(),
            ),
            (None, Some(path)) => OutputTarget::Combined(path.clone()),
            (None, None) => OutputTarget::Stdout,
        };
        Ok(WriteSettings {
            target,
            file_type: self.output_file_type,
            overwrite: self.overwrite,
            dryrun: self.dryrun,
            write_meta: self.write_meta,
        })
    }
}

/// Progress of a [`ParameterGenerator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeneratorState {
    /// Schema not yet checked.
    Unvalidated,
    /// Schema accepted, no samples yet.
    Validated,
    /// Samples drawn, named and hashed.
    Generated,
    /// Reconciled with a previous study.
    Merged,
    /// Written to its destination.
    Written,
}

impl fmt::Display for GeneratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unvalidated => "unvalidated",
            Self::Validated => "validated",
            Self::Generated => "generated",
            Self::Merged => "merged",
            Self::Written => "written",
        };
        f.write_str(name)
    }
}

/// Builds a parameter study from a schema.
///
/// # Examples
/// ```
/// use waves::{GeneratorKind, GeneratorOptions, ParameterGenerator, ParameterSchema};
///
/// let schema = ParameterSchema::from_yaml_str("a: [1, 2]\nb: [10, 20]\n").unwrap();
/// let mut generator =
///     ParameterGenerator::new(GeneratorKind::CartesianProduct, schema, GeneratorOptions::default());
/// generator.validate().unwrap();
/// generator.generate().unwrap();
/// assert_eq!(generator.study().unwrap().set_count(), 4);
/// ```
#[derive(Debug)]
pub struct ParameterGenerator {
    /// Requested design.
    kind: GeneratorKind,
    /// Raw schema.
    schema: ParameterSchema,
    /// Naming, merge and output options.
    options: GeneratorOptions,
    /// Current pipeline state.
    state: GeneratorState,
    /// Validated design, present from [`GeneratorState::Validated`] on.
    design: Option<StudyDesign>,
    /// Generated study, present from [`GeneratorState::Generated`] on.
    study: Option<ParameterStudy>,
}

impl ParameterGenerator {
    /// Create a generator in the [`GeneratorState::Unvalidated`] state.
    #[must_use]
    pub fn new(kind: GeneratorKind, schema: ParameterSchema, options: GeneratorOptions) -> Self {
        Self {
            kind,
            schema,
            options,
            state: GeneratorState::Unvalidated,
            design: None,
            study: None,
        }
    }

    /// Requested design.
    #[must_use]
    pub fn kind(&self) -> GeneratorKind {
        self.kind
    }

    /// Current pipeline state.
    #[must_use]
    pub fn state(&self) -> GeneratorState {
        self.state
    }

    /// Options in effect.
    #[must_use]
    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Validated design, once [`ParameterGenerator::validate`] succeeded.
    #[must_use]
    pub fn design(&self) -> Option<&StudyDesign> {
        self.design.as_ref()
    }

    /// Generated study, once [`ParameterGenerator::generate`] succeeded.
    #[must_use]
    pub fn study(&self) -> Option<&ParameterStudy> {
        self.study.as_ref()
    }

    /// Check the options and the schema.
    ///
    /// On failure the generator stays [`GeneratorState::Unvalidated`].
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::ConflictingOutputs`] for contradictory output options,
    /// [`StudyError::Schema`] for an invalid schema, and [`StudyError::InvalidState`]
    /// when the generator was already validated.
    pub fn validate(&mut self) -> Result<(), StudyError> {
        self.expect_state("validate", &[GeneratorState::Unvalidated])?;
        self.options.write_settings()?;
        let design = self.schema.validate(self.kind)?;
        self.design = Some(design);
        self.state = GeneratorState::Validated;
        Ok(())
    }

    /// Draw the samples and build the named, hashed study.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::InvalidState`] unless the generator is validated.
    pub fn generate(&mut self) -> Result<&ParameterStudy, StudyError> {
        self.expect_state("generate", &[GeneratorState::Validated])?;
        let design = self.design.as_ref().ok_or(StudyError::InvalidState {
            operation: "generate",
            state: self.state.to_string(),
        })?;
        let samples = design.sample(self.options.seed);
        let study = ParameterStudy::from_samples(samples, &self.options.set_name_template());
        tracing::info!(
            generator = %self.kind,
            sets = study.set_count(),
            parameters = study.parameter_names().len(),
            "generated parameter study"
        );
        self.state = GeneratorState::Generated;
        Ok(self.study.insert(study))
    }

    /// Reconcile the generated study with `previous`.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::InvalidState`] unless the study was just generated, and
    /// [`StudyError::ParameterMismatch`] when the studies define different parameters.
    pub fn merge(&mut self, previous: &ParameterStudy) -> Result<&ParameterStudy, StudyError> {
        self.expect_state("merge", &[GeneratorState::Generated])?;
        let current = self.study.as_ref().ok_or(StudyError::InvalidState {
            operation: "merge",
            state: self.state.to_string(),
        })?;
        let merged = merge_studies(
            current,
            previous,
            &self.options.set_name_template(),
            self.options.prune_previous,
        )?;
        self.state = GeneratorState::Merged;
        Ok(self.study.insert(merged))
    }

    /// Merge with the configured previous study file, if any.
    ///
    /// Returns whether a merge took place. A missing file is only logged unless
    /// `require_previous_parameter_study` is set.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::MissingPreviousStudy`] for a missing required file, the
    /// load errors of [`ParameterStudy::load`], or the errors of
    /// [`ParameterGenerator::merge`].
    pub fn merge_previous(&mut self) -> Result<bool, StudyError> {
        let Some(path) = self.options.previous_parameter_study.clone() else {
            return Ok(false);
        };
        if !path.is_file() {
            if self.options.require_previous_parameter_study {
                return Err(StudyError::MissingPreviousStudy(path));
            }
            tracing::warn!(
                path = %path.display(),
                "previous parameter study does not exist, generating a new study"
            );
            return Ok(false);
        }
        let previous = ParameterStudy::load(&path)?;
        self.merge(&previous)?;
        Ok(true)
    }

    /// Write the study to its configured destination.
    ///
    /// Printed output goes to `sink`. Writing again without changes leaves every file
    /// untouched unless `overwrite` is set.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::InvalidState`] before generation and [`StudyError::Write`]
    /// when a file cannot be written.
    pub fn write(&mut self, sink: &mut dyn Write) -> Result<WriteReport, StudyError> {
        self.expect_state(
            "write",
            &[
                GeneratorState::Generated,
                GeneratorState::Merged,
                GeneratorState::Written,
            ],
        )?;
        let study = self.study.as_ref().ok_or(StudyError::InvalidState {
            operation: "write",
            state: self.state.to_string(),
        })?;
        let report = write_study(study, &self.options.write_settings()?, sink)?;
        self.state = GeneratorState::Written;
        Ok(report)
    }

    /// Run the whole pipeline: validate, generate, merge with the previous study file
    /// when configured, and write.
    ///
    /// # Errors
    ///
    /// Returns the first error of any step.
    pub fn run(&mut self, sink: &mut dyn Write) -> Result<WriteReport, StudyError> {
        self.validate()?;
        self.generate()?;
        self.merge_previous()?;
        self.write(sink)
    }

    /// Fail unless the generator is in one of `allowed`.
    fn expect_state(
        &self,
        operation: &'static str,
        allowed: &[GeneratorState],
    ) -> Result<(), StudyError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(StudyError::InvalidState {
                operation,
                state: self.state.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SchemaError;

    fn generator(kind: GeneratorKind, schema: &str, options: GeneratorOptions) -> ParameterGenerator {
        ParameterGenerator::new(
            kind,
            ParameterSchema::from_yaml_str(schema).expect("valid yaml"),
            options,
        )
    }

    #[test]
    fn steps_must_run_in_order() {
        let mut generator = generator(
            GeneratorKind::CartesianProduct,
            "a: [1]\n",
            GeneratorOptions::default(),
        );
        assert!(matches!(
            generator.generate(),
            Err(StudyError::InvalidState { .. })
        ));
        assert!(matches!(
            generator.write(&mut Vec::new()),
            Err(StudyError::InvalidState { .. })
        ));
        generator.validate().expect("valid schema");
        assert_eq!(generator.state(), GeneratorState::Validated);
        generator.generate().expect("samples drawn");
        assert_eq!(generator.state(), GeneratorState::Generated);
    }

    #[test]
    fn invalid_schema_leaves_generator_unvalidated() {
        let mut generator = generator(
            GeneratorKind::LatinHypercube,
            "a:\n  distribution: norm\n",
            GeneratorOptions::default(),
        );
        let error = generator.validate().expect_err("num_simulations missing");
        assert!(matches!(
            error,
            StudyError::Schema(SchemaError::MissingKey { .. })
        ));
        assert_eq!(generator.state(), GeneratorState::Unvalidated);
        assert!(generator.design().is_none());
    }

    #[test]
    fn conflicting_outputs_are_rejected() {
        let options = GeneratorOptions {
            output_file_template: Some("set".to_string()),
            output_file: Some(PathBuf::from("study.yaml")),
            ..GeneratorOptions::default()
        };
        let mut generator = generator(GeneratorKind::CartesianProduct, "a: [1]\n", options);
        assert!(matches!(
            generator.validate(),
            Err(StudyError::ConflictingOutputs)
        ));
    }

    #[test]
    fn output_template_names_the_sets() {
        let options = GeneratorOptions {
            output_file_template: Some("input_@number".to_string()),
            dryrun: true,
            ..GeneratorOptions::default()
        };
        let mut generator = generator(GeneratorKind::OneAtATime, "a: [1, 2]\nb: [3]\n", options);
        generator.validate().expect("valid schema");
        let study = generator.generate().expect("samples drawn");
        assert_eq!(study.parameter_set_names(), ["input_0", "input_1"]);
    }

    #[test]
    fn output_template_directory_is_kept_out_of_set_names() {
        let options = GeneratorOptions {
            output_file_template: Some("build/inputs/input_@number".to_string()),
            ..GeneratorOptions::default()
        };
        assert_eq!(options.set_name_template().render(3), "input_3");
        assert_eq!(
            options.write_settings().expect("one output kind").target,
            OutputTarget::PerSet(PathBuf::from("build/inputs"))
        );

        let bare = GeneratorOptions {
            output_file_template: Some("input_@number".to_string()),
            ..GeneratorOptions::default()
        };
        assert_eq!(
            bare.write_settings().expect("one output kind").target,
            OutputTarget::PerSet(PathBuf::new())
        );
    }

    #[test]
    fn missing_previous_study_is_optional_unless_required() {
        let directory = tempfile::tempdir().expect("temporary directory");
        let missing = directory.path().join("previous.json");
        let mut options = GeneratorOptions {
            previous_parameter_study: Some(missing.clone()),
            ..GeneratorOptions::default()
        };
        let mut lenient = generator(GeneratorKind::CartesianProduct, "a: [1]\n", options.clone());
        lenient.validate().expect("valid schema");
        lenient.generate().expect("samples drawn");
        assert!(!lenient.merge_previous().expect("missing file tolerated"));

        options.require_previous_parameter_study = true;
        let mut strict = generator(GeneratorKind::CartesianProduct, "a: [1]\n", options);
        strict.validate().expect("valid schema");
        strict.generate().expect("samples drawn");
        assert!(matches!(
            strict.merge_previous(),
            Err(StudyError::MissingPreviousStudy(path)) if path == missing
        ));
    }

    #[test]
    fn options_load_from_yaml() {
        let options: GeneratorOptions =
            serde_yaml::from_str("output_file: study.json\noutput_file_type: json\nseed: 3\n")
                .expect("valid options");
        assert_eq!(options.output_file_type, OutputFileType::Json);
        assert_eq!(options.seed, Some(3));
        assert_eq!(options.set_name_template, DEFAULT_SET_NAME_TEMPLATE);
    }
}
