//! Materialize a parameter study on disk.
//!
//! Files whose content is already up to date are left untouched so build systems that
//! track timestamps do not rebuild their dependents.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::errors::{ChoicesError, StudyError};
use crate::study::ParameterStudy;

/// Name of the manifest listing every written parameter set file.
pub const META_FILE_NAME: &str = "parameter_study_meta.txt";

/// Names accepted by [`OutputFileType::from_str`].
pub const OUTPUT_FILE_TYPE_CHOICES: [&str; 2] = ["yaml", "json"];

/// Serialization format of parameter study files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFileType {
    /// Plain YAML mapping of parameter names to values.
    #[default]
    Yaml,
    /// JSON dataset holding samples, hashes and quantiles.
    Json,
}

impl OutputFileType {
    /// File extension without the leading dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
        }
    }

    /// Infer the format from a file extension.
    ///
    /// # Errors
    ///
    /// Returns [`ChoicesError`] when the extension is not `.yaml`, `.yml` or `.json`.
    pub fn from_path(path: &Path) -> Result<Self, ChoicesError> {
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .unwrap_or_default();
        match extension {
            "yml" => Ok(Self::Yaml),
            other => other.parse().map_err(|_| {
                ChoicesError::new("file extension", other, &["yaml", "yml", "json"])
            }),
        }
    }
}

impl FromStr for OutputFileType {
    type Err = ChoicesError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "yaml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            other => Err(ChoicesError::new(
                "output_file_type",
                other,
                &OUTPUT_FILE_TYPE_CHOICES,
            )),
        }
    }
}

impl fmt::Display for OutputFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Where a study is written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputTarget {
    /// Print the whole study to the supplied sink.
    Stdout,
    /// One file holding every set.
    Combined(PathBuf),
    /// One file per set in the given directory, named after the set with the format
    /// extension appended.
    PerSet(PathBuf),
}

/// How a study is written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteSettings {
    /// Destination of the study.
    pub target: OutputTarget,
    /// Serialization format.
    pub file_type: OutputFileType,
    /// Rewrite files even when their content is unchanged.
    pub overwrite: bool,
    /// Print intended writes instead of performing them.
    pub dryrun: bool,
    /// Write [`META_FILE_NAME`] next to the output files.
    pub write_meta: bool,
}

/// Outcome of a write.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Files written to disk.
    pub written: Vec<PathBuf>,
    /// Files left untouched because their content was already current.
    pub skipped: Vec<PathBuf>,
    /// Files that a dry run would have written.
    pub planned: Vec<PathBuf>,
}

impl WriteReport {
    /// Every output path considered, in write order.
    #[must_use]
    pub fn paths(&self) -> Vec<&PathBuf> {
        self.written
            .iter()
            .chain(&self.skipped)
            .chain(&self.planned)
            .collect()
    }
}

/// Write `study` according to `settings`.
///
/// Printed output (STDOUT target and dry runs) goes to `sink`.
///
/// # Errors
///
/// Returns [`StudyError::Write`] on the first file that cannot be written. Files written
/// before the failure are left in place.
pub fn write_study(
    study: &ParameterStudy,
    settings: &WriteSettings,
    sink: &mut dyn Write,
) -> Result<WriteReport, StudyError> {
    let mut report = WriteReport::default();
    let outputs = match &settings.target {
        OutputTarget::Stdout => {
            let text = render_study(study, settings.file_type)?;
            sink.write_all(text.as_bytes()).map_err(sink_error)?;
            return Ok(report);
        }
        OutputTarget::Combined(path) => vec![(path.clone(), render_study(study, settings.file_type)?)],
        OutputTarget::PerSet(directory) => render_sets(study, directory, settings.file_type)?,
    };

    let mut manifest = String::new();
    for (path, content) in &outputs {
        conditional_write(path, content, settings, sink, &mut report)?;
        manifest.push_str(&path.display().to_string());
        manifest.push('\n');
    }

    if settings.write_meta {
        let directory = outputs
            .first()
            .and_then(|(path, _)| path.parent())
            .unwrap_or_else(|| Path::new(""));
        let meta = directory.join(META_FILE_NAME);
        conditional_write(&meta, &manifest, settings, sink, &mut report)?;
    }
    Ok(report)
}

/// Render the whole study in `file_type`.
fn render_study(study: &ParameterStudy, file_type: OutputFileType) -> Result<String, StudyError> {
    match file_type {
        OutputFileType::Yaml => study.to_yaml(),
        OutputFileType::Json => study.to_json(),
    }
}

/// Render one file per set inside `directory`, named after the set.
fn render_sets(
    study: &ParameterStudy,
    directory: &Path,
    file_type: OutputFileType,
) -> Result<Vec<(PathBuf, String)>, StudyError> {
    study
        .parameter_sets()
        .map(|set| -> Result<(PathBuf, String), StudyError> {
            let path = directory.join(format!("{}.{}", set.set_name, file_type.extension()));
            let content = match file_type {
                OutputFileType::Yaml => serde_yaml::to_string(&set.to_mapping())?,
                OutputFileType::Json => {
                    ParameterStudy::from_sets(study.parameter_names().to_vec(), vec![set])
                        .to_json()?
                }
            };
            Ok((path, content))
        })
        .collect()
}

/// Write `content` to `path` unless the file already holds exactly that content.
fn conditional_write(
    path: &Path,
    content: &str,
    settings: &WriteSettings,
    sink: &mut dyn Write,
    report: &mut WriteReport,
) -> Result<(), StudyError> {
    if !settings.overwrite && is_current(path, content) {
        tracing::debug!(path = %path.display(), "content unchanged, skipping write");
        report.skipped.push(path.to_path_buf());
        return Ok(());
    }
    if settings.dryrun {
        writeln!(sink, "{}", path.display()).map_err(sink_error)?;
        sink.write_all(content.as_bytes()).map_err(sink_error)?;
        report.planned.push(path.to_path_buf());
        return Ok(());
    }
    std::fs::write(path, content).map_err(|source| StudyError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), "wrote parameter study file");
    report.written.push(path.to_path_buf());
    Ok(())
}

/// Whether `path` already holds `content`.
fn is_current(path: &Path, content: &str) -> bool {
    std::fs::read_to_string(path).map_or(false, |existing| existing == content)
}

/// Wrap a failure of the print sink.
fn sink_error(source: std::io::Error) -> StudyError {
    StudyError::Write {
        path: PathBuf::from("-"),
        source,
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::sampling::Samples;
    use crate::study::SetNameTemplate;
    use crate::value::ParameterValue;

    fn study(template: &str) -> ParameterStudy {
        ParameterStudy::from_samples(
            Samples {
                parameter_names: vec!["a".to_string()],
                samples: array![[ParameterValue::Integer(1)], [ParameterValue::Integer(2)]],
                quantiles: None,
            },
            &SetNameTemplate::new(template),
        )
    }

    fn settings(target: OutputTarget) -> WriteSettings {
        WriteSettings {
            target,
            file_type: OutputFileType::Yaml,
            overwrite: false,
            dryrun: false,
            write_meta: false,
        }
    }

    #[test]
    fn output_file_type_choices() {
        assert_eq!("json".parse::<OutputFileType>(), Ok(OutputFileType::Json));
        let error = "h5".parse::<OutputFileType>().expect_err("unsupported");
        assert_eq!(error.choices, vec!["yaml", "json"]);
        assert_eq!(
            OutputFileType::from_path(Path::new("study.yml")),
            Ok(OutputFileType::Yaml)
        );
    }

    #[test]
    fn stdout_target_prints_the_study() {
        let mut sink = Vec::new();
        let report = write_study(&study("set"), &settings(OutputTarget::Stdout), &mut sink)
            .expect("printing succeeds");
        assert_eq!(String::from_utf8(sink).expect("utf8"), "set0:\n  a: 1\nset1:\n  a: 2\n");
        assert!(report.paths().is_empty());
    }

    #[test]
    fn per_set_files_are_skipped_when_unchanged() {
        let directory = tempfile::tempdir().expect("temporary directory");
        let study = study("set");
        let mut settings = settings(OutputTarget::PerSet(directory.path().to_path_buf()));
        settings.write_meta = true;

        let first = write_study(&study, &settings, &mut Vec::new()).expect("first write");
        assert_eq!(first.written.len(), 3);
        let set0 = directory.path().join("set0.yaml");
        assert_eq!(std::fs::read_to_string(&set0).expect("set file"), "a: 1\n");
        let meta = std::fs::read_to_string(directory.path().join(META_FILE_NAME)).expect("meta");
        assert_eq!(meta.lines().count(), 2);

        let second = write_study(&study, &settings, &mut Vec::new()).expect("second write");
        assert!(second.written.is_empty());
        assert_eq!(second.skipped.len(), 3);

        settings.overwrite = true;
        let forced = write_study(&study, &settings, &mut Vec::new()).expect("forced write");
        assert_eq!(forced.written.len(), 3);
    }

    #[test]
    fn dryrun_prints_without_writing() {
        let directory = tempfile::tempdir().expect("temporary directory");
        let path = directory.path().join("study.json");
        let mut settings = settings(OutputTarget::Combined(path.clone()));
        settings.file_type = OutputFileType::Json;
        settings.dryrun = true;

        let mut sink = Vec::new();
        let report = write_study(&study("set"), &settings, &mut sink).expect("dry run");
        assert_eq!(report.planned, vec![path.clone()]);
        assert!(!path.exists());
        assert!(String::from_utf8(sink).expect("utf8").contains("parameter_set_hashes"));
    }

    #[test]
    fn missing_directory_is_a_write_error() {
        let directory = tempfile::tempdir().expect("temporary directory");
        let path = directory.path().join("missing").join("study.yaml");
        let error = write_study(
            &study("set"),
            &settings(OutputTarget::Combined(path)),
            &mut Vec::new(),
        )
        .expect_err("parent directory missing");
        assert!(matches!(error, StudyError::Write { .. }));
    }
}
