#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_doc_code_examples)]
#![warn(clippy::missing_docs_in_private_items)]
#![doc = include_str!("../README.md")]

pub mod distribution;
pub mod errors;
pub mod generator;
pub mod hashing;
pub mod layout;
pub mod merge;
pub mod sampling;
pub mod schema;
pub mod study;
pub mod tree;
pub mod value;
pub mod writer;

pub use distribution::{Distribution, DistributionKind};
pub use errors::{
    ChoicesError, DistributionError, GraphExportError, SchemaError, StudyError, TreeParseError,
};
pub use generator::{GeneratorOptions, GeneratorState, ParameterGenerator};
pub use hashing::set_hash;
pub use layout::{to_dot, to_graphml, Layout, Point};
pub use merge::merge_studies;
pub use sampling::{Sampler, Samples, StudyDesign, MAX_DIMENSIONS};
pub use schema::{GeneratorKind, ParameterSchema};
pub use study::{ParameterSet, ParameterStudy, SetNameTemplate};
pub use tree::{
    parse_output, tree_lines_from_scons, BuildGraph, BuildNode, StatusCode, VisualizeOptions,
};
pub use value::ParameterValue;
pub use writer::{OutputFileType, OutputTarget, WriteReport, WriteSettings};
