//! Parse SCons `--tree=status` output into a build graph.
//!
//! Each tree line looks like `[E b   C  ]  | +-build/target`: a bracketed status field,
//! a placement field whose width encodes the depth, and the node name after `+-`.
//! Excluded nodes are dropped together with everything printed beneath them.

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use regex::Regex;
use serde::Deserialize;

use crate::errors::TreeParseError;

/// Pattern of one tree line.
const TREE_LINE_PATTERN: &str = r"^\[(?P<status>[^\]]*)\](?P<placement>[ |]*)\+-(?P<name>.+)$";

/// Status flags printed by `scons --tree=status`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// `E`: the node exists.
    Exists,
    /// `R`: the node exists in a repository only.
    Repository,
    /// `b`: implicit builder.
    ImplicitBuilder,
    /// `B`: explicit builder.
    ExplicitBuilder,
    /// `S`: side effect.
    SideEffect,
    /// `P`: precious.
    Precious,
    /// `A`: always built.
    AlwaysBuild,
    /// `C`: up to date.
    Current,
    /// `N`: not removed by clean.
    NoClean,
    /// `H`: not cached.
    NoCache,
}

impl StatusCode {
    /// Translate one character of the status field.
    #[must_use]
    pub const fn from_flag(flag: char) -> Option<Self> {
        match flag {
            'E' => Some(Self::Exists),
            'R' => Some(Self::Repository),
            'b' => Some(Self::ImplicitBuilder),
            'B' => Some(Self::ExplicitBuilder),
            'S' => Some(Self::SideEffect),
            'P' => Some(Self::Precious),
            'A' => Some(Self::AlwaysBuild),
            'C' => Some(Self::Current),
            'N' => Some(Self::NoClean),
            'H' => Some(Self::NoCache),
            _ => None,
        }
    }

    /// Character printed by SCons for this status.
    #[must_use]
    pub const fn flag(self) -> char {
        match self {
            Self::Exists => 'E',
            Self::Repository => 'R',
            Self::ImplicitBuilder => 'b',
            Self::ExplicitBuilder => 'B',
            Self::SideEffect => 'S',
            Self::Precious => 'P',
            Self::AlwaysBuild => 'A',
            Self::Current => 'C',
            Self::NoClean => 'N',
            Self::NoCache => 'H',
        }
    }

    /// Human readable meaning of the status.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Exists => "exists",
            Self::Repository => "exists in repository only",
            Self::ImplicitBuilder => "implicit builder",
            Self::ExplicitBuilder => "explicit builder",
            Self::SideEffect => "side effect",
            Self::Precious => "precious",
            Self::AlwaysBuild => "always build",
            Self::Current => "current",
            Self::NoClean => "no clean",
            Self::NoCache => "no cache",
        }
    }
}

/// Options for parsing, filtering and laying out a build graph.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VisualizeOptions {
    /// Node names starting or ending with any of these strings are excluded.
    pub exclude_list: Vec<String>,
    /// Node names matching this regular expression are excluded.
    pub exclude_regex: Option<String>,
    /// Blank every node label.
    pub no_labels: bool,
    /// Break labels after every path separator.
    pub break_paths: bool,
    /// Lay layers out top to bottom instead of left to right.
    pub vertical: bool,
    /// Add a `Node count: N` box to exported graphs.
    pub node_count: bool,
}

impl Default for VisualizeOptions {
    fn default() -> Self {
        Self {
            exclude_list: vec!["/usr/bin".to_string()],
            exclude_regex: None,
            no_labels: false,
            break_paths: false,
            vertical: false,
            node_count: false,
        }
    }
}

/// A build target or source in the graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildNode {
    /// Node name as printed by SCons.
    pub name: String,
    /// Display text.
    pub label: String,
    /// Depth in the printed tree, the root is layer 1.
    pub layer: usize,
    /// Status flags of the node.
    pub status: Vec<StatusCode>,
}

/// Directed graph of build nodes; edges point from a node to its dependencies.
#[derive(Clone, Debug, Default)]
pub struct BuildGraph {
    /// Node and edge storage.
    graph: DiGraph<BuildNode, ()>,
    /// Lookup from node name to graph index.
    indices: HashMap<String, NodeIndex>,
}

impl BuildGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Underlying petgraph graph.
    #[must_use]
    pub fn graph(&self) -> &DiGraph<BuildNode, ()> {
        &self.graph
    }

    /// Node called `name`.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&BuildNode> {
        self.indices.get(name).map(|index| &self.graph[*index])
    }

    /// Graph index of the node called `name`.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<NodeIndex> {
        self.indices.get(name).copied()
    }

    /// Whether a node called `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.indices.contains_key(name)
    }

    /// Whether `parent` has an edge to `child`.
    #[must_use]
    pub fn has_edge(&self, parent: &str, child: &str) -> bool {
        match (self.indices.get(parent), self.indices.get(child)) {
            (Some(parent), Some(child)) => self.graph.contains_edge(*parent, *child),
            _ => false,
        }
    }

    /// Names of the nodes with an edge to `name`.
    #[must_use]
    pub fn parents(&self, name: &str) -> Vec<&str> {
        self.indices.get(name).map_or_else(Vec::new, |index| {
            self.graph
                .neighbors_directed(*index, Direction::Incoming)
                .map(|parent| self.graph[parent].name.as_str())
                .collect()
        })
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &BuildNode> {
        self.graph.node_weights()
    }

    /// Add a node, or update the attributes of an existing node with the same name.
    pub fn add_node(&mut self, node: BuildNode) -> NodeIndex {
        if let Some(index) = self.indices.get(&node.name) {
            self.graph[*index] = node;
            return *index;
        }
        let name = node.name.clone();
        let index = self.graph.add_node(node);
        self.indices.insert(name, index);
        index
    }

    /// Add an edge unless it already exists.
    pub fn add_edge(&mut self, parent: NodeIndex, child: NodeIndex) {
        self.graph.update_edge(parent, child, ());
    }
}

/// One parsed line of tree output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeLine {
    /// Status flags.
    pub status: Vec<StatusCode>,
    /// Depth, the root is 1.
    pub indent: usize,
    /// Node name.
    pub name: String,
}

/// Recognizes tree lines and exclusion rules.
#[derive(Clone, Debug)]
pub struct TreeFilter {
    /// Tree line pattern.
    line: Regex,
    /// Excluded name prefixes and suffixes.
    exclude_list: Vec<String>,
    /// Excluded name pattern.
    exclude_regex: Option<Regex>,
}

impl TreeFilter {
    /// Build the filter for `options`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeParseError::Regex`] when the exclusion pattern does not compile.
    pub fn new(options: &VisualizeOptions) -> Result<Self, TreeParseError> {
        Ok(Self {
            line: Regex::new(TREE_LINE_PATTERN)?,
            exclude_list: options.exclude_list.clone(),
            exclude_regex: options
                .exclude_regex
                .as_deref()
                .map(Regex::new)
                .transpose()?,
        })
    }

    /// Parse one line, `None` when it is not part of the tree.
    #[must_use]
    pub fn parse_line(&self, line: &str) -> Option<TreeLine> {
        let captures = self.line.captures(line.trim_end())?;
        let status = captures["status"]
            .chars()
            .filter_map(StatusCode::from_flag)
            .collect();
        Some(TreeLine {
            status,
            indent: captures["placement"].len() / 2 + 1,
            name: captures["name"].to_string(),
        })
    }

    /// Whether `name` matches an exclusion literal or the exclusion pattern.
    #[must_use]
    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude_list
            .iter()
            .any(|exclude| name.starts_with(exclude.as_str()) || name.ends_with(exclude.as_str()))
            || self
                .exclude_regex
                .as_ref()
                .is_some_and(|pattern| pattern.is_match(name))
    }
}

/// Exclusion state carried from one tree line to the next.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExclusionState {
    /// Whether an exclusion is active.
    pub exclude_node: bool,
    /// Indent of the node that started the active exclusion.
    pub exclude_indent: usize,
}

impl ExclusionState {
    /// Advance over a line at `indent`. Returns the next state and whether the line's
    /// node is kept.
    ///
    /// Lines deeper than an active exclusion stay excluded. Returning to the excluded
    /// indent or above clears the exclusion before `excluded` is considered.
    #[must_use]
    pub fn advance(self, indent: usize, excluded: impl FnOnce() -> bool) -> (Self, bool) {
        if self.exclude_node && indent > self.exclude_indent {
            return (self, false);
        }
        if excluded() {
            (
                Self {
                    exclude_node: true,
                    exclude_indent: indent,
                },
                false,
            )
        } else {
            (Self::default(), true)
        }
    }
}

/// Parse tree output into a build graph.
///
/// Lines that do not match the tree format, such as SCons progress messages, are
/// ignored.
///
/// # Errors
///
/// Returns [`TreeParseError::NoNodes`] when no node survives parsing and
/// [`TreeParseError::Regex`] for an invalid exclusion pattern.
///
/// # Examples
/// ```
/// use waves::{parse_output, VisualizeOptions};
///
/// let lines = ["[E b   C  ]+-nominal", "[  B      ]  +-build/nominal/plot.pdf"];
/// let graph = parse_output(lines, &VisualizeOptions::default()).unwrap();
/// assert!(graph.has_edge("nominal", "build/nominal/plot.pdf"));
/// ```
pub fn parse_output<I, S>(lines: I, options: &VisualizeOptions) -> Result<BuildGraph, TreeParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let filter = TreeFilter::new(options)?;
    let mut graph = BuildGraph::new();
    let mut higher_nodes: HashMap<usize, NodeIndex> = HashMap::new();

    lines
        .into_iter()
        .filter_map(|line| filter.parse_line(line.as_ref()))
        .fold(ExclusionState::default(), |state, line| {
            let (state, keep) = state.advance(line.indent, || filter.is_excluded(&line.name));
            if !keep {
                tracing::debug!(node = %line.name, indent = line.indent, "excluded node");
                return state;
            }
            let label = node_label(&line.name, options);
            let index = graph.add_node(BuildNode {
                name: line.name,
                label,
                layer: line.indent,
                status: line.status,
            });
            higher_nodes.insert(line.indent, index);
            if line.indent != 1 {
                match higher_nodes.get(&(line.indent - 1)) {
                    Some(parent) => graph.add_edge(*parent, index),
                    None => tracing::debug!(indent = line.indent, "tree line has no parent"),
                }
            }
            state
        });

    if graph.node_count() == 0 {
        return Err(TreeParseError::NoNodes);
    }
    Ok(graph)
}

/// Display label for `name`.
fn node_label(name: &str, options: &VisualizeOptions) -> String {
    if options.no_labels {
        String::new()
    } else if options.break_paths {
        name.replace('/', "/\n")
    } else {
        name.to_string()
    }
}

/// Run `scons <targets> --tree=status -n` and return its output lines.
///
/// When `sconstruct` is given SCons runs from its directory with that file.
///
/// # Errors
///
/// Returns [`TreeParseError::Command`] when SCons cannot be launched and
/// [`TreeParseError::CommandFailed`] when it exits unsuccessfully.
pub fn tree_lines_from_scons(
    targets: &[&str],
    sconstruct: Option<&Path>,
    extra_arguments: &[&str],
) -> Result<Vec<String>, TreeParseError> {
    let program = "scons";
    let mut command = Command::new(program);
    command.args(targets).arg("--tree=status").arg("-n");
    if let Some(sconstruct) = sconstruct {
        if let Some(name) = sconstruct.file_name() {
            let mut argument = std::ffi::OsString::from("--sconstruct=");
            argument.push(name);
            command.arg(argument);
        }
        if let Some(directory) = sconstruct.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            command.current_dir(directory);
        }
    }
    command.args(extra_arguments);
    tracing::debug!(?command, "running build tool for tree output");

    let output = command.output().map_err(|source| TreeParseError::Command {
        program: program.to_string(),
        source,
    })?;
    if !output.status.success() {
        return Err(TreeParseError::CommandFailed {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(ToString::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> TreeFilter {
        TreeFilter::new(&VisualizeOptions::default()).expect("valid options")
    }

    #[test]
    fn parses_status_indent_and_name() {
        let line = filter()
            .parse_line("[E b   C  ]  | +-build/nominal/mesh.inp")
            .expect("tree line");
        assert_eq!(
            line,
            TreeLine {
                status: vec![
                    StatusCode::Exists,
                    StatusCode::ImplicitBuilder,
                    StatusCode::Current
                ],
                indent: 3,
                name: "build/nominal/mesh.inp".to_string(),
            }
        );
        assert!(filter().parse_line("scons: Reading SConscript files ...").is_none());
    }

    #[test]
    fn exclusion_matches_prefix_suffix_and_regex() {
        let options = VisualizeOptions {
            exclude_list: vec!["/usr/bin".to_string(), ".stdout".to_string()],
            exclude_regex: Some(r"^build/.*\.log$".to_string()),
            ..VisualizeOptions::default()
        };
        let filter = TreeFilter::new(&options).expect("valid options");
        assert!(filter.is_excluded("/usr/bin/abaqus"));
        assert!(filter.is_excluded("build/job.stdout"));
        assert!(filter.is_excluded("build/job.log"));
        assert!(!filter.is_excluded("build/job.odb"));
    }

    #[test]
    fn exclusion_state_cascades_until_indent_returns() {
        let state = ExclusionState::default();
        let (state, keep) = state.advance(2, || true);
        assert!(!keep);
        let (state, keep) = state.advance(3, || false);
        assert!(!keep);
        let (state, keep) = state.advance(2, || false);
        assert!(keep);
        assert_eq!(state, ExclusionState::default());
    }

    #[test]
    fn invalid_regex_is_reported() {
        let options = VisualizeOptions {
            exclude_regex: Some("(".to_string()),
            ..VisualizeOptions::default()
        };
        assert!(matches!(
            parse_output(["[E]+-a"], &options),
            Err(TreeParseError::Regex(_))
        ));
    }

    #[test]
    fn labels_follow_options() {
        let broken = VisualizeOptions {
            break_paths: true,
            ..VisualizeOptions::default()
        };
        assert_eq!(node_label("build/a.txt", &broken), "build/\na.txt");
        let blank = VisualizeOptions {
            no_labels: true,
            ..VisualizeOptions::default()
        };
        assert_eq!(node_label("build/a.txt", &blank), "");
    }
}
