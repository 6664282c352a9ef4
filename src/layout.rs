//! Deterministic multipartite layout and export of build graphs.

use std::collections::BTreeMap;

use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, EdgeReference, NodeIndex};
use petgraph::visit::EdgeRef;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::errors::GraphExportError;
use crate::tree::{BuildGraph, BuildNode, VisualizeOptions};

/// Namespace declared on the GraphML root element.
const GRAPHML_NAMESPACE: &str = "http://graphml.graphdrawing.org/xmlns";

/// Position of a node in layout coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

/// Node positions with nodes of equal layer sharing one column, or one row when vertical.
///
/// Coordinates are scaled so the largest magnitude is 1.
#[derive(Clone, Debug, PartialEq)]
pub struct Layout {
    /// Positions indexed by node index.
    positions: Vec<Point>,
    /// Whether layers run top to bottom.
    vertical: bool,
}

impl Layout {
    /// Lay out `graph` by node layer.
    ///
    /// Layers are placed in ascending order. Within a layer nodes keep insertion order
    /// and are centered on the axis. With `vertical` the first layer is on top.
    #[must_use]
    pub fn multipartite(graph: &BuildGraph, vertical: bool) -> Self {
        let mut positions = vec![Point { x: 0.0, y: 0.0 }; graph.node_count()];
        for (column, (_, members)) in layers(graph).iter().enumerate() {
            let center = (members.len() as f64 - 1.0) / 2.0;
            for (row, index) in members.iter().enumerate() {
                let along = column as f64;
                let across = row as f64 - center;
                positions[index.index()] = if vertical {
                    Point {
                        x: across,
                        y: -along,
                    }
                } else {
                    Point {
                        x: along,
                        y: across,
                    }
                };
            }
        }

        let extent = positions
            .iter()
            .flat_map(|point| [point.x.abs(), point.y.abs()])
            .fold(0.0_f64, f64::max);
        if extent > 0.0 {
            for point in &mut positions {
                point.x /= extent;
                point.y /= extent;
            }
        }
        Self {
            positions,
            vertical,
        }
    }

    /// Whether layers run top to bottom.
    #[must_use]
    pub const fn is_vertical(&self) -> bool {
        self.vertical
    }

    /// Position of the node at `index`.
    #[must_use]
    pub fn position(&self, index: NodeIndex) -> Option<Point> {
        self.positions.get(index.index()).copied()
    }

    /// Position of the node called `name`.
    #[must_use]
    pub fn position_of(&self, graph: &BuildGraph, name: &str) -> Option<Point> {
        graph.index(name).and_then(|index| self.position(index))
    }
}

/// Nodes grouped by layer in ascending layer order, insertion order within a layer.
#[must_use]
pub fn layers(graph: &BuildGraph) -> Vec<(usize, Vec<NodeIndex>)> {
    let mut grouped: BTreeMap<usize, Vec<NodeIndex>> = BTreeMap::new();
    for index in graph.graph().node_indices() {
        grouped
            .entry(graph.graph()[index].layer)
            .or_default()
            .push(index);
    }
    grouped.into_iter().collect()
}

/// Text of the node count annotation.
#[must_use]
pub fn node_count_label(graph: &BuildGraph) -> String {
    format!("Node count: {}", graph.node_count())
}

/// Render `graph` as GraphML with labels, layers, status flags and positions.
///
/// # Errors
///
/// Returns [`GraphExportError`] if the XML writer fails.
pub fn to_graphml(
    graph: &BuildGraph,
    layout: &Layout,
    options: &VisualizeOptions,
) -> Result<String, GraphExportError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    write(
        &mut writer,
        Event::Start(BytesStart::new("graphml").with_attributes([("xmlns", GRAPHML_NAMESPACE)])),
    )?;
    for (id, domain, name, kind) in [
        ("label", "node", "label", "string"),
        ("layer", "node", "layer", "int"),
        ("status", "node", "status", "string"),
        ("x", "node", "x", "double"),
        ("y", "node", "y", "double"),
        ("node_count", "graph", "node_count", "string"),
    ] {
        write(
            &mut writer,
            Event::Empty(BytesStart::new("key").with_attributes([
                ("id", id),
                ("for", domain),
                ("attr.name", name),
                ("attr.type", kind),
            ])),
        )?;
    }
    write(
        &mut writer,
        Event::Start(
            BytesStart::new("graph").with_attributes([("id", "G"), ("edgedefault", "directed")]),
        ),
    )?;
    if options.node_count {
        data(&mut writer, "node_count", &node_count_label(graph))?;
    }

    let inner = graph.graph();
    for index in inner.node_indices() {
        let node = &inner[index];
        let point = layout.position(index).unwrap_or(Point { x: 0.0, y: 0.0 });
        let status: String = node.status.iter().map(|status| status.flag()).collect();
        write(
            &mut writer,
            Event::Start(BytesStart::new("node").with_attributes([("id", node.name.as_str())])),
        )?;
        data(&mut writer, "label", &node.label)?;
        data(&mut writer, "layer", &node.layer.to_string())?;
        data(&mut writer, "status", &status)?;
        data(&mut writer, "x", &point.x.to_string())?;
        data(&mut writer, "y", &point.y.to_string())?;
        write(&mut writer, Event::End(BytesEnd::new("node")))?;
    }
    for edge in inner.edge_references() {
        write(
            &mut writer,
            Event::Empty(BytesStart::new("edge").with_attributes([
                ("source", inner[edge.source()].name.as_str()),
                ("target", inner[edge.target()].name.as_str()),
            ])),
        )?;
    }

    write(&mut writer, Event::End(BytesEnd::new("graph")))?;
    write(&mut writer, Event::End(BytesEnd::new("graphml")))?;
    let mut document = String::from_utf8(writer.into_inner())?;
    document.push('\n');
    Ok(document)
}

/// Render `graph` as Graphviz DOT with pinned positions.
#[must_use]
pub fn to_dot(graph: &BuildGraph, layout: &Layout, options: &VisualizeOptions) -> String {
    let edge_attributes =
        |_: &DiGraph<BuildNode, ()>, _: EdgeReference<'_, ()>| String::new();
    let node_attributes = |_: &DiGraph<BuildNode, ()>, (index, node): (NodeIndex, &BuildNode)| {
        let point = layout.position(index).unwrap_or(Point { x: 0.0, y: 0.0 });
        format!("label = {:?} pos = \"{},{}!\"", node.label, point.x, point.y)
    };
    let dot = Dot::with_attr_getters(
        graph.graph(),
        &[Config::NodeNoLabel, Config::EdgeNoLabel],
        &edge_attributes,
        &node_attributes,
    );
    let mut text = format!("{dot:?}");
    if options.node_count {
        if let Some(end) = text.rfind('}') {
            text.insert_str(
                end,
                &format!(
                    "    node_count [ shape = box label = {:?} ]\n",
                    node_count_label(graph)
                ),
            );
        }
    }
    text
}

/// Write one XML event.
fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), GraphExportError> {
    writer
        .write_event(event)
        .map_err(|error| GraphExportError::Xml(error.to_string()))
}

/// Write a `<data>` element holding `text`.
fn data(writer: &mut Writer<Vec<u8>>, key: &str, text: &str) -> Result<(), GraphExportError> {
    write(
        writer,
        Event::Start(BytesStart::new("data").with_attributes([("key", key)])),
    )?;
    write(writer, Event::Text(BytesText::new(text)))?;
    write(writer, Event::End(BytesEnd::new("data")))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::tree::parse_output;

    const TREE: [&str; 5] = [
        "[E b   C  ]+-all",
        "[E b   C  ]  +-build/a.txt",
        "[E     C  ]  | +-a.in",
        "[E b   C  ]  +-build/b.txt",
        "[E     C  ]    +-b.in",
    ];

    fn graph() -> BuildGraph {
        parse_output(TREE, &VisualizeOptions::default()).expect("tree parses")
    }

    #[test]
    fn layers_group_equal_depths() {
        let graph = graph();
        let layers = layers(&graph);
        let sizes: Vec<(usize, usize)> = layers
            .iter()
            .map(|(layer, members)| (*layer, members.len()))
            .collect();
        assert_eq!(sizes, vec![(1, 1), (2, 2), (3, 2)]);
    }

    #[test]
    fn horizontal_layout_places_layers_in_columns() {
        let graph = graph();
        let layout = Layout::multipartite(&graph, false);
        let root = layout.position_of(&graph, "all").expect("root placed");
        let a = layout.position_of(&graph, "build/a.txt").expect("placed");
        let b = layout.position_of(&graph, "build/b.txt").expect("placed");
        let leaf = layout.position_of(&graph, "b.in").expect("placed");
        assert_relative_eq!(root.x, 0.0);
        assert_relative_eq!(root.y, 0.0);
        assert_relative_eq!(a.x, 0.5);
        assert_relative_eq!(a.x, b.x);
        assert_relative_eq!(a.y, -0.25);
        assert_relative_eq!(b.y, 0.25);
        assert_relative_eq!(leaf.x, 1.0);
    }

    #[test]
    fn vertical_layout_puts_the_root_on_top() {
        let graph = graph();
        let layout = Layout::multipartite(&graph, true);
        assert!(layout.is_vertical());
        let root = layout.position_of(&graph, "all").expect("root placed");
        let leaf = layout.position_of(&graph, "a.in").expect("placed");
        assert!(root.y > leaf.y);
        assert_relative_eq!(leaf.y, -1.0);
    }

    #[test]
    fn layout_is_deterministic() {
        let graph = graph();
        assert_eq!(
            Layout::multipartite(&graph, false),
            Layout::multipartite(&graph, false)
        );
    }

    #[test]
    fn graphml_lists_nodes_edges_and_count() {
        let graph = graph();
        let options = VisualizeOptions {
            node_count: true,
            ..VisualizeOptions::default()
        };
        let text = to_graphml(&graph, &Layout::multipartite(&graph, false), &options)
            .expect("graphml renders");
        assert!(text.starts_with("<?xml"));
        assert_eq!(text.matches("<node ").count(), 5);
        assert_eq!(text.matches("<edge ").count(), 4);
        assert!(text.contains(r#"<edge source="all" target="build/a.txt"/>"#));
        assert!(text.contains("Node count: 5"));
    }

    #[test]
    fn dot_includes_labels_and_optional_count() {
        let graph = graph();
        let layout = Layout::multipartite(&graph, false);
        let plain = to_dot(&graph, &layout, &VisualizeOptions::default());
        assert!(plain.starts_with("digraph"));
        assert!(plain.contains("label = \"build/a.txt\""));
        assert!(!plain.contains("Node count"));

        let options = VisualizeOptions {
            node_count: true,
            ..VisualizeOptions::default()
        };
        let counted = to_dot(&graph, &layout, &options);
        assert!(counted.contains("label = \"Node count: 5\""));
        assert!(counted.trim_end().ends_with('}'));
    }
}
