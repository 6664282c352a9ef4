#![warn(clippy::pedantic)]

use waves::{parse_output, to_graphml, Layout, StatusCode, TreeParseError, VisualizeOptions};

const SCONS_OUTPUT: &str = "\
scons: Reading SConscript files ...
scons: done reading SConscript files.
scons: Building targets ...
[E b   C  ]+-nominal
[E b   C  ]  +-build/nominal/stress_strain.csv
[E     C  ]  | +-build/nominal/rectangle_compression.odb
[E     C  ]  | | +-build/nominal/rectangle_compression.inp
[  B      ]  | | +-/usr/bin/abaqus
[E     C  ]  | | | +-/usr/bin/abaqus.cfg
[E     C  ]  | +-build/nominal/extract.py
[E b   C  ]  +-build/nominal/rectangle_compression.inp
scons: done building targets.
";

#[test]
fn scons_tree_becomes_a_layered_graph() {
    let graph = parse_output(SCONS_OUTPUT.lines(), &VisualizeOptions::default())
        .expect("tree output parses");

    assert_eq!(graph.node_count(), 5);
    assert!(!graph.contains("/usr/bin/abaqus"));
    assert!(!graph.contains("/usr/bin/abaqus.cfg"));
    assert!(graph.has_edge("nominal", "build/nominal/stress_strain.csv"));
    assert!(graph.has_edge(
        "build/nominal/rectangle_compression.odb",
        "build/nominal/rectangle_compression.inp"
    ));
    assert!(graph.has_edge("build/nominal/stress_strain.csv", "build/nominal/extract.py"));

    let input = graph
        .node("build/nominal/rectangle_compression.inp")
        .expect("input node");
    assert_eq!(input.layer, 2);
    assert_eq!(
        input.status,
        vec![
            StatusCode::Exists,
            StatusCode::ImplicitBuilder,
            StatusCode::Current
        ]
    );
    let mut parents = graph.parents("build/nominal/rectangle_compression.inp");
    parents.sort_unstable();
    assert_eq!(
        parents,
        ["build/nominal/rectangle_compression.odb", "nominal"]
    );
}

#[test]
fn two_line_tree_has_one_edge() {
    let lines = ["[E b   C  ]+-target", "[E     C  ]  +-source"];
    let graph = parse_output(lines, &VisualizeOptions::default()).expect("tree parses");
    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.edge_count(), 1);
    assert!(graph.has_edge("target", "source"));
    assert_eq!(graph.node("source").map(|node| node.layer), Some(2));
}

#[test]
fn excluding_the_root_leaves_no_nodes() {
    let options = VisualizeOptions {
        exclude_regex: Some("^nominal$".to_string()),
        ..VisualizeOptions::default()
    };
    let error = parse_output(SCONS_OUTPUT.lines(), &options).expect_err("everything excluded");
    assert!(matches!(error, TreeParseError::NoNodes));
    assert!(matches!(
        parse_output(["scons: done"], &VisualizeOptions::default()),
        Err(TreeParseError::NoNodes)
    ));
}

#[test]
fn empty_output_has_no_nodes() {
    assert!(matches!(
        parse_output(Vec::<&str>::new(), &VisualizeOptions::default()),
        Err(TreeParseError::NoNodes)
    ));
}

#[test]
fn suffix_exclusion_drops_whole_subtrees() {
    let options = VisualizeOptions {
        exclude_list: vec![".odb".to_string()],
        ..VisualizeOptions::default()
    };
    let graph = parse_output(SCONS_OUTPUT.lines(), &options).expect("tree parses");
    assert!(!graph.contains("build/nominal/rectangle_compression.odb"));
    assert!(!graph.contains("/usr/bin/abaqus"));
    assert!(graph.contains("build/nominal/extract.py"));
    assert_eq!(
        graph.parents("build/nominal/rectangle_compression.inp"),
        ["nominal"]
    );
}

#[test]
fn exported_graph_carries_layout_and_labels() {
    let options = VisualizeOptions {
        break_paths: true,
        node_count: true,
        vertical: true,
        ..VisualizeOptions::default()
    };
    let graph = parse_output(SCONS_OUTPUT.lines(), &options).expect("tree parses");
    let layout = Layout::multipartite(&graph, options.vertical);
    let root = layout.position_of(&graph, "nominal").expect("root placed");
    let deepest = layout
        .position_of(&graph, "build/nominal/extract.py")
        .expect("leaf placed");
    assert!(root.y > deepest.y);

    let document = to_graphml(&graph, &layout, &options).expect("graphml renders");
    assert!(document.contains("Node count: 5"));
    assert!(document.contains("build/\nnominal/\nextract.py"));
}
