use waves::{parse_output, to_dot, to_graphml, Layout, VisualizeOptions};

const TREE: &str = "\
[E b   C  ]+-nominal
[E b   C  ]  +-build/nominal/stress_strain.csv
[E     C  ]  | +-build/nominal/rectangle_compression.odb
[E     C  ]  | | +-build/nominal/rectangle_compression.inp
[  B      ]  | | +-/usr/bin/abaqus
[E     C  ]  | +-build/nominal/extract.py
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let options = VisualizeOptions {
        break_paths: true,
        node_count: true,
        ..VisualizeOptions::default()
    };
    // Pass a SConstruct path to read a live tree with `waves::tree_lines_from_scons`.
    let graph = parse_output(TREE.lines(), &options)?;
    let layout = Layout::multipartite(&graph, options.vertical);

    println!("{}", to_dot(&graph, &layout, &options));
    println!("{}", to_graphml(&graph, &layout, &options)?);

    Ok(())
}
