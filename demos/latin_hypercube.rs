use waves::{GeneratorKind, GeneratorOptions, OutputFileType, ParameterGenerator, ParameterSchema};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let schema = ParameterSchema::from_yaml_str(
        "\
num_simulations: 8
youngs_modulus:
  distribution: norm
  loc: 200.0e9
  scale: 10.0e9
poisson_ratio:
  distribution: uniform
  loc: 0.25
  scale: 0.1
",
    )?;
    let options = GeneratorOptions {
        output_file_type: OutputFileType::Json,
        seed: Some(42),
        ..GeneratorOptions::default()
    };
    let mut generator = ParameterGenerator::new(GeneratorKind::LatinHypercube, schema, options);
    generator.run(&mut std::io::stdout())?;

    Ok(())
}
