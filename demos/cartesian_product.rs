use waves::{GeneratorKind, GeneratorOptions, ParameterGenerator, ParameterSchema};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let schema = ParameterSchema::from_yaml_str(
        "width: [1.0, 2.0]\nheight: [0.5, 1.0]\nmaterial: [steel, aluminum]\n",
    )?;
    let mut generator = ParameterGenerator::new(
        GeneratorKind::CartesianProduct,
        schema,
        GeneratorOptions::default(),
    );
    generator.run(&mut std::io::stdout())?;

    if let Some(study) = generator.study() {
        for set in study.parameter_sets() {
            println!("{} {}", set.set_name, &set.set_hash[..12]);
        }
    }

    Ok(())
}
