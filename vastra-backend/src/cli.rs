use clap::Parser;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "vastra-backend", version, about = "Try-on job service")]
pub struct CliArgs {
    /// Path to configuration file (TOML, YAML or JSON).
    #[arg(short = 'c', long = "config-path", env = "VASTRA_CONFIG_PATH")]
    pub config_path: Option<String>,
}
