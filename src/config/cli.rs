use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "landlord")]
#[command(about = "Provisions per-tenant service instances on dedicated ports")]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "landlord.toml")]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Load and validate the configuration, print a summary, then exit
    #[arg(long)]
    pub dry_run: bool,
}
