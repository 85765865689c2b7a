use crate::config::AppConfig;
use crate::utils::error::Result;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "geo-nutrient-etl")]
#[command(about = "Fetch elevation, weather and soil data for a coordinate and predict N/P/K levels")]
pub struct CliArgs {
    /// Latitude of the location
    #[arg(long, allow_hyphen_values = true)]
    pub latitude: f64,

    /// Longitude of the location
    #[arg(long, allow_hyphen_values = true)]
    pub longitude: f64,

    /// Path to TOML configuration file (defaults are used when omitted)
    #[arg(short, long)]
    pub config: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Only fetch and merge the environmental data, skip prediction
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    pub fn load_config(&self) -> Result<AppConfig> {
        match &self.config {
            Some(path) => AppConfig::from_file(path),
            None => Ok(AppConfig::default()),
        }
    }
}
