use clap::Parser;
use geo_nutrient_etl::app::server;
use geo_nutrient_etl::utils::{logger, validation::Validate};
use geo_nutrient_etl::AppConfig;

#[derive(Parser)]
#[command(name = "geo-nutrient-server")]
#[command(about = "HTTP server exposing POST /api/get-data")]
struct Args {
    /// Path to TOML configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the bind address from config
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logger::init_server_logger();

    let mut config = match &args.config {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path);
            AppConfig::from_file(path)?
        }
        None => AppConfig::default(),
    };

    // 應用命令列覆蓋設定
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    tracing::info!("⏱️ Request deadline: {:?}", config.request_deadline());

    server::serve(config).await?;
    Ok(())
}
