use clap::Parser;
use geo_nutrient_etl::adapters::observe::TracingObserver;
use geo_nutrient_etl::core::pipeline::HttpNutrientPipeline;
use geo_nutrient_etl::domain::model::ErrorResponse;
use geo_nutrient_etl::utils::error::ErrorSeverity;
use geo_nutrient_etl::utils::{logger, validation::Validate};
use geo_nutrient_etl::{CliArgs, Coordinate, EtlEngine};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // 初始化日誌
    logger::init_cli_logger(args.verbose);

    tracing::info!("Starting geo-nutrient-etl CLI");
    if args.verbose {
        tracing::debug!("CLI args: {:?}", args);
    }

    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config: {}", e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let coordinate = Coordinate::new(args.latitude, args.longitude);
    let pipeline = HttpNutrientPipeline::from_config(&config, Arc::new(TracingObserver));
    let engine = EtlEngine::with_deadline(pipeline, config.request_deadline());

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - prediction will be skipped");
        let record = engine.extract(coordinate).await?;
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    match engine.run(coordinate).await {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Err(e) => {
            // 記錄詳細錯誤信息
            tracing::error!(
                "❌ Request failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            println!("{}", serde_json::to_string_pretty(&ErrorResponse::from(&e))?);

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                ErrorSeverity::Low => 4,      // 資料不足，無法預測
                ErrorSeverity::Medium => 2,   // 來源錯誤，可稍後重試
                ErrorSeverity::High => 1,     // 處理錯誤
                ErrorSeverity::Critical => 3, // 系統錯誤
            };
            std::process::exit(exit_code);
        }
    }

    Ok(())
}
