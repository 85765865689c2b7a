pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliArgs;

pub use adapters::predictor::PredictorGateway;
pub use config::AppConfig;
pub use core::{aggregator::Aggregator, etl::EtlEngine, pipeline::NutrientPipeline};
pub use domain::model::{Coordinate, EnvironmentalRecord, PipelineResponse};
pub use utils::error::{PipelineError, Result};
