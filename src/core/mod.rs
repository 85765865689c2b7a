pub mod aggregator;
pub mod etl;
pub mod pipeline;

pub use crate::domain::model::{
    Coordinate, EnvironmentalRecord, PipelineResponse, PredictionInput, PredictionResult,
};
pub use crate::domain::ports::{Pipeline, SourceAdapter};
pub use crate::utils::error::Result;
