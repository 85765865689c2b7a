use crate::adapters::http::ResilientFetcher;
use crate::adapters::predictor::PredictorGateway;
use crate::config::AppConfig;
use crate::core::aggregator::{completeness_guard, Aggregator, HttpAggregator};
use crate::core::{Coordinate, EnvironmentalRecord, Pipeline, PredictionInput, PredictionResult};
use crate::domain::model::{SoilReading, WeatherReading};
use crate::domain::ports::{DegradationObserver, SourceAdapter};
use crate::utils::error::Result;
use reqwest::Client;
use std::sync::Arc;

/// extract = 合併三個來源，transform = 完整性檢查，load = 呼叫預測器
pub struct NutrientPipeline<E, W, S> {
    aggregator: Aggregator<E, W, S>,
    predictor: PredictorGateway,
}

pub type HttpNutrientPipeline = NutrientPipeline<
    crate::adapters::elevation::ElevationAdapter,
    crate::adapters::weather::WeatherAdapter,
    crate::adapters::soil::SoilAdapter,
>;

impl HttpNutrientPipeline {
    pub fn from_config(config: &AppConfig, observer: Arc<dyn DegradationObserver>) -> Self {
        let client = Client::new();
        let fetcher = ResilientFetcher::with_client(client.clone());
        Self::new(
            HttpAggregator::from_config(&config.sources, fetcher, observer),
            PredictorGateway::from_config(&config.predictor, client),
        )
    }
}

impl<E, W, S> NutrientPipeline<E, W, S> {
    pub fn new(aggregator: Aggregator<E, W, S>, predictor: PredictorGateway) -> Self {
        Self {
            aggregator,
            predictor,
        }
    }
}

#[async_trait::async_trait]
impl<E, W, S> Pipeline for NutrientPipeline<E, W, S>
where
    E: SourceAdapter<Output = Option<f64>>,
    W: SourceAdapter<Output = WeatherReading>,
    S: SourceAdapter<Output = SoilReading>,
{
    async fn extract(&self, coordinate: Coordinate) -> Result<EnvironmentalRecord> {
        self.aggregator.collect(coordinate).await
    }

    fn transform(&self, record: &EnvironmentalRecord) -> Result<PredictionInput> {
        completeness_guard(record)
    }

    async fn load(&self, input: PredictionInput) -> Result<PredictionResult> {
        self.predictor.predict(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregator::tests::{
        broken_soil, empty_soil, good_elevation, good_soil, good_weather, source,
    };
    use crate::domain::ports::PredictorBackend;
    use crate::utils::error::PipelineError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PredictorBackend for CountingBackend {
        async fn invoke(&self, _args: [f64; 4]) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(r#"{"N": 10, "P": 5, "K": 8}"#.to_string())
        }
    }

    #[tokio::test]
    async fn test_pipeline_stages() {
        let backend = Arc::new(CountingBackend::default());
        let pipeline = NutrientPipeline::new(
            Aggregator::new(
                source("elevation", good_elevation),
                source("weather", good_weather),
                source("soil", good_soil),
            ),
            PredictorGateway::new(backend.clone()),
        );

        let record = pipeline.extract(Coordinate::new(1.0, 2.0)).await.unwrap();
        let input = pipeline.transform(&record).unwrap();
        assert_eq!(input.ph, 6.5);

        let prediction = pipeline.load(input).await.unwrap();
        assert_eq!(prediction.get("K"), Some(&serde_json::json!(8)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transform_rejects_incomplete_record() {
        let backend = Arc::new(CountingBackend::default());
        let pipeline = NutrientPipeline::new(
            Aggregator::new(
                source("elevation", good_elevation),
                source("weather", good_weather),
                source("soil", empty_soil),
            ),
            PredictorGateway::new(backend.clone()),
        );

        let record = pipeline.extract(Coordinate::new(1.0, 2.0)).await.unwrap();
        let err = pipeline.transform(&record).unwrap_err();

        assert!(matches!(err, PipelineError::MissingInputs { .. }));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_extract_propagates_structural_errors() {
        let pipeline = NutrientPipeline::new(
            Aggregator::new(
                source("elevation", good_elevation),
                source("weather", good_weather),
                source("soil", broken_soil),
            ),
            PredictorGateway::new(Arc::new(CountingBackend::default())),
        );

        let err = pipeline.extract(Coordinate::new(1.0, 2.0)).await.unwrap_err();
        assert!(matches!(err, PipelineError::SourceShape { .. }));
    }
}
