use crate::adapters::elevation::ElevationAdapter;
use crate::adapters::http::ResilientFetcher;
use crate::adapters::soil::SoilAdapter;
use crate::adapters::weather::WeatherAdapter;
use crate::config::SourcesConfig;
use crate::domain::model::{
    Coordinate, EnvironmentalRecord, PredictionInput, SoilReading, WeatherReading,
};
use crate::domain::ports::{DegradationObserver, SourceAdapter};
use crate::utils::error::{PipelineError, Result};
use std::sync::Arc;
use std::time::Instant;

/// 合併後的紀錄與通過完整性檢查的預測輸入
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub record: EnvironmentalRecord,
    pub input: PredictionInput,
}

/// 同時查詢三個來源並合併為單一紀錄
pub struct Aggregator<E, W, S> {
    elevation: E,
    weather: W,
    soil: S,
}

pub type HttpAggregator = Aggregator<ElevationAdapter, WeatherAdapter, SoilAdapter>;

impl HttpAggregator {
    pub fn from_config(
        sources: &SourcesConfig,
        fetcher: ResilientFetcher,
        observer: Arc<dyn DegradationObserver>,
    ) -> Self {
        Aggregator::new(
            ElevationAdapter::new(fetcher.clone(), sources.elevation.clone(), observer.clone()),
            WeatherAdapter::new(fetcher.clone(), sources.weather.clone(), observer.clone()),
            SoilAdapter::new(fetcher, sources.soil.clone(), observer),
        )
    }
}

impl<E, W, S> Aggregator<E, W, S>
where
    E: SourceAdapter<Output = Option<f64>>,
    W: SourceAdapter<Output = WeatherReading>,
    S: SourceAdapter<Output = SoilReading>,
{
    pub fn new(elevation: E, weather: W, soil: S) -> Self {
        Self {
            elevation,
            weather,
            soil,
        }
    }

    /// 取得並合併三個來源；部分欄位缺值時以 `None` 表示
    pub async fn collect(&self, coordinate: Coordinate) -> Result<EnvironmentalRecord> {
        let started = Instant::now();
        tracing::info!(
            "🌍 Aggregating sources for ({}, {})",
            coordinate.latitude,
            coordinate.longitude
        );

        // 三個來源互不相依，同時等待全部完成
        let (elevation, weather, soil) = tokio::join!(
            self.elevation.fetch(&coordinate),
            self.weather.fetch(&coordinate),
            self.soil.fetch(&coordinate),
        );

        let elevation = elevation.inspect_err(|e| {
            tracing::error!("❌ {} source failed: {}", self.elevation.name(), e)
        })?;
        let weather = weather
            .inspect_err(|e| tracing::error!("❌ {} source failed: {}", self.weather.name(), e))?;
        let soil =
            soil.inspect_err(|e| tracing::error!("❌ {} source failed: {}", self.soil.name(), e))?;

        let record = EnvironmentalRecord::merge(coordinate, elevation, weather, soil);
        tracing::info!("🌍 Sources merged in {:?}", started.elapsed());
        Ok(record)
    }

    pub async fn aggregate(&self, coordinate: Coordinate) -> Result<Aggregation> {
        let record = self.collect(coordinate).await?;
        let input = completeness_guard(&record)?;
        Ok(Aggregation { record, input })
    }
}

/// 四個預測輸入任一缺值即拒絕
pub fn completeness_guard(record: &EnvironmentalRecord) -> Result<PredictionInput> {
    let partial = record.partial_input();
    match partial.complete() {
        Some(input) => Ok(input),
        None => {
            tracing::warn!(
                "❗ Missing inputs for prediction: {:?}",
                partial.missing_fields()
            );
            Err(PipelineError::MissingInputs {
                input: partial,
                record: Box::new(record.clone()),
            })
        }
    }
}
