use crate::adapters::http::ResilientFetcher;
use crate::config::ElevationSourceConfig;
use crate::domain::model::Coordinate;
use crate::domain::ports::{Degradation, DegradationObserver, SourceAdapter};
use crate::utils::error::{PipelineError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

const SOURCE: &str = "elevation";

/// Open-Elevation 單點查詢
pub struct ElevationAdapter {
    fetcher: ResilientFetcher,
    config: ElevationSourceConfig,
    observer: Arc<dyn DegradationObserver>,
}

impl ElevationAdapter {
    pub fn new(
        fetcher: ResilientFetcher,
        config: ElevationSourceConfig,
        observer: Arc<dyn DegradationObserver>,
    ) -> Self {
        Self {
            fetcher,
            config,
            observer,
        }
    }

    fn query(coordinate: &Coordinate) -> Vec<(String, String)> {
        vec![(
            "locations".to_string(),
            format!("{},{}", coordinate.latitude, coordinate.longitude),
        )]
    }
}

#[async_trait]
impl SourceAdapter for ElevationAdapter {
    type Output = Option<f64>;

    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch(&self, coordinate: &Coordinate) -> Result<Option<f64>> {
        let raw = self
            .fetcher
            .fetch(&self.config.endpoint, &Self::query(coordinate), &self.config.retry)
            .await;
        normalize_elevation(raw.as_ref(), self.observer.as_ref())
    }
}

/// 取出 `results[0].elevation`
///
/// 沒有回應或 `results` 缺少/為空時視為致命錯誤；
/// 高程值本身不是數字則降級為 `None`。
pub fn normalize_elevation(
    raw: Option<&Value>,
    observer: &dyn DegradationObserver,
) -> Result<Option<f64>> {
    let raw = raw.ok_or_else(|| PipelineError::SourceShape {
        source_name: SOURCE,
        message: "no response after retries".to_string(),
    })?;

    let first = raw
        .get("results")
        .and_then(Value::as_array)
        .and_then(|results| results.first())
        .ok_or_else(|| PipelineError::SourceShape {
            source_name: SOURCE,
            message: "results list is missing or empty".to_string(),
        })?;

    match first.get("elevation").and_then(Value::as_f64) {
        Some(elevation) => Ok(Some(elevation)),
        None => {
            observer.degraded(Degradation {
                source: SOURCE,
                field: "elevation".to_string(),
                reason: "results[0].elevation is missing or not numeric".to_string(),
            });
            Ok(None)
        }
    }
}
