use crate::adapters::http::ResilientFetcher;
use crate::config::WeatherSourceConfig;
use crate::domain::model::{Coordinate, WeatherReading};
use crate::domain::ports::{Degradation, DegradationObserver, SourceAdapter};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

const SOURCE: &str = "weather";

/// NASA POWER 日資料單點查詢，固定查詢單一日期
pub struct WeatherAdapter {
    fetcher: ResilientFetcher,
    config: WeatherSourceConfig,
    observer: Arc<dyn DegradationObserver>,
}

impl WeatherAdapter {
    pub fn new(
        fetcher: ResilientFetcher,
        config: WeatherSourceConfig,
        observer: Arc<dyn DegradationObserver>,
    ) -> Self {
        Self {
            fetcher,
            config,
            observer,
        }
    }

    fn query(&self, coordinate: &Coordinate) -> Vec<(String, String)> {
        vec![
            ("parameters".to_string(), self.config.parameters.query_list()),
            ("community".to_string(), self.config.community.clone()),
            ("longitude".to_string(), coordinate.longitude.to_string()),
            ("latitude".to_string(), coordinate.latitude.to_string()),
            ("format".to_string(), "JSON".to_string()),
            ("start".to_string(), self.config.date.clone()),
            ("end".to_string(), self.config.date.clone()),
        ]
    }
}

#[async_trait]
impl SourceAdapter for WeatherAdapter {
    type Output = WeatherReading;

    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch(&self, coordinate: &Coordinate) -> Result<WeatherReading> {
        let raw = self
            .fetcher
            .fetch(&self.config.endpoint, &self.query(coordinate), &self.config.retry)
            .await;
        Ok(normalize_weather(raw.as_ref(), &self.config, self.observer.as_ref()))
    }
}

/// 讀取 `properties.parameter.<PARAM>.<YYYYMMDD>`
///
/// 氣象資料缺失永遠不是致命錯誤：整個容器缺少時三個值都是 `None`。
pub fn normalize_weather(
    raw: Option<&Value>,
    config: &WeatherSourceConfig,
    observer: &dyn DegradationObserver,
) -> WeatherReading {
    let fields = [
        ("temperature", config.parameters.temperature.as_str()),
        ("humidity", config.parameters.humidity.as_str()),
        ("rainfall", config.parameters.rainfall.as_str()),
    ];

    let container = raw
        .and_then(|r| r.get("properties"))
        .and_then(|p| p.get("parameter"))
        .and_then(Value::as_object);

    let Some(container) = container else {
        let reason = if raw.is_none() {
            "no response after retries"
        } else {
            "properties.parameter container is missing"
        };
        for (field, _) in fields {
            observer.degraded(Degradation {
                source: SOURCE,
                field: field.to_string(),
                reason: reason.to_string(),
            });
        }
        return WeatherReading::default();
    };

    let mut values = fields.iter().map(|(field, param)| {
        let value = match container.get(*param) {
            None => Err(format!("series {} is missing", param)),
            Some(series) => match series.get(&config.date).and_then(Value::as_f64) {
                None => Err(format!("{} has no numeric value for {}", param, config.date)),
                Some(v) if config.fill_values.contains(&v) => {
                    Err(format!("{} reported fill value {} for {}", param, v, config.date))
                }
                Some(v) => Ok(v),
            },
        };

        value
            .map_err(|reason| {
                observer.degraded(Degradation {
                    source: SOURCE,
                    field: field.to_string(),
                    reason,
                })
            })
            .ok()
    });

    WeatherReading {
        temperature: values.next().flatten(),
        humidity: values.next().flatten(),
        rainfall: values.next().flatten(),
    }
}
