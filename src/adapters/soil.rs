//! SoilGrids 土壤屬性查詢。
//!
//! 上游曾回傳三種不同的巢狀結構，正規化時先以 [`SoilLayout`] 判斷容器結構，
//! 再以同一套規則找出指定深度（預設 `0-5cm`）的 `values.mean`：
//!
//! - `properties.<name>.depths[]`（標準格式）
//! - `properties.<name>.layers[]`（與上者可在同一份回應中混用，逐一屬性判斷）
//! - `properties.layers[]`，每個元素帶 `name` 與 `depths[]`
//!
//! 深度區段比對 `label`、字串形式的 `range`，或
//! `{top_depth, bottom_depth, unit_depth}` 物件組成的名稱。

use crate::adapters::http::ResilientFetcher;
use crate::config::SoilSourceConfig;
use crate::domain::model::{Coordinate, SoilProperty, SoilReading};
use crate::domain::ports::{Degradation, DegradationObserver, SourceAdapter};
use crate::utils::error::{PipelineError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

const SOURCE: &str = "soil";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoilLayout {
    /// `properties.<name>` 各自帶 `depths[]` 或 `layers[]`
    PerProperty,
    /// `properties.layers[]`，每個元素帶 `name` 與 `depths[]`
    NamedLayers,
}

impl SoilLayout {
    /// 依容器是否帶有 `layers` 陣列決定結構
    pub fn detect(container: &Map<String, Value>) -> Result<Self> {
        match container.get("layers") {
            Some(Value::Array(_)) => Ok(SoilLayout::NamedLayers),
            Some(_) => Err(PipelineError::SourceShape {
                source_name: SOURCE,
                message: "properties.layers is not an array".to_string(),
            }),
            None => Ok(SoilLayout::PerProperty),
        }
    }

    /// 取得某個屬性的深度區段列表
    fn bands<'a>(
        self,
        container: &'a Map<String, Value>,
        property: SoilProperty,
    ) -> std::result::Result<&'a Vec<Value>, String> {
        let name = property.api_name();
        match self {
            SoilLayout::PerProperty => {
                let entry = container
                    .get(name)
                    .ok_or_else(|| format!("property '{}' not found", name))?;
                // 每個屬性各自判斷：優先 `depths`，其次 `layers`
                entry
                    .get("depths")
                    .and_then(Value::as_array)
                    .or_else(|| entry.get("layers").and_then(Value::as_array))
                    .ok_or_else(|| format!("property '{}' has no depths or layers list", name))
            }
            SoilLayout::NamedLayers => {
                let layer = container
                    .get("layers")
                    .and_then(Value::as_array)
                    .and_then(|layers| {
                        layers
                            .iter()
                            .find(|l| l.get("name").and_then(Value::as_str) == Some(name))
                    })
                    .ok_or_else(|| format!("property '{}' not found", name))?;
                layer
                    .get("depths")
                    .and_then(Value::as_array)
                    .ok_or_else(|| format!("property '{}' has no depths list", name))
            }
        }
    }
}

fn depth_matches(band: &Value, depth: &str) -> bool {
    if band.get("label").and_then(Value::as_str) == Some(depth) {
        return true;
    }

    match band.get("range") {
        Some(Value::String(range)) => range == depth,
        Some(Value::Object(range)) => {
            let top = range.get("top_depth").and_then(Value::as_f64);
            let bottom = range.get("bottom_depth").and_then(Value::as_f64);
            let unit = range
                .get("unit_depth")
                .and_then(Value::as_str)
                .unwrap_or("cm");
            match (top, bottom) {
                (Some(top), Some(bottom)) => format!("{}-{}{}", top, bottom, unit) == depth,
                _ => false,
            }
        }
        _ => false,
    }
}

fn extract_mean(
    layout: SoilLayout,
    container: &Map<String, Value>,
    property: SoilProperty,
    depth: &str,
) -> std::result::Result<f64, String> {
    let band = layout
        .bands(container, property)?
        .iter()
        .find(|band| depth_matches(band, depth))
        .ok_or_else(|| format!("no {} band for '{}'", depth, property.api_name()))?;

    band.get("values")
        .and_then(|values| values.get("mean"))
        .and_then(Value::as_f64)
        .ok_or_else(|| format!("no valid mean in {} for '{}'", depth, property.api_name()))
}

/// 正規化 SoilGrids 回應
///
/// 只有在沒有回應、或頂層 `properties` 容器缺少/不是物件時才回傳錯誤。
pub fn normalize_soil(
    raw: Option<&Value>,
    depth: &str,
    observer: &dyn DegradationObserver,
) -> Result<SoilReading> {
    let raw = raw.ok_or_else(|| PipelineError::SourceShape {
        source_name: SOURCE,
        message: "no response after retries".to_string(),
    })?;

    let container = match raw.get("properties") {
        Some(Value::Object(container)) => container,
        Some(_) => {
            return Err(PipelineError::SourceShape {
                source_name: SOURCE,
                message: "properties container is not an object".to_string(),
            })
        }
        None => {
            return Err(PipelineError::SourceShape {
                source_name: SOURCE,
                message: "properties container is missing".to_string(),
            })
        }
    };

    let layout = SoilLayout::detect(container)?;
    tracing::debug!(
        "🌱 Soil properties received ({:?}): {:?}",
        layout,
        container.keys().collect::<Vec<_>>()
    );

    let mut reading = SoilReading::default();
    for property in SoilProperty::ALL {
        match extract_mean(layout, container, property, depth) {
            Ok(mean) => reading.set(property, Some(mean)),
            Err(reason) => observer.degraded(Degradation {
                source: SOURCE,
                field: property.api_name().to_string(),
                reason,
            }),
        }
    }

    Ok(reading)
}

pub struct SoilAdapter {
    fetcher: ResilientFetcher,
    config: SoilSourceConfig,
    observer: Arc<dyn DegradationObserver>,
}

impl SoilAdapter {
    pub fn new(
        fetcher: ResilientFetcher,
        config: SoilSourceConfig,
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
            ("lon".to_string(), coordinate.longitude.to_string()),
            ("lat".to_string(), coordinate.latitude.to_string()),
            ("depths".to_string(), self.config.depth.clone()),
            ("properties".to_string(), SoilProperty::query_list()),
        ]
    }
}

#[async_trait]
impl SourceAdapter for SoilAdapter {
    type Output = SoilReading;

    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch(&self, coordinate: &Coordinate) -> Result<SoilReading> {
        let raw = self
            .fetcher
            .fetch(&self.config.endpoint, &self.query(coordinate), &self.config.retry)
            .await;
        normalize_soil(raw.as_ref(), &self.config.depth, self.observer.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::observe::RecordingObserver;
    use serde_json::json;

    fn band(label: &str, mean: Value) -> Value {
        json!({"range": label, "values": {"mean": mean, "Q0.5": 1}})
    }

    #[test]
    fn test_property_depths_layout() {
        let observer = RecordingObserver::new();
        let raw = json!({
            "properties": {
                "phh2o": {"depths": [band("5-15cm", json!(7.0)), band("0-5cm", json!(6.5))]},
                "clay": {"depths": [band("0-5cm", json!(21))]}
            }
        });

        let reading = normalize_soil(Some(&raw), "0-5cm", &observer).unwrap();

        assert_eq!(reading.phh2o, Some(6.5));
        assert_eq!(reading.clay, Some(21.0));
        assert_eq!(reading.soc, None);
        // 其餘 12 個屬性缺少，各自記錄一次
        assert_eq!(observer.events().len(), 12);
    }

    #[test]
    fn test_property_layers_layout() {
        let observer = RecordingObserver::new();
        let raw = json!({
            "properties": {
                "phh2o": {"layers": [{"label": "0-5cm", "values": {"mean": 6.1}}]},
                "nitrogen": {"layers": [{"label": "0-5cm", "values": {"mean": 152}}]}
            }
        });

        let container = raw["properties"].as_object().unwrap();
        assert_eq!(SoilLayout::detect(container).unwrap(), SoilLayout::PerProperty);

        let reading = normalize_soil(Some(&raw), "0-5cm", &observer).unwrap();
        assert_eq!(reading.phh2o, Some(6.1));
        assert_eq!(reading.nitrogen, Some(152.0));
    }

    #[test]
    fn test_mixed_depths_and_layers_per_property() {
        let observer = RecordingObserver::new();
        let raw = json!({
            "properties": {
                "phh2o": {"depths": [{"label": "0-5cm", "values": {"mean": 6.5}}]},
                "clay": {"layers": [{"label": "0-5cm", "values": {"mean": 21}}]},
                "soc": {"depths": [band("0-5cm", json!(88))]}
            }
        });

        let reading = normalize_soil(Some(&raw), "0-5cm", &observer).unwrap();

        assert_eq!(reading.phh2o, Some(6.5));
        assert_eq!(reading.clay, Some(21.0));
        assert_eq!(reading.soc, Some(88.0));
        let fields = observer.fields_for("soil");
        assert_eq!(fields.len(), 11);
        assert!(!fields.contains(&"phh2o".to_string()));
    }

    #[test]
    fn test_named_layers_layout() {
        let observer = RecordingObserver::new();
        let raw = json!({
            "type": "Feature",
            "properties": {
                "layers": [
                    {
                        "name": "phh2o",
                        "unit_measure": {"d_factor": 10},
                        "depths": [{
                            "range": {"top_depth": 0, "bottom_depth": 5, "unit_depth": "cm"},
                            "label": "0-5cm",
                            "values": {"mean": 62}
                        }]
                    },
                    {
                        "name": "ocs",
                        "depths": [{
                            "range": {"top_depth": 0, "bottom_depth": 30, "unit_depth": "cm"},
                            "label": "0-30cm",
                            "values": {"mean": 40}
                        }]
                    },
                    {
                        "name": "sand",
                        "depths": [{
                            "range": {"top_depth": 0, "bottom_depth": 5, "unit_depth": "cm"},
                            "values": {"mean": 410}
                        }]
                    }
                ]
            }
        });

        let reading = normalize_soil(Some(&raw), "0-5cm", &observer).unwrap();

        assert_eq!(reading.phh2o, Some(62.0));
        assert_eq!(reading.sand, Some(410.0));
        assert_eq!(reading.ocs, None);
        assert!(observer.fields_for("soil").contains(&"ocs".to_string()));
    }

    #[test]
    fn test_non_numeric_mean_is_null() {
        let observer = RecordingObserver::new();
        let raw = json!({
            "properties": {
                "phh2o": {"depths": [band("0-5cm", json!(null))]},
                "soc": {"depths": [band("0-5cm", json!("12"))]},
                "cec": {"depths": "n/a"}
            }
        });

        let reading = normalize_soil(Some(&raw), "0-5cm", &observer).unwrap();

        assert_eq!(reading, SoilReading::default());
        let fields = observer.fields_for("soil");
        assert!(fields.contains(&"phh2o".to_string()));
        assert!(fields.contains(&"soc".to_string()));
        assert!(fields.contains(&"cec".to_string()));
    }

    #[test]
    fn test_unrecognizable_container_is_fatal() {
        let observer = RecordingObserver::new();

        let cases = [
            json!({"type": "Feature", "geometry": {}}),
            json!({"properties": "unavailable"}),
            json!({"properties": null}),
            json!({"properties": {"layers": {"phh2o": {}}}}),
        ];
        for raw in cases {
            let err = normalize_soil(Some(&raw), "0-5cm", &observer).unwrap_err();
            assert!(
                matches!(err, PipelineError::SourceShape { source_name: "soil", .. }),
                "{:?}",
                raw
            );
        }

        assert!(normalize_soil(None, "0-5cm", &observer).is_err());
    }

    #[test]
    fn test_depth_matching() {
        assert!(depth_matches(&json!({"label": "0-5cm"}), "0-5cm"));
        assert!(depth_matches(&json!({"range": "0-5cm"}), "0-5cm"));
        assert!(depth_matches(
            &json!({"range": {"top_depth": 0, "bottom_depth": 5}}),
            "0-5cm"
        ));
        assert!(!depth_matches(
            &json!({"range": {"top_depth": 5, "bottom_depth": 15, "unit_depth": "cm"}}),
            "0-5cm"
        ));
        assert!(!depth_matches(&json!({}), "0-5cm"));
    }
}
