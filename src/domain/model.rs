use crate::utils::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// 從未經驗證的 JSON 請求建立座標。
    ///
    /// 接受數字或可解析為數字的字串；不做經緯度範圍檢查。
    pub fn from_json(body: &serde_json::Value) -> Result<Self> {
        let latitude = numeric_field(body, "latitude")?;
        let longitude = numeric_field(body, "longitude")?;
        Ok(Self::new(latitude, longitude))
    }
}

fn numeric_field(body: &serde_json::Value, name: &str) -> Result<f64> {
    let value = match body.get(name) {
        None | Some(serde_json::Value::Null) => {
            return Err(PipelineError::InvalidCoordinate {
                message: format!("{} is required", name),
            })
        }
        Some(value) => value,
    };

    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(PipelineError::InvalidCoordinate {
            message: format!("{} must be numeric, got {}", name, value),
        }),
    }
}

/// SoilGrids 查詢的 14 個土壤屬性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SoilProperty {
    Phh2o,
    Soc,
    Bdod,
    Clay,
    Sand,
    Silt,
    Cec,
    Ocd,
    Nitrogen,
    Wv0010,
    Wv0033,
    Wv1500,
    Cfvo,
    Ocs,
}

impl SoilProperty {
    pub const ALL: [SoilProperty; 14] = [
        SoilProperty::Phh2o,
        SoilProperty::Soc,
        SoilProperty::Bdod,
        SoilProperty::Clay,
        SoilProperty::Sand,
        SoilProperty::Silt,
        SoilProperty::Cec,
        SoilProperty::Ocd,
        SoilProperty::Nitrogen,
        SoilProperty::Wv0010,
        SoilProperty::Wv0033,
        SoilProperty::Wv1500,
        SoilProperty::Cfvo,
        SoilProperty::Ocs,
    ];

    /// 上游 API 使用的屬性名稱
    pub fn api_name(self) -> &'static str {
        match self {
            SoilProperty::Phh2o => "phh2o",
            SoilProperty::Soc => "soc",
            SoilProperty::Bdod => "bdod",
            SoilProperty::Clay => "clay",
            SoilProperty::Sand => "sand",
            SoilProperty::Silt => "silt",
            SoilProperty::Cec => "cec",
            SoilProperty::Ocd => "ocd",
            SoilProperty::Nitrogen => "nitrogen",
            SoilProperty::Wv0010 => "wv0010",
            SoilProperty::Wv0033 => "wv0033",
            SoilProperty::Wv1500 => "wv1500",
            SoilProperty::Cfvo => "cfvo",
            SoilProperty::Ocs => "ocs",
        }
    }

    /// 逗號串接的查詢參數值
    pub fn query_list() -> String {
        Self::ALL
            .iter()
            .map(|p| p.api_name())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub rainfall: Option<f64>,
}

/// 0-5cm 深度的土壤數值，缺值為 `None`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SoilReading {
    pub phh2o: Option<f64>,
    pub soc: Option<f64>,
    pub bdod: Option<f64>,
    pub clay: Option<f64>,
    pub sand: Option<f64>,
    pub silt: Option<f64>,
    pub cec: Option<f64>,
    pub ocd: Option<f64>,
    #[serde(rename = "nitrogen_soil")]
    pub nitrogen: Option<f64>,
    pub wv1500: Option<f64>,
    pub cfvo: Option<f64>,
    pub wv0033: Option<f64>,
    pub wv0010: Option<f64>,
    pub ocs: Option<f64>,
}

impl SoilReading {
    pub fn set(&mut self, property: SoilProperty, value: Option<f64>) {
        *self.slot_mut(property) = value;
    }

    fn slot_mut(&mut self, property: SoilProperty) -> &mut Option<f64> {
        match property {
            SoilProperty::Phh2o => &mut self.phh2o,
            SoilProperty::Soc => &mut self.soc,
            SoilProperty::Bdod => &mut self.bdod,
            SoilProperty::Clay => &mut self.clay,
            SoilProperty::Sand => &mut self.sand,
            SoilProperty::Silt => &mut self.silt,
            SoilProperty::Cec => &mut self.cec,
            SoilProperty::Ocd => &mut self.ocd,
            SoilProperty::Nitrogen => &mut self.nitrogen,
            SoilProperty::Wv0010 => &mut self.wv0010,
            SoilProperty::Wv0033 => &mut self.wv0033,
            SoilProperty::Wv1500 => &mut self.wv1500,
            SoilProperty::Cfvo => &mut self.cfvo,
            SoilProperty::Ocs => &mut self.ocs,
        }
    }
}

/// 單一座標的合併結果。所有欄位一律序列化，缺值輸出為 `null`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub rainfall: Option<f64>,
    #[serde(flatten)]
    pub soil: SoilReading,
}

impl EnvironmentalRecord {
    pub fn merge(
        coordinate: Coordinate,
        elevation: Option<f64>,
        weather: WeatherReading,
        soil: SoilReading,
    ) -> Self {
        Self {
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
            elevation,
            temperature: weather.temperature,
            humidity: weather.humidity,
            rainfall: weather.rainfall,
            soil,
        }
    }

    pub fn partial_input(&self) -> PartialPredictionInput {
        PartialPredictionInput {
            temperature: self.temperature,
            humidity: self.humidity,
            ph: self.soil.phh2o,
            rainfall: self.rainfall,
        }
    }
}

/// 預測模型的四個輸入，順序固定：temperature, humidity, ph, rainfall
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionInput {
    pub temperature: f64,
    pub humidity: f64,
    pub ph: f64,
    pub rainfall: f64,
}

impl PredictionInput {
    pub fn ordered_args(&self) -> [f64; 4] {
        [self.temperature, self.humidity, self.ph, self.rainfall]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialPredictionInput {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub ph: Option<f64>,
    pub rainfall: Option<f64>,
}

impl PartialPredictionInput {
    /// 完整性檢查：四個值都存在才回傳 `Some`
    pub fn complete(&self) -> Option<PredictionInput> {
        Some(PredictionInput {
            temperature: self.temperature?,
            humidity: self.humidity?,
            ph: self.ph?,
            rainfall: self.rainfall?,
        })
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("temperature", self.temperature),
            ("humidity", self.humidity),
            ("ph", self.ph),
            ("rainfall", self.rainfall),
        ]
        .into_iter()
        .filter(|(_, v)| v.is_none())
        .map(|(name, _)| name)
        .collect()
    }
}

/// 預測器回傳的 JSON 物件，原樣轉交
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionResult(pub serde_json::Map<String, serde_json::Value>);

impl PredictionResult {
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResponse {
    pub fetched_data: EnvironmentalRecord,
    pub prediction: PredictionResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<PartialPredictionInput>,
}

impl From<&PipelineError> for ErrorResponse {
    fn from(err: &PipelineError) -> Self {
        let input = match err {
            PipelineError::MissingInputs { input, .. } => Some(*input),
            _ => None,
        };
        Self {
            error: err.user_friendly_message(),
            input,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coordinate_from_json_accepts_numbers_and_strings() {
        let c = Coordinate::from_json(&json!({"latitude": 12.97, "longitude": "77.59"})).unwrap();
        assert_eq!(c, Coordinate::new(12.97, 77.59));

        // 0 是合法座標
        let c = Coordinate::from_json(&json!({"latitude": 0, "longitude": 0.0})).unwrap();
        assert_eq!(c, Coordinate::new(0.0, 0.0));
    }

    #[test]
    fn test_coordinate_from_json_rejects_missing_or_non_numeric() {
        assert!(Coordinate::from_json(&json!({"latitude": 1.0})).is_err());
        assert!(Coordinate::from_json(&json!({"latitude": null, "longitude": 2.0})).is_err());
        assert!(Coordinate::from_json(&json!({"latitude": "north", "longitude": 2.0})).is_err());
        assert!(Coordinate::from_json(&json!({"latitude": true, "longitude": 2.0})).is_err());
    }

    #[test]
    fn test_record_serializes_every_field_even_when_null() {
        let record = EnvironmentalRecord::merge(
            Coordinate::new(1.0, 2.0),
            None,
            WeatherReading::default(),
            SoilReading::default(),
        );
        let value = serde_json::to_value(&record).unwrap();
        let obj = value.as_object().unwrap();

        assert_eq!(obj.len(), 20);
        for key in [
            "elevation",
            "temperature",
            "humidity",
            "rainfall",
            "phh2o",
            "nitrogen_soil",
            "ocs",
        ] {
            assert_eq!(obj.get(key), Some(&serde_json::Value::Null), "{}", key);
        }
        assert_eq!(obj.get("latitude"), Some(&json!(1.0)));
    }

    #[test]
    fn test_partial_input_completeness() {
        let mut soil = SoilReading::default();
        soil.set(SoilProperty::Phh2o, Some(6.5));
        let weather = WeatherReading {
            temperature: Some(24.5),
            humidity: Some(70.3),
            rainfall: None,
        };
        let record =
            EnvironmentalRecord::merge(Coordinate::new(0.0, 0.0), Some(10.0), weather, soil);

        let partial = record.partial_input();
        assert!(partial.complete().is_none());
        assert_eq!(partial.missing_fields(), vec!["rainfall"]);

        let full = PartialPredictionInput {
            rainfall: Some(200.0),
            ..partial
        };
        assert_eq!(full.complete().unwrap().ordered_args(), [24.5, 70.3, 6.5, 200.0]);
    }

    #[test]
    fn test_soil_property_names() {
        assert_eq!(SoilProperty::ALL.len(), 14);
        assert_eq!(
            SoilProperty::query_list(),
            "phh2o,soc,bdod,clay,sand,silt,cec,ocd,nitrogen,wv0010,wv0033,wv1500,cfvo,ocs"
        );
    }

    #[test]
    fn test_error_response_includes_input_only_for_missing_inputs() {
        let record = EnvironmentalRecord::merge(
            Coordinate::new(0.0, 0.0),
            None,
            WeatherReading::default(),
            SoilReading::default(),
        );
        let err = PipelineError::MissingInputs {
            input: record.partial_input(),
            record: Box::new(record),
        };
        let body = serde_json::to_value(ErrorResponse::from(&err)).unwrap();
        assert_eq!(body["error"], "Missing required inputs for prediction.");
        assert!(body["input"].is_object());

        let err = PipelineError::Timeout { timeout_ms: 5 };
        let body = serde_json::to_value(ErrorResponse::from(&err)).unwrap();
        assert!(body.get("input").is_none());
    }
}
