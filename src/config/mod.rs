#[cfg(feature = "cli")]
pub mod cli;

#[cfg(feature = "cli")]
pub use cli::CliArgs;

use crate::adapters::http::RetryPolicy;
use crate::utils::error::{PipelineError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sources: SourcesConfig,
    pub predictor: PredictorConfig,
    pub server: ServerConfig,
    /// 整個請求的期限；未設定時由各來源的重試預算推算
    pub request_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub elevation: ElevationSourceConfig,
    pub weather: WeatherSourceConfig,
    pub soil: SoilSourceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElevationSourceConfig {
    pub endpoint: String,
    pub retry: RetryPolicy,
}

impl Default for ElevationSourceConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.open-elevation.com/api/v1/lookup".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherSourceConfig {
    pub endpoint: String,
    pub community: String,
    /// 查詢日期 (YYYYMMDD)，同時作為回應中的時間序列鍵
    pub date: String,
    pub parameters: WeatherParameters,
    /// 上游用來表示缺值的填充值；空陣列表示停用
    pub fill_values: Vec<f64>,
    pub retry: RetryPolicy,
}

impl Default for WeatherSourceConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://power.larc.nasa.gov/api/temporal/daily/point".to_string(),
            community: "RE".to_string(),
            date: "20240101".to_string(),
            parameters: WeatherParameters::default(),
            fill_values: vec![-999.0],
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherParameters {
    pub temperature: String,
    pub humidity: String,
    pub rainfall: String,
}

impl Default for WeatherParameters {
    fn default() -> Self {
        Self {
            temperature: "T2M".to_string(),
            humidity: "RH2M".to_string(),
            rainfall: "PRECTOTCORR".to_string(),
        }
    }
}

impl WeatherParameters {
    pub fn query_list(&self) -> String {
        [&self.temperature, &self.humidity, &self.rainfall]
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SoilSourceConfig {
    pub endpoint: String,
    pub depth: String,
    pub retry: RetryPolicy,
}

impl Default for SoilSourceConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://rest.isric.org/soilgrids/v2.0/properties/query".to_string(),
            depth: "0-5cm".to_string(),
            // SoilGrids 回應較慢
            retry: RetryPolicy {
                timeout_ms: 30_000,
                ..RetryPolicy::default()
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PredictorConfig {
    Http {
        endpoint: String,
        #[serde(default = "default_predictor_timeout_ms")]
        timeout_ms: u64,
    },
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        working_dir: Option<String>,
        #[serde(default = "default_predictor_timeout_ms")]
        timeout_ms: u64,
    },
}

fn default_predictor_timeout_ms() -> u64 {
    30_000
}

impl Default for PredictorConfig {
    fn default() -> Self {
        PredictorConfig::Http {
            endpoint: "http://127.0.0.1:8000/predict".to_string(),
            timeout_ms: default_predictor_timeout_ms(),
        }
    }
}

impl PredictorConfig {
    pub fn timeout_ms(&self) -> u64 {
        match self {
            PredictorConfig::Http { timeout_ms, .. }
            | PredictorConfig::Command { timeout_ms, .. } => *timeout_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
        }
    }
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(PipelineError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| PipelineError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${PREDICTOR_URL})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| PipelineError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 整個請求的期限
    ///
    /// 未明確設定時取最慢來源的最壞情況（每次嘗試都逾時並退避）再加上預測器逾時。
    pub fn request_deadline(&self) -> Duration {
        if let Some(ms) = self.request_timeout_ms {
            return Duration::from_millis(ms);
        }

        let slowest_source = [
            &self.sources.elevation.retry,
            &self.sources.weather.retry,
            &self.sources.soil.retry,
        ]
        .iter()
        .map(|policy| policy.worst_case())
        .max()
        .unwrap_or_default();

        slowest_source + Duration::from_millis(self.predictor.timeout_ms())
    }

    pub fn validate_config(&self) -> Result<()> {
        let sources = &self.sources;
        validation::validate_url("sources.elevation.endpoint", &sources.elevation.endpoint)?;
        validation::validate_url("sources.weather.endpoint", &sources.weather.endpoint)?;
        validation::validate_url("sources.soil.endpoint", &sources.soil.endpoint)?;

        for (field, policy) in [
            ("sources.elevation.retry", &sources.elevation.retry),
            ("sources.weather.retry", &sources.weather.retry),
            ("sources.soil.retry", &sources.soil.retry),
        ] {
            validation::validate_positive_number(
                &format!("{}.max_attempts", field),
                policy.max_attempts as usize,
                1,
            )?;
            validation::validate_positive_number(
                &format!("{}.timeout_ms", field),
                policy.timeout_ms as usize,
                1,
            )?;
        }

        validation::validate_date("sources.weather.date", &sources.weather.date)?;
        validation::validate_non_empty_string(
            "sources.weather.community",
            &sources.weather.community,
        )?;
        validation::validate_non_empty_string("sources.soil.depth", &sources.soil.depth)?;

        match &self.predictor {
            PredictorConfig::Http { endpoint, .. } => {
                validation::validate_url("predictor.endpoint", endpoint)?;
            }
            PredictorConfig::Command { program, .. } => {
                validation::validate_non_empty_string("predictor.program", program)?;
            }
        }

        validation::validate_socket_addr("server.bind", &self.server.bind)?;

        Ok(())
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();

        assert_eq!(
            config.sources.elevation.endpoint,
            "https://api.open-elevation.com/api/v1/lookup"
        );
        assert_eq!(config.sources.elevation.retry.max_attempts, 3);
        assert_eq!(config.sources.elevation.retry.base_backoff_ms, 2000);
        assert_eq!(config.sources.weather.retry.timeout_ms, 10_000);
        assert_eq!(config.sources.soil.retry.timeout_ms, 30_000);
        assert_eq!(config.sources.weather.date, "20240101");
        assert_eq!(config.sources.soil.depth, "0-5cm");
        assert!(matches!(config.predictor, PredictorConfig::Http { .. }));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_command_predictor() {
        let toml_content = r#"
[predictor]
kind = "command"
program = "python3"
args = ["predict.py"]
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();
        match config.predictor {
            PredictorConfig::Command {
                program,
                args,
                timeout_ms,
                ..
            } => {
                assert_eq!(program, "python3");
                assert_eq!(args, vec!["predict.py".to_string()]);
                assert_eq!(timeout_ms, 30_000);
            }
            other => panic!("unexpected predictor config: {:?}", other),
        }
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TEST_SOIL_ENDPOINT", "https://soil.test.example/query");

        let toml_content = r#"
[sources.soil]
endpoint = "${TEST_SOIL_ENDPOINT}"
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.sources.soil.endpoint, "https://soil.test.example/query");
        // 未指定的欄位維持預設值
        assert_eq!(config.sources.soil.retry.timeout_ms, 30_000);

        std::env::remove_var("TEST_SOIL_ENDPOINT");
    }

    #[test]
    fn test_config_validation() {
        let toml_content = r#"
[sources.elevation]
endpoint = "invalid-url"
"#;
        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());

        let toml_content = r#"
[sources.weather]
date = "2024-13-01"
"#;
        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());

        let toml_content = r#"
[sources.weather.retry]
max_attempts = 0
"#;
        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_request_deadline() {
        let config = AppConfig::from_toml_str("request_timeout_ms = 1500").unwrap();
        assert_eq!(config.request_deadline(), Duration::from_millis(1500));

        let config = AppConfig::default();
        // soil: 3 × 30s 逾時 + 2s + 4s 退避，再加預測器 30s
        assert_eq!(config.request_deadline(), Duration::from_millis(90_000 + 6_000 + 30_000));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[sources.weather]
date = "20230615"
fill_values = [-999.0, -99.0]

[server]
bind = "127.0.0.1:8080"
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = AppConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.sources.weather.date, "20230615");
        assert_eq!(config.sources.weather.fill_values, vec![-999.0, -99.0]);
        assert_eq!(config.server.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_missing_config_file_is_io_error() {
        let err = AppConfig::from_file("/nonexistent/geo-nutrient-etl.toml").unwrap_err();

        assert!(matches!(err, PipelineError::IoError(_)));
        assert_eq!(err.severity(), crate::utils::error::ErrorSeverity::Critical);
    }

    #[test]
    fn test_sample_config_is_valid() {
        let config = AppConfig::from_toml_str(include_str!("../../geo-nutrient-etl.toml")).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.sources.soil.retry.timeout_ms, 30_000);
        assert_eq!(config.request_deadline(), AppConfig::default().request_deadline());
    }
}
