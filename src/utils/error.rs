use crate::domain::model::{EnvironmentalRecord, PartialPredictionInput};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Invalid coordinate: {message}")]
    InvalidCoordinate { message: String },

    #[error("{source_name} source returned invalid data: {message}")]
    SourceShape {
        source_name: &'static str,
        message: String,
    },

    #[error("Missing required inputs for prediction")]
    MissingInputs {
        input: PartialPredictionInput,
        record: Box<EnvironmentalRecord>,
    },

    #[error("Prediction process failed: {message}")]
    PredictionProcess { message: String },

    #[error("Failed to parse prediction result: {message}")]
    PredictionParse { message: String, raw: String },

    #[error("Request exceeded its deadline of {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Source,
    Prediction,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl PipelineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PipelineError::ConfigError { .. }
            | PipelineError::ConfigValidationError { .. }
            | PipelineError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            PipelineError::InvalidCoordinate { .. } | PipelineError::MissingInputs { .. } => {
                ErrorCategory::Input
            }
            PipelineError::SourceShape { .. } | PipelineError::Timeout { .. } => {
                ErrorCategory::Source
            }
            PipelineError::PredictionProcess { .. } | PipelineError::PredictionParse { .. } => {
                ErrorCategory::Prediction
            }
            PipelineError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 資料不足，但來源本身正常
            PipelineError::MissingInputs { .. } => ErrorSeverity::Low,
            PipelineError::SourceShape { .. } | PipelineError::Timeout { .. } => {
                ErrorSeverity::Medium
            }
            PipelineError::InvalidCoordinate { .. }
            | PipelineError::PredictionProcess { .. }
            | PipelineError::PredictionParse { .. }
            | PipelineError::ConfigError { .. }
            | PipelineError::ConfigValidationError { .. }
            | PipelineError::InvalidConfigValueError { .. } => ErrorSeverity::High,
            PipelineError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    /// 對應到 HTTP 回應狀態碼
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::InvalidCoordinate { .. } | PipelineError::MissingInputs { .. } => 400,
            PipelineError::Timeout { .. } => 504,
            _ => 500,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the TOML configuration file and environment variables"
            }
            ErrorCategory::Input => {
                "Choose another location; the data sources have no usable values here"
            }
            ErrorCategory::Source => {
                "The upstream geodata service may be down or rate limiting; retry later"
            }
            ErrorCategory::Prediction => {
                "Check that the predictor service is running and returns JSON"
            }
            ErrorCategory::System => "Check disk permissions and available resources",
        }
    }

    /// 給使用者看的訊息（不含內部細節）
    pub fn user_friendly_message(&self) -> String {
        match self {
            PipelineError::InvalidCoordinate { .. } => {
                "Latitude and longitude are required.".to_string()
            }
            PipelineError::MissingInputs { .. } => {
                "Missing required inputs for prediction.".to_string()
            }
            PipelineError::Timeout { .. } => {
                "Timed out fetching data or predicting values.".to_string()
            }
            PipelineError::PredictionProcess { .. } | PipelineError::PredictionParse { .. } => {
                "Error predicting nutrient values.".to_string()
            }
            PipelineError::ConfigError { .. }
            | PipelineError::ConfigValidationError { .. }
            | PipelineError::InvalidConfigValueError { .. } => {
                format!("Invalid configuration: {}", self)
            }
            _ => "Error fetching data or predicting values.".to_string(),
        }
    }
}
