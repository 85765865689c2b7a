use crate::config::PredictorConfig;
use crate::domain::model::{PredictionInput, PredictionResult};
use crate::domain::ports::PredictorBackend;
use crate::utils::error::{PipelineError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// 預測器閘道：送出四個有序數值，解析單一 JSON 回應
#[derive(Clone)]
pub struct PredictorGateway {
    backend: Arc<dyn PredictorBackend>,
}

impl PredictorGateway {
    pub fn new(backend: Arc<dyn PredictorBackend>) -> Self {
        Self { backend }
    }

    pub fn from_config(config: &PredictorConfig, client: Client) -> Self {
        let backend: Arc<dyn PredictorBackend> = match config {
            PredictorConfig::Http {
                endpoint,
                timeout_ms,
            } => Arc::new(HttpPredictor::new(
                client,
                endpoint.clone(),
                Duration::from_millis(*timeout_ms),
            )),
            PredictorConfig::Command {
                program,
                args,
                working_dir,
                timeout_ms,
            } => Arc::new(CommandPredictor {
                program: program.clone(),
                args: args.clone(),
                working_dir: working_dir.clone(),
                timeout: Duration::from_millis(*timeout_ms),
            }),
        };
        Self::new(backend)
    }

    pub async fn predict(&self, input: PredictionInput) -> Result<PredictionResult> {
        tracing::debug!("🔮 Invoking predictor with {:?}", input);
        let blob = self.backend.invoke(input.ordered_args()).await?;
        let result = parse_prediction(&blob)?;
        tracing::info!("🔮 Prediction received ({} fields)", result.0.len());
        Ok(result)
    }
}

/// 預測器輸出必須是 JSON 物件，且不得帶有 `error` 欄位
pub fn parse_prediction(blob: &str) -> Result<PredictionResult> {
    let trimmed = blob.trim();
    let value: serde_json::Value =
        serde_json::from_str(trimmed).map_err(|e| PipelineError::PredictionParse {
            message: format!("output is not valid JSON: {}", e),
            raw: trimmed.to_string(),
        })?;

    let serde_json::Value::Object(map) = value else {
        return Err(PipelineError::PredictionParse {
            message: "output is not a JSON object".to_string(),
            raw: trimmed.to_string(),
        });
    };

    if let Some(error) = map.get("error").filter(|e| !e.is_null()) {
        let message = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        tracing::warn!("⚠️ Prediction returned error: {}", message);
        return Err(PipelineError::PredictionParse {
            message: format!("predictor reported error: {}", message),
            raw: trimmed.to_string(),
        });
    }

    Ok(PredictionResult(map))
}

/// 呼叫本機預測服務：POST `{"args": [temperature, humidity, ph, rainfall]}`
pub struct HttpPredictor {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpPredictor {
    pub fn new(client: Client, endpoint: String, timeout: Duration) -> Self {
        Self {
            client,
            endpoint,
            timeout,
        }
    }
}

#[async_trait]
impl PredictorBackend for HttpPredictor {
    async fn invoke(&self, args: [f64; 4]) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&serde_json::json!({ "args": args }))
            .send()
            .await
            .map_err(|e| PipelineError::PredictionProcess {
                message: format!("request to {} failed: {}", self.endpoint, e),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::PredictionProcess {
                message: format!("failed to read predictor response: {}", e),
            })?;

        if !status.is_success() {
            return Err(PipelineError::PredictionProcess {
                message: format!("predictor responded with {}: {}", status, body.trim()),
            });
        }

        Ok(body)
    }
}

/// 以子程序執行預測器，四個值依序附加在參數最後
pub struct CommandPredictor {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<String>,
    pub timeout: Duration,
}

#[async_trait]
impl PredictorBackend for CommandPredictor {
    async fn invoke(&self, args: [f64; 4]) -> Result<String> {
        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(&self.args)
            .args(args.iter().map(|v| v.to_string()))
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| PipelineError::PredictionProcess {
                message: format!("{} timed out after {:?}", self.program, self.timeout),
            })?
            .map_err(|e| PipelineError::PredictionProcess {
                message: format!("failed to run {}: {}", self.program, e),
            })?;

        if !output.status.success() {
            return Err(PipelineError::PredictionProcess {
                message: format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        // 逐行輸出合併為單一 JSON
        Ok(String::from_utf8_lossy(&output.stdout).lines().collect())
    }
}
