use crate::domain::model::{Coordinate, EnvironmentalRecord, PredictionInput, PredictionResult};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// 單次 HTTP GET 的結果（不論狀態碼）
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),
}

/// 對外 HTTP 呼叫的最小介面，方便以測試替身取代
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(
        &self,
        url: &str,
        query: &[(String, String)],
        timeout: Duration,
    ) -> std::result::Result<TransportResponse, TransportError>;
}

/// 一個外部資料來源（高程、氣象、土壤）
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    type Output: Send;

    fn name(&self) -> &'static str;

    async fn fetch(&self, coordinate: &Coordinate) -> Result<Self::Output>;
}

/// 預測器後端：依序接收四個數值，回傳單一原始輸出
#[async_trait]
pub trait PredictorBackend: Send + Sync {
    async fn invoke(&self, args: [f64; 4]) -> Result<String>;
}

/// 欄位被降級為 `null` 時的觀察點
#[derive(Debug, Clone, PartialEq)]
pub struct Degradation {
    pub source: &'static str,
    pub field: String,
    pub reason: String,
}

pub trait DegradationObserver: Send + Sync {
    fn degraded(&self, event: Degradation);
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self, coordinate: Coordinate) -> Result<EnvironmentalRecord>;
    fn transform(&self, record: &EnvironmentalRecord) -> Result<PredictionInput>;
    async fn load(&self, input: PredictionInput) -> Result<PredictionResult>;
}

#[async_trait]
impl<P: Pipeline + ?Sized> Pipeline for std::sync::Arc<P> {
    async fn extract(&self, coordinate: Coordinate) -> Result<EnvironmentalRecord> {
        (**self).extract(coordinate).await
    }

    fn transform(&self, record: &EnvironmentalRecord) -> Result<PredictionInput> {
        (**self).transform(record)
    }

    async fn load(&self, input: PredictionInput) -> Result<PredictionResult> {
        (**self).load(input).await
    }
}
