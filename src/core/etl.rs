use crate::core::{Coordinate, EnvironmentalRecord, Pipeline, PipelineResponse};
use crate::utils::error::{PipelineError, Result};
use std::future::Future;
use std::time::{Duration, Instant};

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    deadline: Option<Duration>,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self {
            pipeline,
            deadline: None,
        }
    }

    /// 超過期限時放棄整個請求；尚未完成的來源查詢與預測器呼叫會一併取消
    pub fn with_deadline(pipeline: P, deadline: Duration) -> Self {
        Self {
            pipeline,
            deadline: Some(deadline),
        }
    }

    pub async fn run(&self, coordinate: Coordinate) -> Result<PipelineResponse> {
        self.within_deadline(self.run_stages(coordinate)).await
    }

    /// 只執行 extract（dry run），同樣受期限限制
    pub async fn extract(&self, coordinate: Coordinate) -> Result<EnvironmentalRecord> {
        tracing::info!("📥 Fetching environmental data...");
        self.within_deadline(self.pipeline.extract(coordinate)).await
    }

    async fn within_deadline<T>(&self, work: impl Future<Output = Result<T>>) -> Result<T> {
        match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, work).await.map_err(|_| {
                tracing::error!("⏱️ Request exceeded deadline of {:?}", deadline);
                PipelineError::Timeout {
                    timeout_ms: deadline.as_millis() as u64,
                }
            })?,
            None => work.await,
        }
    }

    async fn run_stages(&self, coordinate: Coordinate) -> Result<PipelineResponse> {
        let started = Instant::now();

        // Extract
        tracing::info!("📥 Fetching environmental data...");
        let record = self.pipeline.extract(coordinate).await?;

        // Transform
        tracing::info!("🔄 Checking prediction inputs...");
        let input = self.pipeline.transform(&record)?;

        // Load
        tracing::info!("🔮 Predicting nutrient levels...");
        let prediction = self.pipeline.load(input).await?;

        tracing::info!("✅ Request completed in {:?}", started.elapsed());
        Ok(PipelineResponse {
            fetched_data: record,
            prediction,
        })
    }
}
