use crate::domain::ports::{Degradation, DegradationObserver};
use std::sync::Mutex;

/// 預設觀察者：以結構化 warn 記錄降級欄位
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl DegradationObserver for TracingObserver {
    fn degraded(&self, event: Degradation) {
        tracing::warn!(
            source = event.source,
            field = %event.field,
            reason = %event.reason,
            "⚠️ {} field '{}' resolved to null: {}",
            event.source,
            event.field,
            event.reason
        );
    }
}

/// 收集降級事件，並同時轉交給 tracing
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Degradation>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Degradation> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn fields_for(&self, source: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.source == source)
            .map(|e| e.field)
            .collect()
    }
}

impl DegradationObserver for RecordingObserver {
    fn degraded(&self, event: Degradation) {
        TracingObserver.degraded(event.clone());
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
