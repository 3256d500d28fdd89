use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Level, warn};

/// One ERROR-level (by default) event captured for operators.
#[derive(Clone, Debug)]
pub(crate) struct OperatorAlert {
    pub(crate) level: Level,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
    pub(crate) target: String,
    pub(crate) message: Option<String>,
    pub(crate) fields: BTreeMap<String, String>,
    pub(crate) span_path: Vec<String>,
}

impl OperatorAlert {
    /// Events tagged with `alert = "..."` name their own headline.
    pub(crate) fn kind(&self) -> Option<&str> {
        self.fields.get("alert").map(String::as_str)
    }
}

#[async_trait]
pub(crate) trait AlertSink: Send + Sync {
    async fn deliver(&self, alert: &OperatorAlert) -> Result<()>;
    fn sink_name(&self) -> &'static str;
}

/// Hands alerts to a background task so logging never waits on the network.
#[derive(Clone)]
pub(crate) struct AlertDispatcher {
    tx: mpsc::Sender<OperatorAlert>,
}

impl AlertDispatcher {
    pub(crate) fn spawn(sinks: Vec<Arc<dyn AlertSink>>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<OperatorAlert>(capacity);

        tokio::spawn(async move {
            while let Some(alert) = rx.recv().await {
                for sink in &sinks {
                    if let Err(error) = sink.deliver(&alert).await {
                        warn!(
                            sink = sink.sink_name(),
                            error = %error,
                            "observability: alert delivery failed"
                        );
                    }
                }
            }
        });

        Self { tx }
    }

    pub(crate) fn dispatch(&self, alert: OperatorAlert) {
        match self.tx.try_send(alert) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("observability: alert queue full; dropping alert");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("observability: alert queue closed; dropping alert");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn deliver(&self, alert: &OperatorAlert) -> Result<()> {
            self.seen
                .lock()
                .await
                .push(alert.message.clone().unwrap_or_default());
            Ok(())
        }

        fn sink_name(&self) -> &'static str {
            "recording"
        }
    }

    #[tokio::test]
    async fn dispatched_alerts_reach_sinks() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = AlertDispatcher::spawn(vec![sink.clone()], 4);

        dispatcher.dispatch(OperatorAlert {
            level: Level::ERROR,
            timestamp: Utc::now(),
            service_name: "backend".into(),
            environment: "test".into(),
            component: "backend".into(),
            target: "checkout".into(),
            message: Some("partial assignment".into()),
            fields: BTreeMap::new(),
            span_path: vec![],
        });

        for _ in 0..50 {
            if !sink.seen.lock().await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(*sink.seen.lock().await, vec!["partial assignment".to_string()]);
    }
}
