use super::notifier::{AlertSink, OperatorAlert};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde_json::json;
use url::Url;

/// Chat-style incoming webhook (`{"content": "..."}`), e.g. Discord or Slack-compatible relays.
pub(crate) struct WebhookAlertSink {
    webhook_url: Url,
    client: Client,
}

impl WebhookAlertSink {
    pub(crate) fn new(webhook_url: Url) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(3))
            .build()?;

        Ok(Self {
            webhook_url,
            client,
        })
    }
}

pub(crate) fn render_alert(alert: &OperatorAlert) -> String {
    let mut lines = Vec::new();

    let headline = match alert.kind() {
        Some(kind) => format!("[{}] {}", alert.level, kind.trim_matches('"')),
        None => format!("[{}]", alert.level),
    };
    lines.push(format!(
        "**{}** {} `{}` `{}`",
        alert.service_name, headline, alert.environment, alert.component
    ));
    lines.push(format!(
        "`{}` `{}`",
        alert.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        alert.target
    ));

    if let Some(message) = alert.message.as_deref().filter(|m| !m.trim().is_empty()) {
        lines.push(format!("> {}", message.trim()));
    }

    if !alert.span_path.is_empty() {
        lines.push(format!("spans: `{}`", alert.span_path.join(" > ")));
    }

    for (key, value) in alert.fields.iter().filter(|(key, _)| key.as_str() != "alert") {
        lines.push(format!("- `{key}` = `{value}`"));
    }

    truncate(lines.join("\n"), 2000)
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn deliver(&self, alert: &OperatorAlert) -> Result<()> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&json!({ "content": render_alert(alert) }))
            .send()
            .await
            .map_err(sanitize_reqwest_error)?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(anyhow!(
            "alert webhook returned non-success status: {}",
            response.status()
        ))
    }

    fn sink_name(&self) -> &'static str {
        "webhook"
    }
}

/// reqwest errors echo the URL, which carries the webhook secret.
fn sanitize_reqwest_error(error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        anyhow!("alert webhook request timed out")
    } else if error.is_connect() {
        anyhow!("alert webhook connection failed")
    } else {
        anyhow!("alert webhook request failed")
    }
}

fn truncate(content: String, limit: usize) -> String {
    const SUFFIX: &str = "\n… (truncated)";

    if content.chars().count() <= limit {
        return content;
    }

    let allowed = limit.saturating_sub(SUFFIX.chars().count());
    let mut truncated: String = content.chars().take(allowed).collect();
    truncated.push_str(SUFFIX);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use tracing::Level;

    fn alert(fields: &[(&str, &str)]) -> OperatorAlert {
        OperatorAlert {
            level: Level::ERROR,
            timestamp: Utc::now(),
            service_name: "backend".into(),
            environment: "prod".into(),
            component: "backend".into(),
            target: "backend::usecases::checkout".into(),
            message: Some("checkout: subscription assignment failed after order assignment".into()),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            span_path: vec![],
        }
    }

    #[test]
    fn tagged_alerts_use_kind_as_headline() {
        let rendered = render_alert(&alert(&[
            ("alert", "partial_assignment"),
            ("intent_id", "abc"),
        ]));

        assert!(rendered.contains("[ERROR] partial_assignment"));
        assert!(rendered.contains("- `intent_id` = `abc`"));
        assert!(!rendered.contains("- `alert`"));
    }

    #[test]
    fn long_alerts_are_truncated() {
        let long = "x".repeat(5000);
        let rendered = render_alert(&alert(&[("reason", long.as_str())]));
        assert_eq!(rendered.chars().count(), 2000);
        assert!(rendered.ends_with("(truncated)"));
    }
}
