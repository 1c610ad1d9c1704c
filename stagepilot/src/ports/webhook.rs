//! HTTP job trigger.

use super::JobTrigger;
use crate::config::WebhookConfig;
use crate::errors::ExternalIoError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

/// Triggers jobs by POSTing `{ "job", "subject_id" }` to `{base_url}/{job_name}`.
#[derive(Debug, Clone)]
pub struct WebhookJobTrigger {
    base_url: String,
    client: reqwest::Client,
}

impl WebhookJobTrigger {
    /// Creates a trigger for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ExternalIoError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExternalIoError::trigger(format!("failed to build HTTP client: {e}")))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!(base_url = %base_url, "Webhook job trigger created");
        Ok(Self { base_url, client })
    }

    /// Creates a trigger from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL is configured or the client cannot be built.
    pub fn from_config(config: &WebhookConfig) -> Result<Self, ExternalIoError> {
        let base_url = config
            .base_url
            .as_deref()
            .ok_or_else(|| ExternalIoError::trigger("webhook base_url is not configured"))?;
        Self::new(base_url, config.timeout())
    }

    /// The URL a job is posted to.
    #[must_use]
    pub fn endpoint(&self, job_name: &str) -> String {
        format!("{}/{}", self.base_url, job_name)
    }
}

#[async_trait]
impl JobTrigger for WebhookJobTrigger {
    async fn trigger(&self, job_name: &str, subject_id: &str) -> Result<(), ExternalIoError> {
        let url = self.endpoint(job_name);
        debug!(url = %url, subject_id, "Triggering job");
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "job": job_name, "subject_id": subject_id }))
            .send()
            .await
            .map_err(|e| ExternalIoError::trigger(format!("{job_name}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExternalIoError::trigger(format!(
                "{job_name}: webhook returned {status}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_and_job() {
        let trigger =
            WebhookJobTrigger::new("https://jobs.internal/hooks/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            trigger.endpoint("generate_contract"),
            "https://jobs.internal/hooks/generate_contract"
        );
    }

    #[test]
    fn test_from_config_requires_base_url() {
        let err = WebhookJobTrigger::from_config(&WebhookConfig::default()).unwrap_err();
        assert!(err.message.contains("base_url"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_external_error() {
        let trigger = WebhookJobTrigger::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        let err = trigger.trigger("notify", "lead-1").await.unwrap_err();
        assert_eq!(err.service, crate::errors::ExternalService::JobTrigger);
    }
}
