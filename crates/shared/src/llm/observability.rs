use std::time::{Duration, Instant};

use tracing::{info, warn};
use uuid::Uuid;

use super::{Completion, ModelClient, ModelClientError};
use crate::models::ChatMessage;

#[derive(Debug, Clone)]
pub struct CompletionTelemetryEvent {
    pub outcome: &'static str,
    pub latency_ms: u64,
    pub model: String,
    pub message_count: usize,
    pub request_id: Option<String>,
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
    pub error_type: Option<&'static str>,
}

pub async fn complete_with_telemetry(
    client: &dyn ModelClient,
    messages: Vec<ChatMessage>,
) -> (Result<Completion, ModelClientError>, CompletionTelemetryEvent) {
    let message_count = messages.len();
    let started_at = Instant::now();
    let result = client.complete(messages).await;
    let telemetry = telemetry_for_result(
        client.model(),
        message_count,
        started_at.elapsed(),
        &result,
    );
    (result, telemetry)
}

pub fn log_completion_telemetry(session_id: Uuid, event: &CompletionTelemetryEvent) {
    match event.error_type {
        None => info!(
            session_id = %session_id,
            outcome = event.outcome,
            latency_ms = event.latency_ms,
            model = %event.model,
            message_count = event.message_count,
            request_id = event.request_id.as_deref().unwrap_or("none"),
            prompt_tokens = event.prompt_tokens,
            completion_tokens = event.completion_tokens,
            total_tokens = event.total_tokens,
            "llm completion finished"
        ),
        Some(error_type) => warn!(
            session_id = %session_id,
            outcome = event.outcome,
            latency_ms = event.latency_ms,
            model = %event.model,
            message_count = event.message_count,
            error_type,
            "llm completion failed"
        ),
    }
}

fn telemetry_for_result(
    configured_model: &str,
    message_count: usize,
    latency: Duration,
    result: &Result<Completion, ModelClientError>,
) -> CompletionTelemetryEvent {
    let latency_ms = duration_to_millis(latency);
    match result {
        Ok(completion) => {
            let usage = completion.usage.as_ref();
            CompletionTelemetryEvent {
                outcome: "success",
                latency_ms,
                model: completion.model.clone(),
                message_count,
                request_id: completion.request_id.clone(),
                prompt_tokens: usage.map(|usage| usage.prompt_tokens),
                completion_tokens: usage.map(|usage| usage.completion_tokens),
                total_tokens: usage.map(|usage| usage.total_tokens),
                error_type: None,
            }
        }
        Err(err) => CompletionTelemetryEvent {
            outcome: "failure",
            latency_ms,
            model: configured_model.to_string(),
            message_count,
            request_id: None,
            prompt_tokens: None,
            completion_tokens: None,
            total_tokens: None,
            error_type: Some(error_type(err)),
        },
    }
}

fn duration_to_millis(duration: Duration) -> u64 {
    let millis = duration.as_millis();
    u64::try_from(millis).unwrap_or(u64::MAX)
}

fn error_type(error: &ModelClientError) -> &'static str {
    match error {
        ModelClientError::Timeout => "timeout",
        ModelClientError::ProviderFailure(_) => "provider_failure",
        ModelClientError::InvalidProviderPayload(_) => "invalid_provider_payload",
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::telemetry_for_result;
    use crate::llm::{Completion, ModelClientError, TokenUsage};

    #[test]
    fn success_telemetry_carries_usage() {
        let completion = Completion {
            content: "hi".to_string(),
            model: "llama3-8b-8192".to_string(),
            request_id: Some("req-1".to_string()),
            usage: Some(TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 2,
                total_tokens: 12,
            }),
        };

        let event = telemetry_for_result(
            "configured",
            3,
            Duration::from_millis(42),
            &Ok(completion),
        );

        assert_eq!(event.outcome, "success");
        assert_eq!(event.latency_ms, 42);
        assert_eq!(event.model, "llama3-8b-8192");
        assert_eq!(event.total_tokens, Some(12));
        assert!(event.error_type.is_none());
    }

    #[test]
    fn failure_telemetry_uses_configured_model_and_error_type() {
        let event = telemetry_for_result(
            "configured",
            3,
            Duration::from_millis(5),
            &Err(ModelClientError::Timeout),
        );

        assert_eq!(event.outcome, "failure");
        assert_eq!(event.model, "configured");
        assert_eq!(event.error_type, Some("timeout"));
        assert!(event.prompt_tokens.is_none());
    }
}
