pub mod context;
pub mod gateway;
pub mod groq;
pub mod observability;
pub mod prompts;
pub mod reply;

pub use context::{HISTORY_WINDOW, assemble_messages};
pub use gateway::{
    ClientConfigError, Completion, ModelClient, ModelClientError, ModelClientFactory,
    ModelClientFuture, TokenUsage,
};
pub use groq::{GroqClient, GroqClientConfig, GroqClientFactory};
pub use observability::{
    CompletionTelemetryEvent, complete_with_telemetry, log_completion_telemetry,
};
pub use prompts::{CANONICAL_DOMAIN, CANONICAL_URL, COMPANY_NAME, system_prompt};
pub use reply::{is_company_topic, post_process_reply};
