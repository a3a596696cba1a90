//! Per-browser conversation state.
//!
//! A [`Session`] owns its log, the cached reference document and the cached
//! model client. A turn is split into [`Session::begin_turn`], a detached
//! [`PendingTurn::run`] and [`Session::finish_turn`], so callers sharing a
//! session behind a lock never hold it across the remote call.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::credentials::{CredentialResolver, UNCONFIGURED_SOURCE_LABEL};
use crate::llm::{
    Completion, ModelClient, ModelClientError, ModelClientFactory, assemble_messages,
    complete_with_telemetry, log_completion_telemetry, post_process_reply,
};
use crate::models::{ChatMessage, Message, SessionSnapshot};
use crate::reference::{ReferenceDocument, ReferenceLoader, ReferenceOrigin};

pub const UNCONFIGURED_REPLY: &str = "I'm sorry, but I can't process your request because the API key hasn't been configured. Please set the GROQ_API_KEY environment variable.";
pub const FAILURE_REPLY: &str =
    "I'm sorry, I encountered an error. Please try again or contact UniSole support.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    AwaitingModel,
    Ready,
}

/// Diagnostic view of the model client handle. Never carries the secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClientStatus {
    NotAttempted,
    Configured { source: String },
    Unconfigured { source: String, reason: String },
    /// The handle was dropped after a failed call; the next turn reconnects.
    Disconnected { source: String, reason: String },
}

impl ClientStatus {
    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Configured { .. })
    }
}

/// Collaborators every session is built from.
#[derive(Clone)]
pub struct SessionServices {
    pub credentials: CredentialResolver,
    pub reference: ReferenceLoader,
    pub client_factory: Arc<dyn ModelClientFactory>,
}

pub enum TurnStart {
    Started(PendingTurn),
    /// A turn is already in flight; the submission was dropped.
    Busy,
    /// Blank input; nothing was recorded.
    Ignored,
}

pub struct PendingTurn {
    session_id: Uuid,
    epoch: u64,
    input: String,
    messages: Vec<ChatMessage>,
    client: Option<Arc<dyn ModelClient>>,
}

impl PendingTurn {
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub async fn run(self) -> CompletedTurn {
        let outcome = match &self.client {
            None => TurnOutcome::Unconfigured,
            Some(client) => {
                let (result, telemetry) =
                    complete_with_telemetry(client.as_ref(), self.messages).await;
                log_completion_telemetry(self.session_id, &telemetry);
                match result {
                    Ok(completion) => TurnOutcome::Reply(completion),
                    Err(err) => TurnOutcome::Failed(err),
                }
            }
        };

        CompletedTurn {
            epoch: self.epoch,
            input: self.input,
            outcome,
        }
    }
}

pub struct CompletedTurn {
    epoch: u64,
    input: String,
    outcome: TurnOutcome,
}

enum TurnOutcome {
    Reply(Completion),
    Unconfigured,
    Failed(ModelClientError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnResolution {
    Replied,
    Unconfigured,
    Failed,
    /// The session was reset while the call was in flight.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Resolved(TurnResolution),
    Busy,
    Ignored,
}

pub struct Session {
    id: Uuid,
    services: SessionServices,
    state: SessionState,
    log: Vec<Message>,
    reference: Option<ReferenceDocument>,
    client: Option<Arc<dyn ModelClient>>,
    client_status: ClientStatus,
    epoch: u64,
}

impl Session {
    pub fn new(services: SessionServices) -> Self {
        Self {
            id: Uuid::new_v4(),
            services,
            state: SessionState::Idle,
            log: Vec::new(),
            reference: None,
            client: None,
            client_status: ClientStatus::NotAttempted,
            epoch: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn messages(&self) -> &[Message] {
        &self.log
    }

    pub fn client_status(&self) -> &ClientStatus {
        &self.client_status
    }

    pub fn reference_origin(&self) -> Option<&ReferenceOrigin> {
        self.reference.as_ref().map(ReferenceDocument::origin)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            state: self.state,
            messages: self.log.clone(),
            client: self.client_status.clone(),
            reference: self.reference_origin().cloned(),
        }
    }

    /// Runs one full turn on an exclusively borrowed session.
    pub async fn submit(&mut self, text: &str) -> SubmitOutcome {
        match self.begin_turn(text) {
            TurnStart::Started(pending) => {
                let completed = pending.run().await;
                SubmitOutcome::Resolved(self.finish_turn(completed))
            }
            TurnStart::Busy => SubmitOutcome::Busy,
            TurnStart::Ignored => SubmitOutcome::Ignored,
        }
    }

    pub fn begin_turn(&mut self, text: &str) -> TurnStart {
        if self.state == SessionState::AwaitingModel {
            debug!(session_id = %self.id, "dropping submission while a turn is in flight");
            return TurnStart::Busy;
        }
        if text.trim().is_empty() {
            return TurnStart::Ignored;
        }

        self.log.push(Message::user(text));

        let loader = &self.services.reference;
        let reference = self.reference.get_or_insert_with(|| loader.load());
        let history = &self.log[..self.log.len() - 1];
        let messages = assemble_messages(history, reference.text(), text);

        let client = self.ensure_client();
        self.state = SessionState::AwaitingModel;

        TurnStart::Started(PendingTurn {
            session_id: self.id,
            epoch: self.epoch,
            input: text.to_string(),
            messages,
            client,
        })
    }

    pub fn finish_turn(&mut self, completed: CompletedTurn) -> TurnResolution {
        if completed.epoch != self.epoch || self.state != SessionState::AwaitingModel {
            debug!(session_id = %self.id, "discarding turn that outlived a reset");
            return TurnResolution::Discarded;
        }

        self.state = SessionState::Ready;
        match completed.outcome {
            TurnOutcome::Reply(completion) => {
                let reply = post_process_reply(&completion.content, &completed.input);
                self.log.push(Message::assistant(reply));
                TurnResolution::Replied
            }
            TurnOutcome::Unconfigured => {
                self.log.push(Message::assistant(UNCONFIGURED_REPLY));
                TurnResolution::Unconfigured
            }
            TurnOutcome::Failed(err) => {
                warn!(
                    session_id = %self.id,
                    error = %err,
                    "model call failed; invalidating client handle"
                );
                self.disconnect_client(err.to_string());
                self.log.push(Message::assistant(FAILURE_REPLY));
                TurnResolution::Failed
            }
        }
    }

    /// Clears the log and returns to `Idle`. Any in-flight turn is discarded on arrival.
    pub fn reset(&mut self) {
        self.log.clear();
        self.state = SessionState::Idle;
        self.epoch = self.epoch.wrapping_add(1);
        info!(session_id = %self.id, "conversation reset");
    }

    pub fn reconnect_client(&mut self) -> &ClientStatus {
        self.client = None;
        self.connect_client();
        &self.client_status
    }

    pub fn reload_reference_document(&mut self) -> &ReferenceOrigin {
        let document = self.services.reference.load();
        self.reference.insert(document).origin()
    }

    fn disconnect_client(&mut self, reason: String) {
        self.client = None;
        let source = match &self.client_status {
            ClientStatus::Configured { source }
            | ClientStatus::Unconfigured { source, .. }
            | ClientStatus::Disconnected { source, .. } => source.clone(),
            ClientStatus::NotAttempted => UNCONFIGURED_SOURCE_LABEL.to_string(),
        };
        self.client_status = ClientStatus::Disconnected { source, reason };
    }

    fn ensure_client(&mut self) -> Option<Arc<dyn ModelClient>> {
        if self.client.is_none() {
            self.connect_client();
        }
        self.client.clone()
    }

    fn connect_client(&mut self) {
        let resolution = self.services.credentials.resolve();
        let Some(credential) = resolution.credential else {
            warn!(
                session_id = %self.id,
                source = %resolution.source,
                "no api credential available; session is not configured"
            );
            self.client_status = ClientStatus::Unconfigured {
                source: resolution.source,
                reason: "no credential source produced a value".to_string(),
            };
            return;
        };

        match self.services.client_factory.connect(&credential) {
            Ok(client) => {
                info!(
                    session_id = %self.id,
                    source = %resolution.source,
                    model = client.model(),
                    "model client configured"
                );
                self.client = Some(client);
                self.client_status = ClientStatus::Configured {
                    source: resolution.source,
                };
            }
            Err(err) => {
                warn!(
                    session_id = %self.id,
                    source = %resolution.source,
                    error = %err,
                    "model client construction failed"
                );
                self.client_status = ClientStatus::Unconfigured {
                    source: resolution.source,
                    reason: err.to_string(),
                };
            }
        }
    }
}
