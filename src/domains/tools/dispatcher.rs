//! Dispatcher - accepts call requests and publishes their outcomes.
//!
//! Every accepted request ends in exactly one [`CallOutcome`] on the event
//! bus, whether the tool is missing, fails, or even panics. The caller only
//! gets an acknowledgement; results travel over the bus keyed by correlation
//! id.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::handlers::Arguments;
use super::registry::ToolRegistry;
use crate::domains::events::EventBus;

/// Error message published when no tool matches the requested name.
pub const TOOL_NOT_REGISTERED: &str = "Tool not registered";

/// A request to invoke one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    /// Caller-supplied correlation id.
    pub cid: String,
    /// Tool name, matched case-insensitively.
    pub name: String,
    /// Missing or `null` arguments mean an empty object.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub arguments: Arguments,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Arguments, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Arguments>::deserialize(deserializer)?.unwrap_or_default())
}

impl CallRequest {
    pub fn new(cid: impl Into<String>, name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            cid: cid.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Terminal status of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CallStatus {
    Success { result: Value },
    Error { error: String },
}

/// The published result of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallOutcome {
    pub cid: String,
    pub name: String,
    #[serde(flatten)]
    pub status: CallStatus,
}

impl CallOutcome {
    pub fn success(cid: impl Into<String>, name: impl Into<String>, result: Value) -> Self {
        Self {
            cid: cid.into(),
            name: name.into(),
            status: CallStatus::Success { result },
        }
    }

    pub fn error(cid: impl Into<String>, name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            cid: cid.into(),
            name: name.into(),
            status: CallStatus::Error {
                error: error.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, CallStatus::Success { .. })
    }
}

/// Immediate acknowledgement returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallAck {
    pub ack: String,
    pub cid: String,
}

impl CallAck {
    pub fn received(cid: impl Into<String>) -> Self {
        Self {
            ack: "received".to_string(),
            cid: cid.into(),
        }
    }
}

/// Resolves tools by name, runs them and publishes outcomes.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    events: EventBus<CallOutcome>,
    detached: bool,
}

impl Dispatcher {
    /// Create a dispatcher. With `detached`, [`invoke`](Self::invoke) runs
    /// the handler on a spawned task after acknowledging.
    pub fn new(registry: Arc<ToolRegistry>, events: EventBus<CallOutcome>, detached: bool) -> Self {
        Self {
            registry,
            events,
            detached,
        }
    }

    pub fn events(&self) -> &EventBus<CallOutcome> {
        &self.events
    }

    /// Accept a request and acknowledge it.
    ///
    /// Exactly one outcome for `request.cid` is published on the bus, either
    /// before this returns (inline mode) or later (detached mode).
    pub async fn invoke(&self, request: CallRequest) -> CallAck {
        let ack = CallAck::received(request.cid.clone());

        if self.detached {
            let dispatcher = self.clone();
            tokio::spawn(async move {
                dispatcher.dispatch(request).await;
            });
        } else {
            self.dispatch(request).await;
        }

        ack
    }

    /// Execute a request and publish its outcome, returning it as well.
    pub async fn dispatch(&self, request: CallRequest) -> CallOutcome {
        let outcome = self.execute(request).await;
        self.events.publish(outcome.clone());
        outcome
    }

    /// Resolve and run the tool, converting every failure into an outcome.
    #[instrument(skip(self, request), fields(cid = %request.cid, tool = %request.name))]
    async fn execute(&self, request: CallRequest) -> CallOutcome {
        let CallRequest {
            cid,
            name,
            arguments,
        } = request;

        let Some(tool) = self.registry.lookup(&name) else {
            warn!("Tool not found");
            return CallOutcome::error(cid, name, TOOL_NOT_REGISTERED);
        };

        let run = AssertUnwindSafe(tool.handler.execute(&arguments)).catch_unwind();
        match run.await {
            Ok(Ok(result)) => {
                info!("Tool executed successfully");
                CallOutcome::success(cid, name, result)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Tool execution failed");
                CallOutcome::error(cid, name, e.to_string())
            }
            Err(_) => {
                warn!("Tool handler panicked");
                CallOutcome::error(cid, name, "Tool execution panicked")
            }
        }
    }
}
