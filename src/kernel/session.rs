//! Client session receive loop.
//!
//! Reads raw JSON messages, answers each one, emits a keep-alive ping when
//! the client goes quiet and ends the session after too many consecutive
//! processing failures.

use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::governor::SharedGovernor;
use super::message::{parse_inbound, Outbound};
use super::reactor::Reactor;
use super::telemetry;
use super::telemetry::event::{ErrorClass, TelemetryEvent};
use crate::config::{PipelineConfig, SessionConfig};
use crate::error::Result;
use crate::services::Services;

/// Why a session loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Inbound stream closed or the outbound side went away.
    Disconnected,
    /// Consecutive processing errors exhausted the retry budget.
    Fatal,
    /// Process shutdown.
    Cancelled,
}

pub struct Session {
    reactor: Reactor,
    config: SessionConfig,
    retry_count: u32,
}

impl Session {
    pub fn new(config: &PipelineConfig, services: Services, governor: SharedGovernor) -> Result<Self> {
        let id = Uuid::new_v4().to_string();
        Ok(Self {
            reactor: Reactor::new(id, config, services, governor)?,
            config: config.session.clone(),
            retry_count: 0,
        })
    }

    pub fn id(&self) -> &str {
        self.reactor.session_id()
    }

    pub fn reactor(&self) -> &Reactor {
        &self.reactor
    }

    /// Answers one raw message. The flag is set when the session must end
    /// once the reply is delivered.
    pub fn respond(&mut self, raw: &str) -> (Outbound, bool) {
        match parse_inbound(raw).and_then(|msg| self.reactor.handle(msg)) {
            Ok(reply) => {
                self.retry_count = 0;
                (reply, false)
            }
            Err(e) if e.is_malformed() => {
                debug!("Rejected malformed message: {}", e);
                telemetry::record(
                    self.reactor.telemetry(),
                    TelemetryEvent::SessionError(ErrorClass::Malformed),
                );
                (Outbound::error(e.to_string(), e.kind(), None), false)
            }
            Err(e) => {
                self.retry_count += 1;
                warn!(
                    "Session {} processing error (attempt {}/{}): {}",
                    self.id(),
                    self.retry_count,
                    self.config.max_retries,
                    e
                );
                telemetry::record(
                    self.reactor.telemetry(),
                    TelemetryEvent::SessionError(ErrorClass::Processing),
                );
                if self.retry_count >= self.config.max_retries {
                    error!("Session {} exceeded its retry budget", self.id());
                    telemetry::record(self.reactor.telemetry(), TelemetryEvent::SessionError(ErrorClass::Fatal));
                    return (Outbound::fatal("Max retries exceeded"), true);
                }
                (
                    Outbound::error(format!("Processing error: {}", e), e.kind(), Some(self.retry_count)),
                    false,
                )
            }
        }
    }

    /// Drives the session until the client disconnects, the error budget is
    /// spent or `shutdown` fires. The pipeline is torn down before returning.
    pub async fn run(
        mut self,
        mut inbound: mpsc::Receiver<String>,
        outbound: mpsc::Sender<Outbound>,
        shutdown: CancellationToken,
    ) -> SessionEnd {
        info!("Session {} connected", self.id());
        let keepalive = self.config.keepalive();

        let end = loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => break SessionEnd::Cancelled,
                next = timeout(keepalive, inbound.recv()) => next,
            };

            let reply = match next {
                Err(_) => {
                    debug!("Session {} idle, sending ping", self.id());
                    Outbound::ping()
                }
                Ok(None) => break SessionEnd::Disconnected,
                Ok(Some(raw)) => {
                    let (reply, fatal) = self.respond(&raw);
                    if fatal {
                        let _ = outbound.send(reply).await;
                        break SessionEnd::Fatal;
                    }
                    reply
                }
            };

            if outbound.send(reply).await.is_err() {
                break SessionEnd::Disconnected;
            }
        };

        info!("Session {} ended: {:?}", self.id(), end);
        self.reactor.shutdown().await;
        end
    }
}
