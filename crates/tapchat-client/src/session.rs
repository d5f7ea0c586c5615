//! Chat session lifecycle.
//!
//! A session runs in a dedicated tokio task that owns the message list and
//! the pending capture. The application talks to it through a
//! [`SessionHandle`] and receives [`SessionNotification`]s, so all session
//! state is touched from a single task and needs no locking.
//!
//! Ending a session, whether requested or caused by a dropped connection,
//! unsubscribes from the transport, asks it to disconnect and archives
//! every held message.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use tapchat_shared::Message;

use crate::comm::{CaptureOutcome, Communication, ConnectionEvent};
use crate::config::ClientConfig;
use crate::error::SessionError;
use crate::events::{emit, EndReason, SessionNotification, SessionSummary};
use crate::transfer::{ImageStage, TransferOrchestrator};

/// Commands sent *into* the session task.
#[derive(Debug)]
enum SessionCommand {
    Capture {
        outcome: CaptureOutcome,
        reply: oneshot::Sender<Result<bool, SessionError>>,
    },
    Send {
        text: String,
        reply: oneshot::Sender<Result<Message, SessionError>>,
    },
    Messages(oneshot::Sender<Vec<Message>>),
    PendingImage(oneshot::Sender<bool>),
    End(oneshot::Sender<SessionSummary>),
}

/// Cloneable handle to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<SessionCommand>,
}

/// Start a session over `comm`.
///
/// `history` holds messages from earlier sessions; they are shown along
/// with the new ones and stay archived. Fails with
/// [`SessionError::NotConnected`] if there is no live connection, in which
/// case nothing is subscribed.
pub fn begin_session(
    comm: Arc<dyn Communication>,
    orchestrator: TransferOrchestrator,
    config: &ClientConfig,
    history: Vec<Message>,
) -> Result<(SessionHandle, mpsc::Receiver<SessionNotification>), SessionError> {
    if !comm.is_connected() {
        warn!("No active connection, session not started");
        return Err(SessionError::NotConnected);
    }

    let events = comm.subscribe();
    let (cmd_tx, cmd_rx) = mpsc::channel(config.command_capacity);
    let (notify_tx, notify_rx) = mpsc::channel(config.notify_capacity);

    let task = SessionTask {
        comm,
        orchestrator,
        sender_name: config.sender_name.clone(),
        messages: history,
        pending: ImageStage::None,
        cmd_rx,
        notify_tx,
    };
    tokio::spawn(task.run(events));

    Ok((SessionHandle { cmd_tx }, notify_rx))
}

impl SessionHandle {
    /// Hand a photo picker result to the session. Returns whether a
    /// capture is now pending.
    pub async fn capture(&self, outcome: CaptureOutcome) -> Result<bool, SessionError> {
        self.request(|reply| SessionCommand::Capture { outcome, reply })
            .await?
    }

    /// Send `text` together with the pending capture, if any.
    ///
    /// The message is kept in the conversation even when the transport
    /// fails; the failure is still returned.
    pub async fn send(&self, text: impl Into<String>) -> Result<Message, SessionError> {
        let text = text.into();
        self.request(|reply| SessionCommand::Send { text, reply })
            .await?
    }

    /// Snapshot of the held messages in arrival order.
    pub async fn messages(&self) -> Result<Vec<Message>, SessionError> {
        self.request(SessionCommand::Messages).await
    }

    pub async fn has_pending_image(&self) -> Result<bool, SessionError> {
        self.request(SessionCommand::PendingImage).await
    }

    /// End the session and archive every held message.
    ///
    /// Returns [`SessionError::Closed`] if the session already ended.
    pub async fn end_session(&self) -> Result<SessionSummary, SessionError> {
        self.request(SessionCommand::End).await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(build(tx))
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }
}

struct SessionTask {
    comm: Arc<dyn Communication>,
    orchestrator: TransferOrchestrator,
    sender_name: String,
    messages: Vec<Message>,
    pending: ImageStage,
    cmd_rx: mpsc::Receiver<SessionCommand>,
    notify_tx: mpsc::Sender<SessionNotification>,
}

impl SessionTask {
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<ConnectionEvent>) {
        info!(held = self.messages.len(), "Session started");

        let (reason, reply) = loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => {
                        if let Some(reply) = self.handle_command(cmd).await {
                            break (EndReason::Requested, Some(reply));
                        }
                    }
                    // every handle dropped
                    None => break (EndReason::Requested, None),
                },

                event = events.recv() => match event {
                    Some(ConnectionEvent::MessageReceived(payload)) => {
                        self.on_payload(&payload).await;
                    }
                    // transport gone counts as interrupted
                    Some(ConnectionEvent::Interrupted) | None => {
                        warn!("Connection interrupted");
                        break (EndReason::Interrupted, None);
                    }
                },
            }
        };

        // Unsubscribe before disconnecting so nothing more is delivered.
        drop(events);

        let summary = self.finish(reason);
        if let Some(reply) = reply {
            let _ = reply.send(summary.clone());
        }
        emit(&self.notify_tx, SessionNotification::SessionEnded(summary)).await;
    }

    /// Returns the reply channel when the command ends the session.
    async fn handle_command(
        &mut self,
        cmd: SessionCommand,
    ) -> Option<oneshot::Sender<SessionSummary>> {
        match cmd {
            SessionCommand::Capture { outcome, reply } => {
                let result = self
                    .orchestrator
                    .stage_capture(&mut self.pending, outcome)
                    .await
                    .map_err(|e| {
                        warn!(error = %e, "Failed to stage capture");
                        SessionError::from(e)
                    });
                let _ = reply.send(result);
            }
            SessionCommand::Send { text, reply } => {
                let result = self.send_draft(text).await;
                let _ = reply.send(result);
            }
            SessionCommand::Messages(reply) => {
                let _ = reply.send(self.messages.clone());
            }
            SessionCommand::PendingImage(reply) => {
                let _ = reply.send(self.pending.is_pending());
            }
            SessionCommand::End(reply) => return Some(reply),
        }
        None
    }

    async fn send_draft(&mut self, text: String) -> Result<Message, SessionError> {
        if text.is_empty() && !self.pending.is_pending() {
            return Err(SessionError::EmptyDraft);
        }

        let stage = std::mem::take(&mut self.pending);
        let mut message = Message::outbound(self.sender_name.clone(), text);
        let stage = self.orchestrator.prepare_outbound(&mut message, stage).await;
        if message.text.is_empty() && message.image_name().is_none() {
            debug!("Capture could not be encoded and there is no text");
            return Err(SessionError::EmptyDraft);
        }

        let result = self.comm.send_message(&message).await;
        let stage = match &result {
            Ok(()) => stage.sent(),
            Err(e) => {
                warn!(error = %e, "Failed to send message");
                stage
            }
        };
        let stage = self.orchestrator.complete_outbound(&mut message, stage);
        debug!(stage = ?stage, "Outbound message done");

        self.messages.push(message.clone());
        emit(
            &self.notify_tx,
            SessionNotification::MessageArrived(message.clone()),
        )
        .await;

        result?;
        Ok(message)
    }

    async fn on_payload(&mut self, payload: &[u8]) {
        let decoded = match Message::decode(payload) {
            Ok(m) => m,
            Err(e) => {
                warn!(len = payload.len(), error = %e, "Dropping malformed payload");
                return;
            }
        };

        let mut message = Message::received(decoded);
        let stored = self.orchestrator.accept_inbound(&mut message).await;
        debug!(
            sender = %message.sender_name,
            image_stored = stored,
            "Message received"
        );

        self.messages.push(message.clone());
        emit(&self.notify_tx, SessionNotification::MessageArrived(message)).await;
    }

    fn finish(&mut self, reason: EndReason) -> SessionSummary {
        self.comm.disconnect();

        let newly_archived = self
            .messages
            .iter_mut()
            .map(Message::archive)
            .filter(|changed| *changed)
            .count();

        info!(
            reason = ?reason,
            held = self.messages.len(),
            newly_archived,
            "Session ended"
        );

        SessionSummary {
            reason,
            newly_archived,
            ended_at: Utc::now(),
            messages: self.messages.clone(),
        }
    }
}
