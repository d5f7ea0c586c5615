use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use tapchat_shared::Message;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EndReason {
    /// The user left the conversation.
    Requested,
    /// The connection dropped. The caller should leave the conversation view.
    Interrupted,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub reason: EndReason,
    /// Messages that were not archived before this session ended.
    pub newly_archived: usize,
    pub ended_at: DateTime<Utc>,
    /// Everything held by the session, now read-only history.
    pub messages: Vec<Message>,
}

/// Notifications sent *from* the session task to the application.
#[derive(Debug, Clone)]
pub enum SessionNotification {
    /// A message joined the conversation, received or sent locally.
    MessageArrived(Message),
    /// The session is over and every held message is archived.
    SessionEnded(SessionSummary),
}

pub async fn emit(tx: &mpsc::Sender<SessionNotification>, notification: SessionNotification) {
    if tx.send(notification).await.is_err() {
        debug!("Notification receiver dropped");
    }
}
