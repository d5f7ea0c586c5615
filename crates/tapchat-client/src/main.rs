//! # tapchat
//!
//! Runs a conversation between two peers joined by an in-memory link:
//! the local peer sends one message, optionally with a photo, then leaves.
//! The receiving peer's archived transcript is printed as JSON.
//!
//! Images of the two peers are kept apart under `<data_dir>/local` and
//! `<data_dir>/peer`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::info;

use tapchat_client::{
    begin_session, init_tracing, loopback, CaptureOutcome, ClientConfig, Communication,
    SessionNotification, TransferOrchestrator,
};
use tapchat_media::JpegCodec;
use tapchat_shared::Message;
use tapchat_store::ImageStore;

#[derive(Debug, Parser)]
#[command(name = "tapchat", version, about = "Send a chat message, with an optional photo, to a local peer")]
struct Cli {
    /// Message text
    #[arg(short, long, default_value = "")]
    text: String,

    /// Photo to attach
    #[arg(short, long)]
    photo: Option<PathBuf>,

    /// Name of the receiving peer
    #[arg(long, default_value = "Peer", env = "TAPCHAT_PEER_NAME")]
    peer_name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptEntry {
    #[serde(flatten)]
    message: Message,
    has_image: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = ClientConfig::from_env();
    info!(?config, "Loaded configuration");

    let local_store = ImageStore::new(config.data_dir.join("local"));
    let peer_store = ImageStore::new(config.data_dir.join("peer"));
    local_store.log_location();
    peer_store.log_location();

    let codec = Arc::new(JpegCodec::new());
    let local = TransferOrchestrator::new(local_store, codec.clone());
    let peer = TransferOrchestrator::new(peer_store, codec);

    let (local_link, peer_link) = loopback::pair(&config.sender_name, &cli.peer_name);
    let local_link: Arc<dyn Communication> = Arc::new(local_link);
    let peer_link: Arc<dyn Communication> = Arc::new(peer_link);

    let peer_config = ClientConfig {
        sender_name: cli.peer_name.clone(),
        ..config.clone()
    };
    let (local_session, _local_events) = begin_session(local_link, local, &config, Vec::new())?;
    let (_peer_session, mut peer_events) =
        begin_session(peer_link, peer.clone(), &peer_config, Vec::new())?;

    if let Some(path) = &cli.photo {
        let raw = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read photo {}", path.display()))?;
        local_session.capture(CaptureOutcome::Chosen(raw)).await?;
    }

    let sent = local_session.send(cli.text).await?;
    info!(image = ?sent.image_name(), "Message sent");

    let local_summary = local_session.end_session().await?;

    let mut peer_summary = None;
    while let Some(notification) = peer_events.recv().await {
        match notification {
            SessionNotification::MessageArrived(m) => {
                info!(from = %m.sender_name, "Peer received message");
            }
            SessionNotification::SessionEnded(summary) => {
                peer_summary = Some(summary);
                break;
            }
        }
    }
    let peer_summary = peer_summary.context("Peer session closed without a summary")?;

    let mut transcript = Vec::with_capacity(peer_summary.messages.len());
    for message in &peer_summary.messages {
        transcript.push(TranscriptEntry {
            has_image: peer.has_image(message).await,
            message: message.clone(),
        });
    }
    println!("{}", serde_json::to_string_pretty(&transcript)?);

    info!(
        local = ?local_summary.reason,
        peer = ?peer_summary.reason,
        archived = peer_summary.newly_archived,
        "Sessions ended"
    );
    Ok(())
}
