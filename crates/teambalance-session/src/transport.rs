//! Notification transport for asks and their cancellation.
//!
//! Every send is fire-and-forget. A notification addressed to a
//! participant who has since disconnected is dropped by the transport.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use teambalance_core::{ParticipantId, SideId};

/// Delivers controller notifications to participants.
pub trait Transport {
    /// Ask a participant whether they will switch sides.
    fn send_ask(&mut self, participant: ParticipantId);

    /// Close a participant's outstanding ask prompt.
    fn send_cancel(&mut self, participant: ParticipantId);

    /// Tell everyone a balance is starting and which side is heavy.
    fn announce_balance(&mut self, heavy: SideId);
}

/// A notification as it left the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    Ask { participant: ParticipantId },
    Cancel { participant: ParticipantId },
    BalanceStarting { heavy: SideId },
}

/// Transport that keeps everything it was asked to send.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Vec<Notification>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> &[Notification] {
        &self.sent
    }

    /// Participants asked so far, in ask order.
    pub fn asks(&self) -> Vec<ParticipantId> {
        self.sent
            .iter()
            .filter_map(|n| match n {
                Notification::Ask { participant } => Some(*participant),
                _ => None,
            })
            .collect()
    }

    /// Participants whose prompt was cancelled, in send order.
    pub fn cancels(&self) -> Vec<ParticipantId> {
        self.sent
            .iter()
            .filter_map(|n| match n {
                Notification::Cancel { participant } => Some(*participant),
                _ => None,
            })
            .collect()
    }

    pub fn announcements(&self) -> usize {
        self.sent
            .iter()
            .filter(|n| matches!(n, Notification::BalanceStarting { .. }))
            .count()
    }

    pub fn clear(&mut self) {
        self.sent.clear();
    }
}

impl Transport for RecordingTransport {
    fn send_ask(&mut self, participant: ParticipantId) {
        self.sent.push(Notification::Ask { participant });
    }

    fn send_cancel(&mut self, participant: ParticipantId) {
        self.sent.push(Notification::Cancel { participant });
    }

    fn announce_balance(&mut self, heavy: SideId) {
        self.sent.push(Notification::BalanceStarting { heavy });
    }
}

/// Transport that forwards notifications onto a channel for a network
/// task to deliver.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelTransport {
    pub fn new(tx: mpsc::UnboundedSender<Notification>) -> Self {
        Self { tx }
    }

    fn forward(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            debug!(?notification, "notification channel closed, dropping");
        }
    }
}

impl Transport for ChannelTransport {
    fn send_ask(&mut self, participant: ParticipantId) {
        self.forward(Notification::Ask { participant });
    }

    fn send_cancel(&mut self, participant: ParticipantId) {
        self.forward(Notification::Cancel { participant });
    }

    fn announce_balance(&mut self, heavy: SideId) {
        self.forward(Notification::BalanceStarting { heavy });
    }
}
