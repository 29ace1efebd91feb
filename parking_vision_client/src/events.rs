// THEORY:
// The `EventChannel` is the push path from the backend. Frames are JSON text
// of the form `{"event": <name>, "data": <object>}`. The transport that
// delivers them is up to the caller; `EventChannel::run` only needs a stream
// of frame strings.

use futures::{Stream, StreamExt};
use log::{debug, info, warn};
use parking_vision::DetectionPayload;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::watch;

use crate::{DetectionUpdate, ResultBus, UpdateSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusMessage {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connect,
    Disconnect,
    DetectionResult(DetectionPayload),
    Status(StatusMessage),
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame is not valid JSON")]
    Json(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Decodes one frame. Unknown event names give `Ok(None)`.
pub fn decode_frame(text: &str) -> Result<Option<ChannelEvent>, FrameError> {
    let raw: RawFrame = serde_json::from_str(text)?;
    let event = match raw.event.as_str() {
        "connect" => ChannelEvent::Connect,
        "disconnect" => ChannelEvent::Disconnect,
        "detection_result" => ChannelEvent::DetectionResult(serde_json::from_value(raw.data)?),
        "status" => ChannelEvent::Status(serde_json::from_value(raw.data)?),
        other => {
            debug!("ignoring unknown event {other:?}");
            return Ok(None);
        }
    };
    Ok(Some(event))
}

/// What happened over one run of the channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSummary {
    pub frames: u64,
    pub results: u64,
    pub ignored: u64,
    pub malformed: u64,
}

pub struct EventChannel {
    bus: ResultBus,
    status_tx: watch::Sender<ConnectionStatus>,
}

impl EventChannel {
    pub fn new(bus: ResultBus) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        Self { bus, status_tx }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    fn set_status(&self, status: ConnectionStatus) {
        let previous = self.status_tx.send_replace(status);
        if previous != status {
            info!("event channel {status:?}");
        }
    }

    /// Consumes frames until the stream ends. The channel is considered
    /// disconnected afterwards.
    pub async fn run<S, T>(&self, frames: S) -> ChannelSummary
    where
        S: Stream<Item = T>,
        T: AsRef<str>,
    {
        let mut summary = ChannelSummary::default();
        let mut frames = std::pin::pin!(frames);

        while let Some(frame) = frames.next().await {
            summary.frames += 1;
            match decode_frame(frame.as_ref()) {
                Ok(Some(ChannelEvent::Connect)) => self.set_status(ConnectionStatus::Connected),
                Ok(Some(ChannelEvent::Disconnect)) => self.set_status(ConnectionStatus::Disconnected),
                Ok(Some(ChannelEvent::Status(status))) => {
                    self.set_status(ConnectionStatus::Connected);
                    info!("backend status: {}", status.message);
                }
                Ok(Some(ChannelEvent::DetectionResult(payload))) => {
                    summary.results += 1;
                    self.bus.publish(DetectionUpdate::new(payload, UpdateSource::Push));
                }
                Ok(None) => summary.ignored += 1,
                Err(err) => {
                    summary.malformed += 1;
                    warn!("dropping malformed event frame: {err}");
                }
            }
        }

        self.set_status(ConnectionStatus::Disconnected);
        summary
    }
}
