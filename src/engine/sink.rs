// Consumer sink — where artifacts, progress and errors leave the engine.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::detect::format::Artifact;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    /// Shown while the artifact is being fetched.
    Loading,
    /// Shown after the request failed.
    Error,
}

/// Capability implemented by whatever displays the artifact.
///
/// The engine never knows the rendering target; one adapter per target type
/// lives on the consumer side. `transition` is the fade duration; zero means
/// show immediately. Loading placeholders always arrive with zero.
pub trait ConsumerSink: Send + Sync {
    fn on_placeholder(&self, artifact: &Artifact, kind: PlaceholderKind, transition: Duration);

    fn on_artifact(&self, artifact: &Artifact, transition: Duration);

    fn on_progress(&self, _percent: u8) {}

    fn on_error(&self, _message: &str) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Placeholder(Artifact, PlaceholderKind, Duration),
    Artifact(Artifact, Duration),
    Progress(u8),
    Error(String),
}

/// Sink adapter that forwards every call into a channel, for consumers that
/// render on their own task or thread.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ConsumerSink for ChannelSink {
    fn on_placeholder(&self, artifact: &Artifact, kind: PlaceholderKind, transition: Duration) {
        let _ = self
            .tx
            .send(SinkEvent::Placeholder(artifact.clone(), kind, transition));
    }

    fn on_artifact(&self, artifact: &Artifact, transition: Duration) {
        let _ = self.tx.send(SinkEvent::Artifact(artifact.clone(), transition));
    }

    fn on_progress(&self, percent: u8) {
        let _ = self.tx.send(SinkEvent::Progress(percent));
    }

    fn on_error(&self, message: &str) {
        let _ = self.tx.send(SinkEvent::Error(message.to_string()));
    }
}
