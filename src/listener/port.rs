use super::transcript::TranscriptRecord;
use serde::Serialize;
use std::io::Write;
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

/// Port the animation side subscribes to.
pub const NEW_TRANSCRIPT_PORT: &str = "newTranscript";

#[derive(Debug, Error)]
pub enum PortError {
    #[error("port {0} has no consumer")]
    Closed(&'static str),
    #[error("failed to write to port: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode transcripts: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Outbound message port for transcript batches.
pub trait TranscriptPort: Send + Sync {
    fn name(&self) -> &'static str {
        NEW_TRANSCRIPT_PORT
    }

    fn send(&self, transcripts: Vec<TranscriptRecord>) -> Result<(), PortError>;
}

/// Delivers batches to an in-process consumer.
pub struct ChannelPort {
    tx: mpsc::UnboundedSender<Vec<TranscriptRecord>>,
}

impl ChannelPort {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Vec<TranscriptRecord>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl TranscriptPort for ChannelPort {
    fn send(&self, transcripts: Vec<TranscriptRecord>) -> Result<(), PortError> {
        self.tx
            .send(transcripts)
            .map_err(|_| PortError::Closed(NEW_TRANSCRIPT_PORT))
    }
}

#[derive(Serialize)]
struct PortMessage<'a> {
    port: &'a str,
    data: &'a [TranscriptRecord],
}

/// Writes each batch as one JSON line: `{"port": "newTranscript", "data": [...]}`.
pub struct JsonLinesPort<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesPort<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> TranscriptPort for JsonLinesPort<W> {
    fn send(&self, transcripts: Vec<TranscriptRecord>) -> Result<(), PortError> {
        let line = serde_json::to_string(&PortMessage {
            port: self.name(),
            data: &transcripts,
        })?;

        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}
