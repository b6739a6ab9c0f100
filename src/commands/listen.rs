use crate::bootstrap::Page;
use crate::listener::{ChannelRecognizer, JsonLinesPort, MicrophoneListener, RecognitionEvent};
use anyhow::Result;
use log::{info, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

const EVENT_BUFFER: usize = 64;

/// Run the transcript listener over stdin events, writing records to stdout.
pub async fn listen(page: &Page) -> Result<()> {
    let context = page.content_loaded()?;
    let (events, recognizer) = ChannelRecognizer::channel(EVENT_BUFFER);
    let port = Arc::new(JsonLinesPort::new(std::io::stdout()));
    let mut listener = MicrophoneListener::init(context, page.settings(), recognizer, port)?;

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read recognition event: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match RecognitionEvent::from_json_line(&line) {
                Ok(event) => {
                    if events.send(event).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Ignoring malformed recognition event '{}': {}", line, e),
            }
        }
    });

    tokio::select! {
        reason = listener.run() => info!("Listener stopped: {:?}", reason),
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }
    Ok(())
}
