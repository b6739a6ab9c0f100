use crate::bootstrap::Page;
use crate::sentiment::{ScoreBoard, SentimentController, SentimentScore, VisualizationSink};
use anyhow::Result;
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

const SETTLE_POLL: Duration = Duration::from_millis(50);

/// Prints the scoreboard every time a new score lands.
struct PrintingSink {
    board: ScoreBoard,
}

impl VisualizationSink for PrintingSink {
    fn setup(&self) {
        self.board.setup();
    }

    fn update(&self, score: &SentimentScore) {
        self.board.update(score);
        if let Some(rendered) = self.board.render() {
            println!("{}", rendered);
        }
    }
}

/// Feed stdin lines to the input field until EOF or Ctrl-C.
pub async fn watch(page: &Page) -> Result<()> {
    let context = page.content_loaded()?;
    let sink = Arc::new(PrintingSink {
        board: ScoreBoard::new(),
    });
    let controller = SentimentController::init(context, page.settings(), sink);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => controller.on_input(line),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                return Ok(());
            }
        }
    }

    debug!("Input closed, waiting for the last submission");
    while controller.is_busy() {
        tokio::time::sleep(SETTLE_POLL).await;
    }
    Ok(())
}
