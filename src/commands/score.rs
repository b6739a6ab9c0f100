use crate::bootstrap::Page;
use crate::sentiment::{ScoreBoard, SentimentController, SubmitOutcome};
use anyhow::{anyhow, Result};
use log::info;
use std::sync::Arc;

/// Score `text` once and print the result.
pub async fn score(page: &Page, text: &str) -> Result<()> {
    let context = page.content_loaded()?;
    let board = Arc::new(ScoreBoard::new());
    let controller = SentimentController::init(context, page.settings(), board.clone());

    match controller.on_button_click(text).await {
        SubmitOutcome::Rendered => {
            if let Some(rendered) = board.render() {
                println!("{}", rendered);
            }
            Ok(())
        }
        SubmitOutcome::Skipped => {
            info!("Nothing to score");
            Ok(())
        }
        SubmitOutcome::Failed => Err(anyhow!("Scoring failed, see log for details")),
    }
}
