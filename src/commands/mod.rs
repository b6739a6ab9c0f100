mod listen;
mod score;
mod watch;

pub use listen::listen;
pub use score::score;
pub use watch::watch;

use crate::bootstrap::Page;
use crate::cli::Command;
use anyhow::Result;

pub async fn run_command(command: Command, page: Page) -> Result<()> {
    match command {
        Command::Score { text } => score(&page, &text).await,
        Command::Watch => watch(&page).await,
        Command::Listen => listen(&page).await,
    }
}
