//! Terminal prompts for the companion binary

use anyhow::{Result, bail};
use async_trait::async_trait;
use log::warn;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use crate::core::ports::AlertPrompter;

/// Shows prompts on stdout and reads answers from stdin, one at a time.
pub struct ConsolePrompter {
    input: Mutex<Lines<BufReader<Stdin>>>,
}

impl ConsolePrompter {
    pub fn new() -> Self {
        Self {
            input: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }
}

impl Default for ConsolePrompter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlertPrompter for ConsolePrompter {
    async fn confirm(&self, title: &str, message: &str) -> Result<bool> {
        let mut input = self.input.lock().await;

        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(format!("\n*** {} ***\n{} [y/N]: ", title, message).as_bytes())
            .await?;
        stdout.flush().await?;

        match input.next_line().await? {
            Some(answer) => Ok(is_yes(&answer)),
            None => bail!("stdin closed while waiting for an answer"),
        }
    }

    async fn alert(&self, title: &str, message: &str) {
        warn!("{}: {}", title, message);
        if let Err(e) = write_alert(&mut tokio::io::stdout(), title, message).await {
            warn!("Could not print alert: {}", e);
        }
    }
}

async fn write_alert<W: AsyncWrite + Unpin>(out: &mut W, title: &str, message: &str) -> std::io::Result<()> {
    let text = format!("\n*** {} ***\n{}\n", title, message);
    out.write_all(text.as_bytes()).await?;
    out.flush().await
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
