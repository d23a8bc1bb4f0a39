//! Telephony through an external dial command
//! Hands a `tel:` URI to a configured program (by default `xdg-open`, which
//! passes it on to whatever handles phone links on the desktop).

use anyhow::Result;
use async_trait::async_trait;
use log::{info, warn};
use regex::Regex;
use tokio::process::Command;

use crate::config::escalation_config::EscalationConfig;
use crate::core::ports::{CallError, Telephony};

const URI_PLACEHOLDER: &str = "{uri}";

pub struct CommandDialer {
    program: String,
    args: Vec<String>,
    number_pattern: Regex,
}

impl CommandDialer {
    pub fn new(config: &EscalationConfig) -> Result<Self> {
        Ok(Self {
            program: config.dial_program.clone(),
            args: config.dial_args.clone(),
            number_pattern: Regex::new(r"^\+?[0-9*#]{2,15}$")?,
        })
    }

    fn command_args(&self, number: &str) -> Vec<String> {
        let uri = format!("tel:{}", number);
        self.args
            .iter()
            .map(|arg| arg.replace(URI_PLACEHOLDER, &uri))
            .collect()
    }
}

#[async_trait]
impl Telephony for CommandDialer {
    async fn can_call(&self, number: &str) -> bool {
        if self.program.is_empty() {
            warn!("No dial program configured.");
            return false;
        }
        self.number_pattern.is_match(number)
    }

    async fn call(&self, number: &str) -> Result<(), CallError> {
        let args = self.command_args(number);
        info!("Dialing {} via {} {:?}", number, self.program, args);

        let status = Command::new(&self.program)
            .args(&args)
            .status()
            .await
            .map_err(|e| CallError::new("SpawnFailed", format!("{}: {}", self.program, e)))?;

        if !status.success() {
            return Err(CallError::new(
                "DialerFailed",
                format!("{} exited with {}", self.program, status),
            ));
        }
        Ok(())
    }
}
