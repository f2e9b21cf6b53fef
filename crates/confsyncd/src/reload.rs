// # Command Reloader
//
// `ServiceReloader` that shells out to a supervisor command (e.g.
// `supervisorctl signal SIGHUP dnsmasq` or `systemctl reload dnsmasq`) after
// every successful file mutation.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error};

use confsync_core::error::{Error, Result};
use confsync_core::traits::ServiceReloader;

/// Reloader that runs a configured command line
pub struct CommandReloader {
    program: String,
    args: Vec<String>,
}

impl CommandReloader {
    /// Build from a whitespace-separated command line
    pub fn from_command_line(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| Error::config("reload command must not be empty"))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

#[async_trait]
impl ServiceReloader for CommandReloader {
    async fn reload(&self) -> Result<()> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| Error::reload(format!("could not run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(program = %self.program, status = %output.status, stderr = %stderr.trim(),
                "reload command failed");
            return Err(Error::reload(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }

        debug!(program = %self.program, "service reload signalled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_command_line_is_rejected() {
        assert!(CommandReloader::from_command_line("   ").is_err());
    }

    #[test]
    fn command_line_splits_into_program_and_args() {
        let reloader = CommandReloader::from_command_line("supervisorctl signal SIGHUP dnsmasq")
            .unwrap();
        assert_eq!(reloader.program, "supervisorctl");
        assert_eq!(reloader.args, vec!["signal", "SIGHUP", "dnsmasq"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_command_reloads_cleanly() {
        let reloader = CommandReloader::from_command_line("true").unwrap();
        reloader.reload().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_surfaces_a_reload_error() {
        let reloader = CommandReloader::from_command_line("false").unwrap();
        let err = reloader.reload().await.unwrap_err();
        assert!(matches!(err, Error::Reload(_)));
    }
}
