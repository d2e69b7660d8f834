use tokio::process::Command;

use super::{LogFetcher, capture_stdout};
use crate::error::FetchError;

/// SSH remote file log source
pub struct SshSource {
    /// SSH host (user@host or just host)
    host: String,
    /// Remote file path
    path: String,
}

impl SshSource {
    pub fn new(host: String, path: String) -> Self {
        Self { host, path }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.arg("-o")
            .arg("BatchMode=yes") // Disable password prompts
            .arg("-o")
            .arg("StrictHostKeyChecking=accept-new") // Accept new host keys
            .arg("--")
            .arg(&self.host)
            .arg("cat")
            .arg("--")
            .arg(&self.path);
        cmd
    }
}

#[async_trait::async_trait]
impl LogFetcher for SshSource {
    async fn fetch(&self) -> Result<String, FetchError> {
        capture_stdout("ssh", &mut self.command()).await
    }

    fn name(&self) -> String {
        format!("ssh:{}:{}", self.host, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssh_command_guards_host_and_path() {
        let source = SshSource::new("-oProxyCommand=x".to_string(), "/var/log/app.log".to_string());
        let cmd = source.command();
        let args: Vec<_> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        let host_pos = args.iter().position(|a| a == "-oProxyCommand=x").unwrap();
        assert_eq!(args[host_pos - 1], "--");
        assert_eq!(args.last().unwrap(), "/var/log/app.log");
    }
}
