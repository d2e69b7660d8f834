use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::warn;

use super::LogFetcher;
use crate::error::FetchError;

/// A log source that dumps a Docker container's log with `docker logs`
pub struct DockerSource {
    container: String,
}

impl DockerSource {
    pub fn new(container: String) -> Self {
        Self { container }
    }
}

/// Forward lines from one of the child's pipes into the shared channel.
///
/// The pipe is read to EOF even if the receiver is gone, so the child never blocks
/// on a full pipe. Invalid UTF-8 is replaced rather than ending the stream.
async fn forward_lines<R>(pipe: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                    if buf.last() == Some(&b'\r') {
                        buf.pop();
                    }
                }
                let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
            }
            Err(e) => {
                warn!(error = %e, "docker log pipe read failed");
                break;
            }
        }
    }
}

#[async_trait::async_trait]
impl LogFetcher for DockerSource {
    async fn fetch(&self) -> Result<String, FetchError> {
        let mut child = Command::new("docker")
            .arg("logs")
            .arg("--")
            .arg(&self.container)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FetchError::Spawn {
                program: "docker",
                reason: e.to_string(),
            })?;

        // Containers write to both streams; docker replays them on separate pipes,
        // so read both concurrently and keep arrival order.
        let (tx, mut rx) = mpsc::unbounded_channel();
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(forward_lines(stderr, tx.clone())));
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, tx).await;
        } else {
            drop(tx);
        }
        if let Some(handle) = stderr_task {
            let _ = handle.await;
        }

        let mut text = String::new();
        while let Some(line) = rx.recv().await {
            text.push_str(&line);
            text.push('\n');
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(FetchError::Command {
                program: "docker",
                status: status.to_string(),
                stderr: text.lines().last().unwrap_or_default().to_string(),
            });
        }

        Ok(text)
    }

    fn name(&self) -> String {
        format!("docker:{}", self.container)
    }
}
