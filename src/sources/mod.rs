//! Log source abstraction and implementations.
//!
//! Every source answers one question: "what is the full log text right now?"
//! The poller asks on a fixed interval. Implementations:
//! - Local files (read whole file)
//! - HTTP log endpoints, with an optional source selector
//! - Docker containers (via `docker logs`)
//! - Kubernetes pods (via `kubectl logs`)
//! - Remote files via SSH (via `ssh ... cat`)

pub mod docker;
pub mod file;
pub mod http;
pub mod k8s;
pub mod ssh;

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Result, bail};
use tokio::process::Command;

use crate::error::FetchError;

/// Describes how a log source is configured
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceSpec {
    File {
        path: PathBuf,
    },
    Http {
        url: String,
        selector: Option<String>,
    },
    Docker {
        container: String,
    },
    K8s {
        pod: String,
        namespace: Option<String>,
        container: Option<String>,
    },
    Ssh {
        host: String,
        path: String,
    },
}

impl SourceSpec {
    pub fn name(&self) -> String {
        match self {
            SourceSpec::File { path } => path
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string()),
            SourceSpec::Http { url, selector } => match selector {
                Some(sel) => format!("http:{}", sel),
                None => format!("http:{}", url),
            },
            SourceSpec::Docker { container } => format!("docker:{}", container),
            SourceSpec::K8s {
                pod,
                namespace,
                container,
            } => match (namespace, container) {
                (Some(ns), Some(c)) => format!("k8s:{}/{}/{}", ns, pod, c),
                (Some(ns), None) => format!("k8s:{}/{}", ns, pod),
                (None, Some(c)) => format!("k8s:{}/{}", pod, c),
                (None, None) => format!("k8s:{}", pod),
            },
            SourceSpec::Ssh { host, path } => format!("ssh:{}:{}", host, path),
        }
    }

    /// Build the fetcher for this source
    pub fn fetcher(&self) -> Result<Arc<dyn LogFetcher>, FetchError> {
        let fetcher: Arc<dyn LogFetcher> = match self.clone() {
            SourceSpec::File { path } => Arc::new(file::FileSource::new(path)),
            SourceSpec::Http { url, selector } => Arc::new(http::HttpSource::new(url, selector)),
            SourceSpec::Docker { container } => Arc::new(docker::DockerSource::new(container)),
            SourceSpec::K8s {
                pod,
                namespace,
                container,
            } => {
                k8s::validate_pod_name(&pod).map_err(FetchError::InvalidSource)?;
                Arc::new(k8s::K8sSource::new(pod, namespace, container))
            }
            SourceSpec::Ssh { host, path } => Arc::new(ssh::SshSource::new(host, path)),
        };
        Ok(fetcher)
    }

    /// Parse source arguments:
    ///
    /// ```text
    /// <path>
    /// --docker <container>
    /// --k8s [namespace/]pod[:container]
    /// --ssh <host>:<path>
    /// --http <url>[#selector]
    /// ```
    pub fn parse_args(args: &[String]) -> Result<Vec<SourceSpec>> {
        let mut specs = Vec::new();
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            let mut value = |flag: &str| match iter.next() {
                Some(v) => Ok(v.clone()),
                None => bail!("{} requires a value", flag),
            };

            let spec = match arg.as_str() {
                "--docker" => SourceSpec::Docker {
                    container: value("--docker")?,
                },
                "--k8s" => parse_k8s(&value("--k8s")?)?,
                "--ssh" => {
                    let target = value("--ssh")?;
                    match target.split_once(':') {
                        Some((host, path)) if !host.is_empty() && !path.is_empty() => {
                            SourceSpec::Ssh {
                                host: host.to_string(),
                                path: path.to_string(),
                            }
                        }
                        _ => bail!("--ssh expects <host>:<path>, got '{}'", target),
                    }
                }
                "--http" => {
                    let target = value("--http")?;
                    match target.split_once('#') {
                        Some((url, sel)) if !sel.is_empty() => SourceSpec::Http {
                            url: url.to_string(),
                            selector: Some(sel.to_string()),
                        },
                        Some((url, _)) => SourceSpec::Http {
                            url: url.to_string(),
                            selector: None,
                        },
                        None => SourceSpec::Http {
                            url: target,
                            selector: None,
                        },
                    }
                }
                flag if flag.starts_with("--") => bail!("unknown option '{}'", flag),
                path => SourceSpec::File {
                    path: PathBuf::from(path),
                },
            };
            specs.push(spec);
        }

        Ok(specs)
    }
}

fn parse_k8s(target: &str) -> Result<SourceSpec> {
    let (namespace, rest) = match target.split_once('/') {
        Some((ns, rest)) => (Some(ns.to_string()), rest),
        None => (None, target),
    };
    let (pod, container) = match rest.split_once(':') {
        Some((pod, c)) => (pod.to_string(), Some(c.to_string())),
        None => (rest.to_string(), None),
    };
    if let Err(e) = k8s::validate_pod_name(&pod) {
        bail!(e);
    }
    Ok(SourceSpec::K8s {
        pod,
        namespace,
        container,
    })
}

/// Trait for log sources
#[async_trait::async_trait]
pub trait LogFetcher: Send + Sync {
    /// Fetch the full current log text
    async fn fetch(&self) -> Result<String, FetchError>;

    /// Fetch the text as a downloadable artifact
    async fn export(&self) -> Result<String, FetchError> {
        self.fetch().await
    }

    /// Get the display name for this source
    fn name(&self) -> String;
}

/// Run a helper program to completion and return its stdout
pub(crate) async fn capture_stdout(
    program: &'static str,
    cmd: &mut Command,
) -> Result<String, FetchError> {
    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| FetchError::Spawn {
            program,
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(FetchError::Command {
            program,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
