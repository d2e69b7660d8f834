use tokio::process::Command;

use super::{LogFetcher, capture_stdout};
use crate::error::FetchError;

/// Validate Kubernetes pod name to prevent option injection.
pub fn validate_pod_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Pod name cannot be empty".to_string());
    }

    // Reject names starting with '-' to prevent option injection
    if name.starts_with('-') {
        return Err("Invalid pod name: cannot start with '-'".to_string());
    }

    Ok(())
}

/// Kubernetes pod log source using kubectl
pub struct K8sSource {
    /// Pod name
    pod: String,
    /// Namespace (optional, defaults to current context)
    namespace: Option<String>,
    /// Container name (optional, required for multi-container pods)
    container: Option<String>,
}

impl K8sSource {
    pub fn new(pod: String, namespace: Option<String>, container: Option<String>) -> Self {
        Self {
            pod,
            namespace,
            container,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("kubectl");
        cmd.arg("logs");

        if let Some(ns) = &self.namespace {
            cmd.arg("-n").arg(ns);
        }

        if let Some(c) = &self.container {
            cmd.arg("-c").arg(c);
        }

        // Add -- before pod name to prevent option injection
        cmd.arg("--").arg(&self.pod);
        cmd
    }
}

#[async_trait::async_trait]
impl LogFetcher for K8sSource {
    async fn fetch(&self) -> Result<String, FetchError> {
        capture_stdout("kubectl", &mut self.command()).await
    }

    fn name(&self) -> String {
        match (&self.namespace, &self.container) {
            (Some(ns), Some(c)) => format!("k8s:{}/{}/{}", ns, self.pod, c),
            (Some(ns), None) => format!("k8s:{}/{}", ns, self.pod),
            (None, Some(c)) => format!("k8s:{}/{}", self.pod, c),
            (None, None) => format!("k8s:{}", self.pod),
        }
    }
}
