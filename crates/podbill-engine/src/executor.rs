//! Compute executor
//!
//! The engine's capability to start and stop a named compute session.
//! Treated as slow, occasionally failing, and side-effecting; the engine
//! never assumes a call succeeded exactly once.

use async_trait::async_trait;
use podbill_common::{PodBillError, ResourceKind, Result};
use tokio::process::Command;
use tracing::{info, instrument};

/// Remote provisioning seam for resource sessions
#[async_trait]
pub trait ComputeExecutor: Send + Sync {
    /// Provision a container under the given session name
    async fn start(&self, session_name: &str) -> Result<()>;

    /// Tear down the container behind a handle
    async fn stop(&self, handle: &str) -> Result<()>;
}

/// Runs docker over ssh against a remote container host, one host per
/// resource kind
pub struct SshDockerExecutor {
    /// user@host ssh target
    host: String,
    kind: ResourceKind,
}

impl SshDockerExecutor {
    pub fn new(host: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            host: host.into(),
            kind,
        }
    }

    fn run_args(&self, session_name: &str) -> Vec<String> {
        let mut args = vec![
            "docker".to_string(),
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            session_name.to_string(),
        ];
        match self.kind {
            ResourceKind::Cpu => args.extend(
                ["--cpus=1.0", "--memory=512m", "python:3.11-slim"]
                    .iter()
                    .map(|s| s.to_string()),
            ),
            ResourceKind::Gpu => args.extend(
                ["--gpus", "all", "--memory=4g", "nvidia/cuda:12.1-base"]
                    .iter()
                    .map(|s| s.to_string()),
            ),
        }
        args.extend(["sleep".to_string(), "infinity".to_string()]);
        args
    }

    async fn ssh(&self, args: &[String]) -> Result<()> {
        let output = Command::new("ssh")
            .arg(&self.host)
            .args(args)
            .output()
            .await
            .map_err(|e| PodBillError::ExternalExecution(format!("ssh spawn failed: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PodBillError::ExternalExecution(format!(
                "remote docker command failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ComputeExecutor for SshDockerExecutor {
    #[instrument(skip(self))]
    async fn start(&self, session_name: &str) -> Result<()> {
        self.ssh(&self.run_args(session_name)).await?;
        info!(host = %self.host, kind = %self.kind, session_name, "Container started");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stop(&self, handle: &str) -> Result<()> {
        let args: Vec<String> = ["docker", "rm", "-f", handle]
            .iter()
            .map(|s| s.to_string())
            .collect();
        self.ssh(&args).await?;
        info!(host = %self.host, kind = %self.kind, handle, "Container removed");
        Ok(())
    }
}
