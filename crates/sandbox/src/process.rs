//! Process-backed sandbox substrate.
//!
//! Each sandbox owns a throwaway workspace directory; scripts run via the
//! configured shell with the workspace as their working directory and leave
//! artifacts in `outputs/`. Suitable for development and tests; production
//! deployments plug a container substrate in through the same traits.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, SandboxError};
use crate::substrate::{ExecOutput, Sandbox, SandboxProvider};

const SCRIPT_FILE: &str = "job.sh";
const OUTPUT_DIR: &str = "outputs";

/// Provisions [`ProcessSandbox`]es under a base directory.
pub struct ProcessSandboxProvider {
    shell: PathBuf,
    base_dir: PathBuf,
}

impl ProcessSandboxProvider {
    pub fn new() -> Self {
        Self::with_base_dir(std::env::temp_dir())
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            shell: PathBuf::from("/bin/sh"),
            base_dir: base_dir.into(),
        }
    }

    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }
}

impl Default for ProcessSandboxProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SandboxProvider for ProcessSandboxProvider {
    async fn provision(&self) -> Result<Box<dyn Sandbox>> {
        let id = format!("sbx_{}", Uuid::new_v4().simple());
        let workspace = self.base_dir.join(&id);
        tokio::fs::create_dir_all(workspace.join(OUTPUT_DIR))
            .await
            .map_err(|e| {
                SandboxError::Provision(format!(
                    "failed to create workspace {}: {}",
                    workspace.display(),
                    e
                ))
            })?;
        debug!(sandbox_id = %id, workspace = %workspace.display(), "provisioned process sandbox");
        Ok(Box::new(ProcessSandbox {
            id,
            shell: self.shell.clone(),
            workspace,
        }))
    }
}

/// A sandbox backed by a local shell process and a scratch directory.
pub struct ProcessSandbox {
    id: String,
    shell: PathBuf,
    workspace: PathBuf,
}

impl ProcessSandbox {
    pub fn workspace(&self) -> &PathBuf {
        &self.workspace
    }
}

#[async_trait]
impl Sandbox for ProcessSandbox {
    fn id(&self) -> &str {
        &self.id
    }

    async fn exec(&self, script: &str) -> Result<ExecOutput> {
        let script_path = self.workspace.join(SCRIPT_FILE);
        tokio::fs::write(&script_path, script).await?;

        let output = Command::new(&self.shell)
            .arg(&script_path)
            .current_dir(&self.workspace)
            .output()
            .await
            .map_err(|e| {
                SandboxError::Exec(format!("failed to spawn {}: {}", self.shell.display(), e))
            })?;

        let mut artifacts = BTreeMap::new();
        let output_dir = self.workspace.join(OUTPUT_DIR);
        if let Ok(mut entries) = tokio::fs::read_dir(&output_dir).await {
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_type().await?.is_file() {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    let bytes = tokio::fs::read(entry.path()).await?;
                    artifacts.insert(name, bytes);
                }
            }
        }

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
            artifacts,
        })
    }

    async fn sanitize(&self) -> Result<()> {
        let mut entries = tokio::fs::read_dir(&self.workspace)
            .await
            .map_err(|e| SandboxError::Sanitize(format!("workspace unreadable: {}", e)))?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let removed = if entry.file_type().await?.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };
            removed.map_err(|e| SandboxError::Sanitize(format!("{}: {}", path.display(), e)))?;
        }
        tokio::fs::create_dir_all(self.workspace.join(OUTPUT_DIR)).await?;
        Ok(())
    }

    async fn probe(&self) -> Result<()> {
        let status = Command::new(&self.shell)
            .arg("-c")
            .arg("true")
            .current_dir(&self.workspace)
            .status()
            .await
            .map_err(|e| SandboxError::Probe(e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(SandboxError::Probe(format!(
                "probe command exited with {}",
                status
            )))
        }
    }

    async fn destroy(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.workspace).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SandboxError::Destroy(e.to_string())),
        }
    }
}
