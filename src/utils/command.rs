/// External CLI execution (gcloud, kubectl, helm)
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Captured result of a finished command
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl CommandOutput {
    fn from_output(output: std::process::Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
        }
    }

    /// Stdout on success, stderr as the error otherwise
    pub fn into_result(self) -> Result<String> {
        if self.success {
            Ok(self.stdout)
        } else {
            anyhow::bail!("{}", self.stderr.trim())
        }
    }
}

/// Builder for one external command invocation
pub struct CommandBuilder {
    command: Command,
    context_msg: Option<String>,
}

impl CommandBuilder {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        let mut command = Command::new(program);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        Self {
            command,
            context_msg: None,
        }
    }

    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.command.arg(arg);
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.command.args(args);
        self
    }

    pub fn env<K, V>(mut self, key: K, val: V) -> Self
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.command.env(key, val);
        self
    }

    /// Point kubectl, helm and gcloud credential writes at a private kubeconfig
    pub fn kubeconfig(self, path: &Path) -> Self {
        self.env("KUBECONFIG", path)
    }

    /// Message attached to spawn failures
    pub fn context<S: Into<String>>(mut self, msg: S) -> Self {
        self.context_msg = Some(msg.into());
        self
    }

    /// Shell-like rendering of the command, for logs and dry-run plans
    pub fn command_line(&self) -> String {
        let std_command = self.command.as_std();
        std::iter::once(std_command.get_program())
            .chain(std_command.get_args())
            .map(|part| shell_quote(&part.to_string_lossy()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub async fn output(mut self) -> Result<CommandOutput> {
        debug!("exec: {}", self.command_line());
        let output = match self.context_msg.take() {
            Some(ctx) => self.command.output().await.context(ctx)?,
            None => self.command.output().await?,
        };
        Ok(CommandOutput::from_output(output))
    }

    /// Stdout on success, stderr as error on failure
    pub async fn run(self) -> Result<String> {
        self.output().await?.into_result()
    }

    pub async fn run_silent(self) -> Result<()> {
        self.output().await?.into_result().map(|_| ())
    }

    /// Run and parse stdout as JSON
    pub async fn run_json<T: DeserializeOwned>(self) -> Result<T> {
        let stdout = self.run().await?;
        serde_json::from_str(&stdout).context("Failed to parse command JSON output")
    }
}

fn shell_quote(part: &str) -> String {
    let plain = !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,@+%".contains(c));
    if plain {
        part.to_string()
    } else {
        format!("'{}'", part.replace('\'', r"'\''"))
    }
}

/// Fail with an install hint when a required CLI is missing
pub async fn check_tool_installed(
    tool_name: &str,
    version_args: &[&str],
    install_url: &str,
) -> Result<()> {
    let output = CommandBuilder::new(tool_name)
        .args(version_args)
        .output()
        .await;

    match output {
        Ok(out) if out.success => Ok(()),
        _ => anyhow::bail!(
            "{} is not installed or not in PATH. Please install from {}",
            tool_name,
            install_url
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_quoting() {
        let line = CommandBuilder::new("gcloud")
            .args(["container", "node-pools", "create", "pool-mig-enabled"])
            .arg("--min-cpu-platform=Intel Cascade Lake")
            .arg("--node-labels=mig.config=mixed")
            .command_line();

        assert_eq!(
            line,
            "gcloud container node-pools create pool-mig-enabled '--min-cpu-platform=Intel Cascade Lake' --node-labels=mig.config=mixed"
        );
    }

    #[tokio::test]
    async fn test_run_with_env() {
        let stdout = CommandBuilder::new("sh")
            .arg("-c")
            .arg("echo $MIGPOOL_TEST_VAR")
            .env("MIGPOOL_TEST_VAR", "a100")
            .context("Testing sh")
            .run()
            .await
            .unwrap();

        assert_eq!(stdout.trim(), "a100");
    }

    #[tokio::test]
    async fn test_run_failure_carries_stderr() {
        let err = CommandBuilder::new("sh")
            .args(["-c", "echo permission denied >&2; exit 1"])
            .run()
            .await
            .unwrap_err();

        assert!(err.to_string().contains("permission denied"));
    }

    #[tokio::test]
    async fn test_run_json() {
        let pools: Vec<serde_json::Value> = CommandBuilder::new("sh")
            .args(["-c", r#"printf '[{"name":"gpu"}]'"#])
            .run_json()
            .await
            .unwrap();

        assert_eq!(pools[0]["name"], "gpu");
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let err = check_tool_installed("migpool-no-such-tool", &["--version"], "https://example.com")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not installed"));
    }
}
