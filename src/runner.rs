use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command as TokioCommand;
use tokio::time::{Duration, timeout};
use tracing::debug;

/// Executes one fully formed command line against the target cluster.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run_command(
        &self,
        credentials: Option<&Path>,
        default_namespace: &str,
        command_line: &str,
    ) -> Result<String>;
}

/// Runs a CLI binary as a child process.
#[derive(Debug, Clone)]
pub struct BinaryRunner {
    program: String,
    timeout: Duration,
}

impl BinaryRunner {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Arguments passed to the binary; `-n <default>` goes first when the command line
    /// doesn't pick a namespace itself, so trailing `-- args` stay intact.
    pub fn build_args(&self, default_namespace: &str, command_line: &str) -> Result<Vec<String>> {
        let args = split_command_line(command_line)?;
        if is_namespace_flag_set(&args) || default_namespace.is_empty() {
            return Ok(args);
        }

        let mut prefixed = vec!["-n".to_string(), default_namespace.to_string()];
        prefixed.extend(args);
        Ok(prefixed)
    }
}

#[async_trait]
impl CommandRunner for BinaryRunner {
    async fn run_command(
        &self,
        credentials: Option<&Path>,
        default_namespace: &str,
        command_line: &str,
    ) -> Result<String> {
        let args = self.build_args(default_namespace, command_line)?;
        debug!(program = %self.program, ?args, "running command");

        let mut cmd = TokioCommand::new(&self.program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = credentials {
            cmd.env("KUBECONFIG", path);
        }

        let output = timeout(self.timeout, cmd.output())
            .await
            .with_context(|| {
                format!(
                    "{} timed out after {}s",
                    self.program,
                    self.timeout.as_secs()
                )
            })?
            .with_context(|| format!("failed to execute {}", self.program))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            bail!(
                "{}{}\n{} exited with {}",
                stdout.trim_end(),
                stderr.trim_end(),
                self.program,
                output.status
            );
        }

        Ok(strip_ansi_codes(&stdout))
    }
}

/// True when the arguments select a namespace (`-n`, `--namespace`) or all of them
/// (`-A`, `--all-namespaces`). Unknown flags are ignored; parsing stops at `--`.
pub fn is_namespace_flag_set(args: &[String]) -> bool {
    let mut iter = args.iter().map(String::as_str).peekable();
    while let Some(arg) = iter.next() {
        match arg {
            "--" => return false,
            "-A" | "--all-namespaces" | "--all-namespaces=true" => return true,
            "-n" | "--namespace" => {
                if iter.peek().is_some_and(|value| !value.is_empty()) {
                    return true;
                }
            }
            _ if arg.starts_with("--namespace=") => {
                if arg.len() > "--namespace=".len() {
                    return true;
                }
            }
            // `-nfoo` and `-n=foo`
            _ if arg.starts_with("-n") && !arg.starts_with("--") && arg.len() > 2 => {
                if arg.trim_start_matches("-n").trim_start_matches('=').is_empty() {
                    continue;
                }
                return true;
            }
            _ => {}
        }
    }
    false
}

/// Splits a command line into arguments with POSIX shell quoting rules.
pub fn split_command_line(command_line: &str) -> Result<Vec<String>> {
    shlex::split(command_line)
        .with_context(|| format!("unbalanced quoting in command line {command_line:?}"))
}

fn strip_ansi_codes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' && chars.peek() == Some(&'[') {
            chars.next();
            // CSI sequences end with a byte in 0x40..=0x7e
            for next in chars.by_ref() {
                if ('@'..='~').contains(&next) {
                    break;
                }
            }
            continue;
        }
        out.push(ch);
    }
    out
}
