use std::collections::VecDeque;
use std::process::Stdio;

use agentflow_core::config::ProviderCommand;
use agentflow_core::provider::{Provider, ProviderExit, ProviderKind, ProviderSession, ProviderStartArgs};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;

/// Lines of stderr kept for the exit report.
const STDERR_TAIL_LINES: usize = 40;

/// Launches an agent CLI as a child process; the prompt is the final argument.
pub struct CodeCliProvider {
    kind: ProviderKind,
    command: ProviderCommand,
}

impl CodeCliProvider {
    pub fn new(kind: ProviderKind, command: ProviderCommand) -> Self {
        Self { kind, command }
    }
}

#[async_trait]
impl Provider for CodeCliProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn spawn(&self, args: &ProviderStartArgs) -> Result<Box<dyn ProviderSession>> {
        let mut child = Command::new(&self.command.command)
            .args(&self.command.args)
            .arg(&args.prompt)
            .current_dir(&args.workdir)
            .envs(&self.command.envs)
            .envs(&args.envs)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawn {} ({})", self.command.command, self.kind))?;

        let stdout = child.stdout.take().map(|s| BufReader::new(s).lines());
        let stderr = child.stderr.take().map(|s| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(s).lines();
                let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
                while let Ok(Some(line)) = lines.next_line().await {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                tail.into_iter().collect::<Vec<_>>().join("\n")
            })
        });

        Ok(Box::new(CodeCliSession {
            stdin: child.stdin.take(),
            stdout,
            stderr,
            child,
        }))
    }
}

struct CodeCliSession {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<Lines<BufReader<ChildStdout>>>,
    stderr: Option<JoinHandle<String>>,
}

#[async_trait]
impl ProviderSession for CodeCliSession {
    async fn send_input(&mut self, input: &str) -> Result<()> {
        let stdin = self.stdin.as_mut().context("stdin is closed")?;
        stdin.write_all(input.as_bytes()).await?;
        if !input.ends_with('\n') {
            stdin.write_all(b"\n").await?;
        }
        stdin.flush().await?;
        Ok(())
    }

    async fn read_output(&mut self) -> Result<Option<String>> {
        let Some(lines) = self.stdout.as_mut() else {
            return Ok(None);
        };
        let line = lines.next_line().await?;
        if line.is_none() {
            self.stdout = None;
        }
        Ok(line)
    }

    async fn wait(&mut self) -> Result<ProviderExit> {
        self.stdin = None;
        let status = self.child.wait().await?;
        let stderr_tail = match self.stderr.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };
        Ok(ProviderExit {
            exit_code: status.code().unwrap_or(-1),
            stderr_tail,
        })
    }

    async fn kill(&mut self) -> Result<()> {
        self.stdin = None;
        self.child.kill().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sh(script: &str) -> CodeCliProvider {
        CodeCliProvider::new(
            ProviderKind::Codex,
            ProviderCommand {
                command: "sh".to_string(),
                args: vec!["-c".to_string(), script.to_string(), "agent".to_string()],
                envs: HashMap::new(),
            },
        )
    }

    fn start_args(prompt: &str) -> ProviderStartArgs {
        ProviderStartArgs {
            workdir: std::env::temp_dir(),
            prompt: prompt.to_string(),
            envs: HashMap::from([("STEP".to_string(), "s1".to_string())]),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_streams_stdout_and_reports_exit() {
        let provider = sh(r#"echo "prompt: $1"; echo "step: $STEP"; echo warn >&2; exit 3"#);
        let mut session = provider.spawn(&start_args("fix it")).await.unwrap();

        let mut lines = Vec::new();
        while let Some(line) = session.read_output().await.unwrap() {
            lines.push(line);
        }
        let exit = session.wait().await.unwrap();

        assert_eq!(lines, vec!["prompt: fix it", "step: s1"]);
        assert_eq!(exit.exit_code, 3);
        assert_eq!(exit.stderr_tail, "warn");
        assert!(!exit.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_send_input_and_kill() {
        let provider = sh("read answer; echo \"got $answer\"; exec sleep 30");
        let mut session = provider.spawn(&start_args("")).await.unwrap();

        session.send_input("yes").await.unwrap();
        assert_eq!(session.read_output().await.unwrap().as_deref(), Some("got yes"));

        session.kill().await.unwrap();
        let exit = session.wait().await.unwrap();
        assert!(!exit.success());
    }

    #[tokio::test]
    async fn test_missing_command_fails_to_spawn() {
        let provider = CodeCliProvider::new(
            ProviderKind::Gemini,
            ProviderCommand {
                command: "agentflow-definitely-missing-binary".to_string(),
                args: Vec::new(),
                envs: HashMap::new(),
            },
        );
        assert!(provider.spawn(&start_args("x")).await.is_err());
    }
}
