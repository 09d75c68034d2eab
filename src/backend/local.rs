//! Local inference backend.
//!
//! Tries each configured runner in order: an Ollama server, a local
//! OpenAI-compatible server, or a subprocess that reads the prompt on stdin.
//! The first runner that produces non-empty output wins.

use crate::backend::errors::BackendError;
use crate::backend::models::{
    ChatCompletionRequest, ChatMessage, OllamaGenerateRequest, OllamaGenerateResponse, OllamaOptions,
};
use crate::backend::remote::classify_response;
use crate::backend::{Backend, BackendKind};
use crate::config::{LocalConfig, RunnerConfig};
use reqwest::blocking::Client;
use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const TRACE_TARGET: &str = "refactor_guard::local";
const NAME: &str = "local";
const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct LocalBackend {
    client: Client,
    model: String,
    temperature: f32,
    timeout: Duration,
    runners: Vec<RunnerConfig>,
}

impl LocalBackend {
    pub fn new(config: &LocalConfig) -> Result<Self, BackendError> {
        let timeout = config.timeout();
        Ok(Self {
            client: build_client(timeout)?,
            model: config.model.clone(),
            temperature: config.temperature,
            timeout,
            runners: config.runners.clone(),
        })
    }

    /// Override the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, BackendError> {
        self.client = build_client(timeout)?;
        self.timeout = timeout;
        Ok(self)
    }

    pub fn runners(&self) -> &[RunnerConfig] {
        &self.runners
    }

    fn run(
        &self,
        runner: &RunnerConfig,
        system: &str,
        user: &str,
        model: &str,
    ) -> Result<String, BackendError> {
        let label = runner.label();
        match runner {
            RunnerConfig::Ollama { endpoint } => {
                let request = OllamaGenerateRequest {
                    model,
                    prompt: user,
                    system,
                    stream: false,
                    options: OllamaOptions {
                        temperature: self.temperature,
                    },
                };
                let (status, body) = self.post(&label, &join(endpoint, "/api/generate"), &request)?;
                if !(200..300).contains(&status) {
                    return classify_response(&label, status, None, &body);
                }
                let parsed: OllamaGenerateResponse =
                    serde_json::from_str(&body).map_err(|err| BackendError::InvalidResponse {
                        backend: label.clone(),
                        message: err.to_string(),
                    })?;
                Ok(parsed.response)
            }
            RunnerConfig::OpenAiCompatible { endpoint } => {
                let request = ChatCompletionRequest {
                    model,
                    messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
                    temperature: Some(self.temperature),
                    max_tokens: None,
                };
                let (status, body) =
                    self.post(&label, &join(endpoint, "/v1/chat/completions"), &request)?;
                classify_response(&label, status, None, &body)
            }
            RunnerConfig::Command { program, args } => {
                let args: Vec<String> = args.iter().map(|arg| arg.replace("{model}", model)).collect();
                let input = format!("{system}\n\n{user}\n");
                run_command(&label, program, &args, input.as_bytes(), self.timeout)
            }
        }
    }

    fn post(
        &self,
        label: &str,
        url: &str,
        body: &impl serde::Serialize,
    ) -> Result<(u16, String), BackendError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .map_err(|err| self.http_error(label, err))?;
        let status = response.status().as_u16();
        let text = response.text().map_err(|err| self.http_error(label, err))?;
        Ok((status, text))
    }

    fn http_error(&self, label: &str, err: reqwest::Error) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout {
                backend: label.to_string(),
                timeout: self.timeout,
            }
        } else {
            BackendError::Connection {
                backend: label.to_string(),
                message: err.to_string(),
            }
        }
    }

    fn probe(&self, runner: &RunnerConfig) -> bool {
        match runner {
            RunnerConfig::Ollama { endpoint } => self.probe_http(&join(endpoint, "/api/tags")),
            RunnerConfig::OpenAiCompatible { endpoint } => {
                self.probe_http(&join(endpoint, "/v1/models"))
            }
            RunnerConfig::Command { program, .. } => run_command(
                &runner.label(),
                program,
                &["--version".to_string()],
                &[],
                Duration::from_secs(5),
            )
            .is_ok(),
        }
    }

    fn probe_http(&self, url: &str) -> bool {
        self.client
            .get(url)
            .timeout(Duration::from_secs(5))
            .send()
            .map(|response| response.status().is_success())
            .unwrap_or(false)
    }
}

impl Backend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn name(&self) -> &str {
        NAME
    }

    fn invoke(
        &self,
        system: &str,
        user: &str,
        model_override: Option<&str>,
    ) -> Result<String, BackendError> {
        let model = model_override.unwrap_or(&self.model);
        let mut last_error = BackendError::NotConfigured {
            backend: NAME.to_string(),
            message: "no local runners configured".to_string(),
        };

        for runner in &self.runners {
            debug!(target: TRACE_TARGET, runner = %runner.label(), model, "invoking local runner");
            match self.run(runner, system, user, model) {
                Ok(output) if !output.trim().is_empty() => return Ok(output),
                Ok(_) => {
                    last_error = BackendError::EmptyResponse {
                        backend: runner.label(),
                    };
                }
                Err(err) => {
                    debug!(target: TRACE_TARGET, runner = %runner.label(), error = %err, "local runner failed");
                    last_error = err;
                }
            }
        }
        Err(last_error)
    }

    fn test_connection(&self) -> bool {
        self.runners.iter().any(|runner| self.probe(runner))
    }
}

fn build_client(timeout: Duration) -> Result<Client, BackendError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| BackendError::NotConfigured {
            backend: NAME.to_string(),
            message: err.to_string(),
        })
}

fn join(endpoint: &str, path: &str) -> String {
    format!("{}{}", endpoint.trim_end_matches('/'), path)
}

/// Run `program`, feed it `input`, and collect stdout, killing it at `timeout`.
fn run_command(
    label: &str,
    program: &str,
    args: &[String],
    input: &[u8],
    timeout: Duration,
) -> Result<String, BackendError> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    // Own process group, so a timeout also takes down helpers the runner spawned
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    let mut child = command
        .spawn()
        .map_err(|err| BackendError::Connection {
            backend: label.to_string(),
            message: format!("failed to start `{program}`: {err}"),
        })?;

    let missing_pipe = |what: &str| BackendError::Process {
        backend: label.to_string(),
        message: format!("failed to capture {what}"),
    };
    let mut stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
    let mut stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
    let mut stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

    // Pipes are serviced on their own threads so a chatty child cannot
    // block on a full buffer while we wait for it.
    let input = input.to_vec();
    let writer = thread::spawn(move || {
        // A child that exits without reading closes the pipe; that is fine.
        let _ = stdin.write_all(&input);
    });
    let reader = thread::spawn(move || {
        let mut buf = Vec::new();
        stdout.read_to_end(&mut buf).map(|_| buf)
    });
    let err_reader = thread::spawn(move || {
        let mut buf = String::new();
        let _ = stderr.read_to_string(&mut buf);
        buf
    });

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if start.elapsed() > timeout => {
                warn!(
                    target: TRACE_TARGET,
                    runner = label,
                    timeout_ms = timeout.as_millis() as u64,
                    "local runner timed out, killing process"
                );
                kill_process_tree(&mut child);
                let _ = child.wait();
                // Not joined: a descendant that left the group can still hold
                // the pipes open, and the deadline must hold regardless.
                drop((writer, reader, err_reader));
                return Err(BackendError::Timeout {
                    backend: label.to_string(),
                    timeout,
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(err) => {
                return Err(BackendError::Process {
                    backend: label.to_string(),
                    message: err.to_string(),
                })
            }
        }
    };

    let _ = writer.join();
    let output = reader
        .join()
        .map_err(|_| missing_pipe("stdout"))?
        .map_err(|err| BackendError::Process {
            backend: label.to_string(),
            message: err.to_string(),
        })?;
    let stderr_text = err_reader.join().unwrap_or_default();

    if !status.success() {
        let detail: String = stderr_text.trim().chars().take(200).collect();
        return Err(BackendError::Process {
            backend: label.to_string(),
            message: format!("exited with {status}: {detail}"),
        });
    }

    Ok(String::from_utf8_lossy(&output).into_owned())
}

#[cfg(unix)]
fn kill_process_tree(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let group = Pid::from_raw(child.id() as i32);
    if let Err(err) = killpg(group, Signal::SIGKILL) {
        debug!(target: TRACE_TARGET, error = %err, "killpg failed, killing child only");
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_process_tree(child: &mut Child) {
    let _ = child.kill();
}
