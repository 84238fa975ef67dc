//! Helm chart rendering for fix verification.
//!
//! The verifier treats rendering as an external process. Every outcome,
//! including a missing binary or a hung template, comes back as a
//! [`RenderResult`] rather than an `Err`.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

/// Default release name passed to `helm template`.
pub const DEFAULT_RELEASE_NAME: &str = "chart-optimizer";

/// Default render timeout.
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// How long output pipes may stay open once the render has ended.
const PIPE_GRACE: Duration = Duration::from_millis(200);

/// Classification of a failed render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderErrorKind {
    /// The helm binary could not be started
    HelmMissing,
    /// The values document could not be written to a temp file
    ValuesWriteFailed,
    /// The render exceeded its timeout and was killed
    Timeout,
    /// helm exited non-zero
    RenderFailed,
    /// helm output was not valid YAML
    ParseFailed,
}

impl RenderErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HelmMissing => "helm_missing",
            Self::ValuesWriteFailed => "values_write_failed",
            Self::Timeout => "timeout",
            Self::RenderFailed => "render_failed",
            Self::ParseFailed => "parse_failed",
        }
    }
}

impl fmt::Display for RenderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured render failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderError {
    pub kind: RenderErrorKind,
    pub message: String,
}

/// Outcome of one render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderResult {
    /// Parsed manifests; empty documents are dropped
    pub documents: Vec<Value>,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<RenderError>,
}

impl RenderResult {
    /// A successful render.
    pub fn ok(documents: Vec<Value>) -> Self {
        Self {
            documents,
            ..Default::default()
        }
    }

    /// A failed render.
    pub fn failed(kind: RenderErrorKind, message: impl Into<String>) -> Self {
        Self {
            error: Some(RenderError {
                kind,
                message: message.into(),
            }),
            ..Default::default()
        }
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Renders a chart directory with a values document.
pub trait ChartRenderer: Send + Sync {
    fn render(&self, chart_dir: &Path, values: &Value) -> RenderResult;
}

/// Renders charts with `helm template`.
#[derive(Debug, Clone)]
pub struct HelmRenderer {
    binary: PathBuf,
    release_name: String,
    timeout: Duration,
}

impl Default for HelmRenderer {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("helm"),
            release_name: DEFAULT_RELEASE_NAME.to_string(),
            timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }
}

impl HelmRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_release_name(mut self, release_name: impl Into<String>) -> Self {
        self.release_name = release_name.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check if the configured helm binary can be started.
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("version")
            .arg("--short")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn write_values(values: &Value) -> std::io::Result<tempfile::NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix("chart-optimizer-values-")
            .suffix(".yaml")
            .tempfile()?;
        let text = serde_yaml::to_string(values)
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
        file.write_all(text.as_bytes())?;
        file.flush()?;
        Ok(file)
    }
}

impl ChartRenderer for HelmRenderer {
    fn render(&self, chart_dir: &Path, values: &Value) -> RenderResult {
        let values_file = match Self::write_values(values) {
            Ok(file) => file,
            Err(e) => {
                return RenderResult::failed(
                    RenderErrorKind::ValuesWriteFailed,
                    format!("could not write values file: {}", e),
                );
            }
        };

        let mut cmd = Command::new(&self.binary);
        cmd.arg("template")
            .arg(&self.release_name)
            .arg(chart_dir)
            .arg("-f")
            .arg(values_file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        log::debug!("Rendering {} with {}", chart_dir.display(), self.binary.display());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return RenderResult::failed(
                    RenderErrorKind::HelmMissing,
                    format!("{} not found in PATH", self.binary.display()),
                );
            }
            Err(e) => {
                return RenderResult::failed(
                    RenderErrorKind::HelmMissing,
                    format!("could not start {}: {}", self.binary.display(), e),
                );
            }
        };

        // Drain both pipes on their own threads so a chatty render cannot block
        let stdout_reader = child.stdout.take().map(spawn_reader);
        let stderr_reader = child.stderr.take().map(spawn_reader);

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Some(status),
                Ok(None) if started.elapsed() >= self.timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    break None;
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    log::warn!("Failed to wait for helm: {}", e);
                    let _ = child.kill();
                    let _ = child.wait();
                    break None;
                }
            }
        };

        // Subprocesses of helm may inherit the pipes; never wait on them past the deadline
        let grace_deadline = Instant::now() + PIPE_GRACE;
        let deadline = started
            .checked_add(self.timeout)
            .map_or(grace_deadline, |d| d.max(grace_deadline));
        let stdout = collect_pipe(stdout_reader, deadline);
        let stderr = collect_pipe(stderr_reader, deadline).lossy();

        let Some(status) = status else {
            return RenderResult {
                stdout: stdout.lossy(),
                stderr,
                ..RenderResult::failed(
                    RenderErrorKind::Timeout,
                    format!("helm template timed out after {:?}", self.timeout),
                )
            };
        };

        if !status.success() {
            let message = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("helm template failed")
                .trim()
                .to_string();
            return RenderResult {
                stdout: stdout.lossy(),
                stderr,
                ..RenderResult::failed(RenderErrorKind::RenderFailed, message)
            };
        }

        let stdout = match stdout {
            PipeRead::Done(bytes) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(e) => {
                    let stdout = String::from_utf8_lossy(e.as_bytes()).into_owned();
                    return RenderResult {
                        stdout,
                        stderr,
                        ..RenderResult::failed(
                            RenderErrorKind::ParseFailed,
                            format!("helm output is not valid UTF-8: {}", e.utf8_error()),
                        )
                    };
                }
            },
            PipeRead::Failed(e) => {
                return RenderResult {
                    stderr,
                    ..RenderResult::failed(
                        RenderErrorKind::ParseFailed,
                        format!("could not read helm output: {}", e),
                    )
                };
            }
            PipeRead::Open => {
                return RenderResult {
                    stderr,
                    ..RenderResult::failed(
                        RenderErrorKind::Timeout,
                        "helm output stayed open after the process exited",
                    )
                };
            }
        };

        match parse_documents(&stdout) {
            Ok(documents) => RenderResult {
                documents,
                stdout,
                stderr,
                error: None,
            },
            Err(e) => RenderResult {
                stdout,
                stderr,
                ..RenderResult::failed(RenderErrorKind::ParseFailed, e.to_string())
            },
        }
    }
}

/// Outcome of draining one output pipe.
enum PipeRead {
    Done(Vec<u8>),
    Failed(std::io::Error),
    /// Still open at the deadline
    Open,
}

impl PipeRead {
    fn lossy(&self) -> String {
        match self {
            Self::Done(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            Self::Failed(_) | Self::Open => String::new(),
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> Receiver<std::io::Result<Vec<u8>>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let result = pipe.read_to_end(&mut buf).map(|_| buf);
        let _ = tx.send(result);
    });
    rx
}

fn collect_pipe(reader: Option<Receiver<std::io::Result<Vec<u8>>>>, deadline: Instant) -> PipeRead {
    let Some(reader) = reader else {
        return PipeRead::Done(Vec::new());
    };
    match reader.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(Ok(bytes)) => PipeRead::Done(bytes),
        Ok(Err(e)) => PipeRead::Failed(e),
        Err(_) => PipeRead::Open,
    }
}

/// Parse a multi-document YAML stream, skipping empty documents.
pub fn parse_documents(text: &str) -> Result<Vec<Value>, serde_yaml::Error> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = Value::deserialize(document)?;
        if !value.is_null() {
            documents.push(value);
        }
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Mapping;

    #[test]
    fn test_parse_multi_document_stream() {
        let text = "---\n# Source: app/templates/sa.yaml\n---\nkind: ServiceAccount\n---\nkind: Deployment\nmetadata:\n  name: app\n";
        let docs = parse_documents(text).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1]["kind"].as_str(), Some("Deployment"));
    }

    #[test]
    fn test_parse_rejects_invalid_yaml() {
        assert!(parse_documents("kind: [unclosed\n").is_err());
    }

    #[test]
    fn test_missing_binary_is_classified() {
        let renderer = HelmRenderer::new().with_binary("/nonexistent/helm-binary-for-tests");
        let dir = tempfile::tempdir().unwrap();
        let result = renderer.render(dir.path(), &Value::Mapping(Mapping::new()));
        assert!(!result.is_ok());
        assert_eq!(result.error.unwrap().kind, RenderErrorKind::HelmMissing);
    }

    #[cfg(unix)]
    fn fake_helm(dir: &Path, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-helm");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_bounds_render_with_lingering_subprocess() {
        let dir = tempfile::tempdir().unwrap();
        let helm = fake_helm(dir.path(), "#!/bin/sh\nsleep 5\necho done\n");
        let renderer = HelmRenderer::new()
            .with_binary(helm)
            .with_timeout(Duration::from_millis(300));

        let started = Instant::now();
        let result = renderer.render(dir.path(), &Value::Mapping(Mapping::new()));

        assert_eq!(result.error.unwrap().kind, RenderErrorKind::Timeout);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_output_is_parse_failure() {
        let dir = tempfile::tempdir().unwrap();
        let helm = fake_helm(dir.path(), "#!/bin/sh\nprintf 'kind: \\377\\376\\n'\n");
        let result = HelmRenderer::new()
            .with_binary(helm)
            .render(dir.path(), &Value::Mapping(Mapping::new()));

        assert!(result.documents.is_empty());
        let error = result.error.unwrap();
        assert_eq!(error.kind, RenderErrorKind::ParseFailed);
        assert!(error.message.contains("UTF-8"));
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_render_parses_documents() {
        let dir = tempfile::tempdir().unwrap();
        let helm = fake_helm(dir.path(), "#!/bin/sh\nprintf -- '---\\nkind: Deployment\\n'\n");
        let result = HelmRenderer::new()
            .with_binary(helm)
            .render(dir.path(), &Value::Mapping(Mapping::new()));

        assert!(result.is_ok());
        assert_eq!(result.documents.len(), 1);
    }

    #[test]
    fn test_error_kind_names() {
        assert_eq!(RenderErrorKind::ValuesWriteFailed.to_string(), "values_write_failed");
        let json = serde_json::to_string(&RenderErrorKind::HelmMissing).unwrap();
        assert_eq!(json, "\"helm_missing\"");
    }
}
