// ─── Process Supervisor ───
// Spawns the game, forwards its output, and tells an early crash apart from a
// normal start with a fixed probe window.

use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::core::error::{LauncherError, LauncherResult};

use super::command::CommandLine;

/// Exit code reported when the process was killed by a signal.
pub const SIGNAL_EXIT_CODE: i32 = -1;

/// How long an early exit waits for buffered output before returning.
/// Output still arriving after that (from a process that inherited the
/// pipes) keeps flowing to the sink in the background.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// Receives child output one line at a time. Runs off the reader tasks, so a
/// slow sink never stalls the child.
pub trait LogSink: Send + Sync {
    fn line(&self, stream: LogStream, line: &str);
}

/// Forwards game output to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn line(&self, stream: LogStream, line: &str) {
        match stream {
            LogStream::Stdout => info!(target: "mcl::game", "[stdout] {}", line),
            LogStream::Stderr => warn!(target: "mcl::game", "[stderr] {}", line),
        }
    }
}

/// Appends game output to a log file.
pub struct FileLogSink {
    file: Mutex<std::fs::File>,
}

impl FileLogSink {
    pub fn create(path: &Path) -> LauncherResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| LauncherError::io(path, e))?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl LogSink for FileLogSink {
    fn line(&self, stream: LogStream, line: &str) {
        let prefix = match stream {
            LogStream::Stdout => "",
            LogStream::Stderr => "[stderr] ",
        };
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{}{}", prefix, line);
        }
    }
}

/// Fan-out to several sinks.
impl LogSink for Vec<Arc<dyn LogSink>> {
    fn line(&self, stream: LogStream, line: &str) {
        for sink in self {
            sink.line(stream, line);
        }
    }
}

/// What the probe window concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// Still running at the end of the probe, or exited with code 0.
    GameStarted,
    /// Exited with a non-zero code inside the probe window.
    GameCorrupted(i32),
}

/// A launched game. Dropping it does not kill the process.
pub struct SupervisedProcess {
    pub outcome: LaunchOutcome,
    pub pid: Option<u32>,
    child: Option<Child>,
    forwarder: Option<JoinHandle<()>>,
}

impl SupervisedProcess {
    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    /// Wait for the process to exit and its output to drain.
    pub async fn wait(mut self) -> LauncherResult<Option<i32>> {
        let code = match self.child.take() {
            Some(mut child) => {
                let status = child
                    .wait()
                    .await
                    .map_err(|e| LauncherError::Other(format!("waiting for game: {}", e)))?;
                Some(status.code().unwrap_or(SIGNAL_EXIT_CODE))
            }
            None => None,
        };
        if let Some(forwarder) = self.forwarder.take() {
            let _ = forwarder.await;
        }
        Ok(code)
    }

    pub async fn kill(&mut self) -> LauncherResult<()> {
        if let Some(child) = self.child.as_mut() {
            child
                .kill()
                .await
                .map_err(|e| LauncherError::Other(format!("killing game: {}", e)))?;
        }
        self.child = None;
        Ok(())
    }
}

pub struct Supervisor {
    probe: Duration,
    sink: Arc<dyn LogSink>,
}

impl Supervisor {
    pub fn new(probe: Duration, sink: Arc<dyn LogSink>) -> Self {
        Self { probe, sink }
    }

    /// Spawn `command` in its working directory and wait at most the probe
    /// window for it to exit on its own.
    ///
    /// Only the exit code decides the outcome. A process that fails after
    /// the window closes is reported as started.
    pub async fn launch(&self, command: &CommandLine) -> LauncherResult<SupervisedProcess> {
        let mut cmd = command.to_command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| LauncherError::Launch {
            program: command.program.clone(),
            source,
        })?;
        let pid = child.id();
        info!("Spawned {:?} (pid {:?})", command.program, pid);

        let (tx, mut rx) = mpsc::unbounded_channel::<(LogStream, String)>();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(read_lines(stdout, LogStream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(read_lines(stderr, LogStream::Stderr, tx.clone()));
        }
        drop(tx);

        let sink = self.sink.clone();
        let mut forwarder = tokio::spawn(async move {
            while let Some((stream, line)) = rx.recv().await {
                sink.line(stream, &line);
            }
        });

        match tokio::time::timeout(self.probe, child.wait()).await {
            Ok(Ok(status)) => {
                let code = status.code().unwrap_or(SIGNAL_EXIT_CODE);
                let drain = self.probe.min(OUTPUT_DRAIN_TIMEOUT);
                let _ = tokio::time::timeout(drain, &mut forwarder).await;
                let outcome = if code == 0 {
                    LaunchOutcome::GameStarted
                } else {
                    LaunchOutcome::GameCorrupted(code)
                };
                info!("Game exited within the probe window with code {}", code);
                Ok(SupervisedProcess {
                    outcome,
                    pid,
                    child: None,
                    forwarder: None,
                })
            }
            Ok(Err(source)) => Err(LauncherError::Launch {
                program: command.program.clone(),
                source,
            }),
            Err(_elapsed) => {
                info!("Game still running after {:?}", self.probe);
                Ok(SupervisedProcess {
                    outcome: LaunchOutcome::GameStarted,
                    pid,
                    child: Some(child),
                    forwarder: Some(forwarder),
                })
            }
        }
    }
}

/// Drain one pipe until EOF. Lines are decoded lossily and never stop the
/// reading, so the child can always write.
async fn read_lines<R>(reader: R, stream: LogStream, tx: mpsc::UnboundedSender<(LogStream, String)>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut forwarding = true;
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if forwarding {
                    let line = String::from_utf8_lossy(trim_line_end(&buf)).into_owned();
                    forwarding = tx.send((stream, line)).is_ok();
                }
            }
            Err(e) => {
                warn!("Reading game {:?} failed: {}", stream, e);
                break;
            }
        }
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(all(test, unix))]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        lines: Mutex<Vec<(LogStream, String)>>,
    }

    impl LogSink for RecordingSink {
        fn line(&self, stream: LogStream, line: &str) {
            self.lines.lock().unwrap().push((stream, line.to_string()));
        }
    }

    fn sh(script: &str) -> CommandLine {
        CommandLine {
            program: PathBuf::from("sh"),
            args: vec!["-c".into(), script.into()],
            working_dir: std::env::temp_dir(),
            env: vec![],
        }
    }

    #[tokio::test]
    async fn nonzero_exit_inside_probe_is_corrupted() {
        let sink = Arc::new(RecordingSink::default());
        let supervisor = Supervisor::new(Duration::from_secs(10), sink.clone());

        let process = supervisor
            .launch(&sh("echo booting; echo broken >&2; sleep 1; exit 1"))
            .await
            .unwrap();

        assert_eq!(process.outcome, LaunchOutcome::GameCorrupted(1));
        assert!(!process.is_running());
        let lines = sink.lines.lock().unwrap().clone();
        assert!(lines.contains(&(LogStream::Stdout, "booting".to_string())));
        assert!(lines.contains(&(LogStream::Stderr, "broken".to_string())));
    }

    #[tokio::test]
    async fn invalid_utf8_output_is_forwarded_and_not_fatal() {
        let sink = Arc::new(RecordingSink::default());
        let supervisor = Supervisor::new(Duration::from_secs(5), sink.clone());

        let process = supervisor
            .launch(&sh(
                "printf 'caf\\351\\n'; sleep 0.5; echo after; sleep 0.5; exit 0",
            ))
            .await
            .unwrap();

        assert_eq!(process.outcome, LaunchOutcome::GameStarted);
        assert_eq!(
            *sink.lines.lock().unwrap(),
            vec![
                (LogStream::Stdout, "caf\u{FFFD}".to_string()),
                (LogStream::Stdout, "after".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn early_exit_does_not_wait_for_inherited_pipes() {
        let supervisor = Supervisor::new(Duration::from_secs(10), Arc::new(TracingLogSink));
        let started = std::time::Instant::now();

        // The background sleep keeps stdout open after the shell exits.
        let process = supervisor.launch(&sh("sleep 5 & exit 1")).await.unwrap();

        assert_eq!(process.outcome, LaunchOutcome::GameCorrupted(1));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn line_endings_are_trimmed() {
        assert_eq!(trim_line_end(b"a\r\n"), b"a");
        assert_eq!(trim_line_end(b"a\n"), b"a");
        assert_eq!(trim_line_end(b"a"), b"a");
    }

    #[tokio::test]
    async fn clean_exit_counts_as_started() {
        let supervisor = Supervisor::new(Duration::from_secs(10), Arc::new(TracingLogSink));
        let process = supervisor.launch(&sh("exit 0")).await.unwrap();
        assert_eq!(process.outcome, LaunchOutcome::GameStarted);
    }

    #[tokio::test]
    async fn still_running_after_probe_counts_as_started() {
        let supervisor = Supervisor::new(Duration::from_millis(300), Arc::new(TracingLogSink));
        let mut process = supervisor.launch(&sh("sleep 30")).await.unwrap();

        assert_eq!(process.outcome, LaunchOutcome::GameStarted);
        assert!(process.is_running());
        process.kill().await.unwrap();
        assert!(!process.is_running());
    }

    #[tokio::test]
    async fn wait_reports_exit_code_after_probe() {
        let supervisor = Supervisor::new(Duration::from_millis(100), Arc::new(TracingLogSink));
        let process = supervisor.launch(&sh("sleep 1; exit 3")).await.unwrap();

        assert_eq!(process.outcome, LaunchOutcome::GameStarted);
        assert_eq!(process.wait().await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn missing_runtime_is_a_launch_error() {
        let supervisor = Supervisor::new(Duration::from_secs(1), Arc::new(TracingLogSink));
        let command = CommandLine {
            program: PathBuf::from("/definitely/not/a/java"),
            args: vec![],
            working_dir: std::env::temp_dir(),
            env: vec![],
        };

        match supervisor.launch(&command).await {
            Err(LauncherError::Launch { program, .. }) => {
                assert_eq!(program, PathBuf::from("/definitely/not/a/java"))
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("spawn should fail"),
        }
    }

    #[test]
    fn file_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/launch.log");
        let sink = FileLogSink::create(&path).unwrap();
        sink.line(LogStream::Stdout, "hello");
        sink.line(LogStream::Stderr, "oops");
        drop(sink);

        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "hello\n[stderr] oops\n"
        );
    }
}
