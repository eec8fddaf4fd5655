//! Stdio transport: one child process, newline-delimited JSON over its pipes.
//!
//! The transport knows nothing about request correlation. It writes whole
//! lines, reads whole lines, peeks at the error stream for diagnostics, and
//! owns the shutdown sequence that guarantees the child is reaped.

use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

use crate::client::LaunchSpec;
use crate::error::{McpError, Result};

/// Bounds used by [`StdioTransport::shutdown`].
#[derive(Debug, Clone, Copy)]
pub struct ShutdownPolicy {
    /// How long to wait for exit after closing the child's input.
    pub stdin_close_grace: Duration,
    /// How long to wait for exit after the termination signal.
    pub terminate_grace: Duration,
}

impl Default for ShutdownPolicy {
    fn default() -> Self {
        Self {
            stdin_close_grace: Duration::from_millis(100),
            terminate_grace: Duration::from_secs(3),
        }
    }
}

/// How the child process ended during shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The process had already exited before shutdown began.
    AlreadyExited,
    /// The process exited after its input was closed.
    InputClosed,
    /// The process exited after the graceful termination signal.
    Terminated,
    /// The process had to be killed.
    Killed,
    /// Killing failed; the process could not be confirmed reaped.
    KillFailed,
}

impl Termination {
    /// Whether the process is confirmed gone.
    pub fn is_reaped(self) -> bool {
        !matches!(self, Self::KillFailed)
    }
}

/// A spawned MCP server speaking line-delimited JSON-RPC over stdio.
pub struct StdioTransport {
    /// The child process.
    child: Child,
    /// OS process id, captured at spawn.
    pid: Option<u32>,
    /// Buffered writer to stdin. `None` once input has been closed.
    stdin: Option<BufWriter<ChildStdin>>,
    /// Buffered reader from stdout.
    stdout: BufReader<ChildStdout>,
    /// Buffered reader from stderr, used only for diagnostics.
    stderr: Option<BufReader<ChildStderr>>,
    /// Partial stdout line carried across cancelled reads.
    line_buf: Vec<u8>,
    /// Partial stderr line carried across cancelled reads.
    stderr_buf: Vec<u8>,
}

impl StdioTransport {
    /// Spawn the server described by `spec` with all three streams piped.
    pub fn spawn(spec: &LaunchSpec) -> Result<Self> {
        let mut cmd = Command::new(&spec.command);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group, so signals reach launcher wrappers' children too.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| {
            McpError::spawn_failed(format!("failed to spawn '{}': {}", spec.command, e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::spawn_failed("failed to capture stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::spawn_failed("failed to capture stdout"))?;
        let stderr = child.stderr.take();
        let pid = child.id();

        tracing::debug!(pid, command = %spec.display_command(), "spawned MCP server process");

        Ok(Self {
            child,
            pid,
            stdin: Some(BufWriter::new(stdin)),
            stdout: BufReader::new(stdout),
            stderr: stderr.map(BufReader::new),
            line_buf: Vec::new(),
            stderr_buf: Vec::new(),
        })
    }

    /// Process id of the child, if it was known at spawn.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Write one envelope as a single newline-terminated line and flush.
    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<()> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');

        let stdin = self.stdin.as_mut().ok_or(McpError::NotConnected)?;
        let written = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.flush().await
        }
        .await;

        match written {
            Ok(()) => {
                tracing::trace!(json = %line.trim_end(), "sent MCP message");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                Err(McpError::PeerExited(self.exit_code()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Whether the child's input is still open for writing.
    pub fn input_open(&self) -> bool {
        self.stdin.is_some()
    }

    /// Drop the child's input without flushing.
    ///
    /// Used after a write was cut short: the pipe may hold a partial line, so
    /// nothing else can be framed on it.
    pub fn abandon_input(&mut self) {
        if self.stdin.take().is_some() {
            tracing::debug!(pid = self.pid, "abandoned server stdin after interrupted write");
        }
    }

    /// Read one line from the child's output.
    ///
    /// Returns `Ok(None)` at end of stream. The trailing newline is removed.
    /// Partial data survives cancellation (e.g. by a timeout) and is completed
    /// by the next call.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        let n = self.stdout.read_until(b'\n', &mut self.line_buf).await?;
        if n == 0 && self.line_buf.is_empty() {
            return Ok(None);
        }

        let bytes = std::mem::take(&mut self.line_buf);
        let line = String::from_utf8(bytes)
            .map_err(|e| McpError::MalformedResponse(format!("invalid UTF-8: {e}")))?;
        let line = line.trim_end_matches(['\n', '\r']).to_string();

        tracing::trace!(json = %line, "received MCP message");
        Ok(Some(line))
    }

    /// Best-effort read of one line from the child's error stream.
    ///
    /// Never waits longer than `bound`; returns `None` when nothing arrived.
    pub async fn probe_stderr(&mut self, bound: Duration) -> Option<String> {
        let stderr = self.stderr.as_mut()?;
        match tokio::time::timeout(bound, stderr.read_until(b'\n', &mut self.stderr_buf)).await {
            Ok(Ok(n)) if n > 0 || !self.stderr_buf.is_empty() => {
                let bytes = std::mem::take(&mut self.stderr_buf);
                let line = String::from_utf8_lossy(&bytes).trim_end().to_string();
                (!line.is_empty()).then_some(line)
            }
            Ok(Ok(_)) => {
                // Stream closed; stop probing it.
                self.stderr = None;
                None
            }
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "failed reading server stderr");
                None
            }
            Err(_) => None,
        }
    }

    /// Exit code if the process has already exited.
    pub fn exit_code(&mut self) -> Option<i32> {
        match self.child.try_wait() {
            Ok(Some(status)) => status.code(),
            _ => None,
        }
    }

    /// Check if the child is still running.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Send a kill without waiting. Used from `Drop`, where awaiting is
    /// impossible; the runtime reaps the child afterwards.
    pub fn start_kill(&mut self) {
        if !self.is_running() {
            return;
        }
        #[cfg(unix)]
        self.signal_group(nix::sys::signal::Signal::SIGKILL);
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(pid = self.pid, error = %e, "start_kill failed");
        }
    }

    /// Tear the process down and release every pipe.
    ///
    /// 1. Close stdin and wait up to `stdin_close_grace` for a voluntary exit.
    /// 2. Send the termination signal and wait up to `terminate_grace`.
    /// 3. Kill and wait without a bound.
    ///
    /// Each step is guarded on its own; failures are logged, never returned.
    pub async fn shutdown(mut self, policy: ShutdownPolicy) -> Termination {
        let pid = self.pid;

        if !self.is_running() {
            tracing::debug!(pid, "server process already exited");
            // Launcher wrappers can die and leave their children running.
            #[cfg(unix)]
            self.signal_group(nix::sys::signal::Signal::SIGKILL);
            return Termination::AlreadyExited;
        }

        // Step 1: close input. The flush is bounded; a peer that stopped
        // reading would otherwise hold it forever.
        if let Some(mut stdin) = self.stdin.take() {
            match tokio::time::timeout(policy.stdin_close_grace, stdin.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!(pid, error = %e, "error closing server stdin"),
                Err(_) => tracing::debug!(pid, "timed out flushing server stdin"),
            }
            drop(stdin);
            match tokio::time::timeout(policy.stdin_close_grace, self.child.wait()).await {
                Ok(Ok(status)) => {
                    tracing::info!(pid, code = ?status.code(), "server exited after stdin close");
                    return Termination::InputClosed;
                }
                Ok(Err(e)) => tracing::warn!(pid, error = %e, "wait failed after stdin close"),
                Err(_) => tracing::debug!(pid, "server did not exit after stdin close"),
            }
        }

        // Step 2: graceful termination signal.
        #[cfg(unix)]
        {
            self.signal_group(nix::sys::signal::Signal::SIGTERM);
            match tokio::time::timeout(policy.terminate_grace, self.child.wait()).await {
                Ok(Ok(status)) => {
                    tracing::info!(pid, code = ?status.code(), "process terminated gracefully");
                    return Termination::Terminated;
                }
                Ok(Err(e)) => tracing::warn!(pid, error = %e, "wait failed after SIGTERM"),
                Err(_) => tracing::warn!(
                    pid,
                    grace_ms = policy.terminate_grace.as_millis() as u64,
                    "process didn't terminate gracefully, forcing kill"
                ),
            }
        }

        // Step 3: forced kill, then an unbounded wait.
        #[cfg(unix)]
        self.signal_group(nix::sys::signal::Signal::SIGKILL);
        if self.is_running() {
            if let Err(e) = self.child.start_kill() {
                tracing::warn!(pid, error = %e, "kill failed");
            }
        }
        match self.child.wait().await {
            Ok(status) => {
                tracing::info!(pid, code = ?status.code(), "process killed forcefully");
                Termination::Killed
            }
            Err(e) => {
                tracing::error!(pid, error = %e, "failed to reap killed process");
                Termination::KillFailed
            }
        }
    }

    #[cfg(unix)]
    fn signal_group(&self, signal: nix::sys::signal::Signal) {
        use nix::sys::signal::killpg;
        use nix::unistd::Pid;

        let Some(pid) = self.pid else { return };
        let Ok(raw) = i32::try_from(pid) else { return };
        if let Err(e) = killpg(Pid::from_raw(raw), signal) {
            tracing::debug!(pid, ?signal, error = %e, "failed to signal process group");
        }
    }
}

impl std::fmt::Debug for StdioTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioTransport")
            .field("pid", &self.pid)
            .field("stdin_open", &self.stdin.is_some())
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh(script: &str) -> LaunchSpec {
        LaunchSpec::new("sh").with_arg("-c").with_arg(script)
    }

    /// Alive means signalable and not a zombie awaiting its reaper.
    fn process_alive(pid: u32) -> bool {
        if let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            return !stat
                .rsplit_once(") ")
                .is_some_and(|(_, rest)| rest.starts_with('Z'));
        }
        nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
    }

    async fn wait_until_gone(pid: u32, bound: Duration) -> bool {
        let start = Instant::now();
        while start.elapsed() < bound {
            if !process_alive(pid) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        !process_alive(pid)
    }

    #[tokio::test]
    async fn test_spawn_nonexistent_command() {
        let result = StdioTransport::spawn(&LaunchSpec::new("nonexistent-mcp-server-12345"));
        match result {
            Ok(_) => panic!("Expected spawn to fail"),
            Err(err) => assert!(matches!(err, McpError::SpawnFailed(_))),
        }
    }

    #[tokio::test]
    async fn test_cat_echoes_lines() {
        let mut transport = StdioTransport::spawn(&LaunchSpec::new("cat")).unwrap();
        transport
            .send(&crate::protocol::JsonRpcRequest::new(1, "ping", None))
            .await
            .unwrap();

        let line = transport.read_line().await.unwrap().unwrap();
        assert_eq!(line, r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#);

        let policy = ShutdownPolicy {
            stdin_close_grace: Duration::from_secs(2),
            ..Default::default()
        };
        assert_eq!(transport.shutdown(policy).await, Termination::InputClosed);
    }

    #[tokio::test]
    async fn test_read_line_reports_eof() {
        let mut transport = StdioTransport::spawn(&sh("exit 0")).unwrap();
        assert_eq!(transport.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_partial_line_survives_timeout() {
        let mut transport =
            StdioTransport::spawn(&sh("printf 'hel'; sleep 0.3; printf 'lo\\n'; sleep 5")).unwrap();

        let first = tokio::time::timeout(Duration::from_millis(100), transport.read_line()).await;
        assert!(first.is_err(), "read should time out mid-line");

        let line = tokio::time::timeout(Duration::from_secs(5), transport.read_line())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(line.as_deref(), Some("hello"));

        transport.shutdown(ShutdownPolicy::default()).await;
    }

    #[tokio::test]
    async fn test_probe_stderr() {
        let mut transport = StdioTransport::spawn(&sh("echo 'boom' >&2; sleep 5")).unwrap();
        let line = transport.probe_stderr(Duration::from_secs(2)).await;
        assert_eq!(line.as_deref(), Some("boom"));

        // Nothing more is written: the probe gives up within its bound.
        let start = Instant::now();
        assert_eq!(transport.probe_stderr(Duration::from_millis(100)).await, None);
        assert!(start.elapsed() < Duration::from_secs(2));

        transport.shutdown(ShutdownPolicy::default()).await;
    }

    #[tokio::test]
    async fn test_shutdown_uses_sigterm() {
        let transport = StdioTransport::spawn(&sh("exec sleep 30")).unwrap();
        let ending = transport.shutdown(ShutdownPolicy::default()).await;
        assert_eq!(ending, Termination::Terminated);
    }

    #[tokio::test]
    async fn test_shutdown_kills_when_sigterm_ignored() {
        let transport =
            StdioTransport::spawn(&sh("trap '' TERM; while true; do sleep 0.05; done")).unwrap();
        // Give the shell time to install its trap.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let policy = ShutdownPolicy {
            stdin_close_grace: Duration::from_millis(50),
            terminate_grace: Duration::from_millis(300),
        };
        let start = Instant::now();
        let ending = transport.shutdown(policy).await;
        assert_eq!(ending, Termination::Killed);
        assert!(ending.is_reaped());
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_shutdown_already_exited() {
        let mut transport = StdioTransport::spawn(&sh("exit 3")).unwrap();
        assert_eq!(transport.read_line().await.unwrap(), None);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.exit_code(), Some(3));

        let ending = transport.shutdown(ShutdownPolicy::default()).await;
        assert_eq!(ending, Termination::AlreadyExited);
    }

    #[tokio::test]
    async fn test_shutdown_kills_orphaned_group_members() {
        let mut transport = StdioTransport::spawn(&sh(
            "sleep 30 </dev/null >/dev/null 2>&1 & echo $!; exit 0",
        ))
        .unwrap();
        let orphan: u32 = transport
            .read_line()
            .await
            .unwrap()
            .unwrap()
            .trim()
            .parse()
            .unwrap();

        let start = Instant::now();
        while transport.is_running() && start.elapsed() < Duration::from_secs(2) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(process_alive(orphan));

        let ending = transport.shutdown(ShutdownPolicy::default()).await;
        assert_eq!(ending, Termination::AlreadyExited);
        assert!(wait_until_gone(orphan, Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn test_abandoned_input_after_stalled_write() {
        // The peer never reads, so a large line cannot fit in the pipe.
        let mut transport = StdioTransport::spawn(&sh("exec sleep 30")).unwrap();
        let pid = transport.pid().unwrap();
        let big = serde_json::json!({ "blob": "x".repeat(1 << 20) });

        let stalled = tokio::time::timeout(Duration::from_millis(200), transport.send(&big)).await;
        assert!(stalled.is_err(), "write should not complete");

        transport.abandon_input();
        assert!(!transport.input_open());
        assert!(matches!(
            transport.send(&serde_json::json!({"x": 1})).await,
            Err(McpError::NotConnected)
        ));

        let start = Instant::now();
        let ending = transport.shutdown(ShutdownPolicy::default()).await;
        assert_eq!(ending, Termination::Terminated);
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(!process_alive(pid));
    }

    #[tokio::test]
    async fn test_send_after_peer_exit_reports_exit() {
        let mut transport = StdioTransport::spawn(&sh("exec true")).unwrap();
        assert_eq!(transport.read_line().await.unwrap(), None);
        tokio::time::sleep(Duration::from_millis(100)).await;

        // The first write may land in the pipe buffer; keep writing until the
        // broken pipe surfaces.
        let mut outcome = Ok(());
        for _ in 0..10 {
            outcome = transport.send(&serde_json::json!({"x": 1})).await;
            if outcome.is_err() {
                break;
            }
        }
        assert!(matches!(outcome, Err(McpError::PeerExited(_))));
    }
}
