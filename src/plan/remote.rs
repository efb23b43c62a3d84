//! Command execution on the local machine or a remote host.
//!
//! # Responsibilities
//! - One capability trait, [`RemoteExecutor`], with a local and an SSH
//!   implementation, so step logic never branches on where it runs
//! - Hard timeouts: a timed-out command is killed together with every
//!   process it started, never left running
//! - Non-interactive SSH wrapped in a login shell
//!
//! # Design Decisions
//! - ssh runs in batch mode with an explicit connect timeout; a password or
//!   host-key prompt would hang a plan
//! - Remote commands go through `<shell> -lc '<cmd>'` so PATH and profile
//!   variables match an interactive login
//! - One control master per plan run (keyed by a fresh session id), closed
//!   when the plan ends; sessions are never shared between plans

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time;
use uuid::Uuid;

use crate::config::{SshConfig, SshTarget};

/// Boxed future returned by [`RemoteExecutor`] methods.
pub type ExecFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Raw result of running one command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
    /// The process could not be started or waited on.
    pub spawn_error: Option<String>,
    pub elapsed: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.spawn_error.is_none() && self.exit_code == Some(0)
    }

    /// One-line reason for a failure, `None` on success.
    pub fn failure_reason(&self) -> Option<String> {
        if let Some(e) = &self.spawn_error {
            return Some(e.clone());
        }
        if self.timed_out {
            return Some(format!("timed out after {:.1}s, process killed", self.elapsed.as_secs_f64()));
        }
        match self.exit_code {
            Some(0) => None,
            Some(code) => Some(format!("exit status {}", code)),
            None => Some("terminated by signal".to_string()),
        }
    }
}

/// Runs shell commands somewhere.
pub trait RemoteExecutor: Send + Sync {
    /// Where commands run, for logs.
    fn describe(&self) -> String;

    /// Run `command`, killing it if it outlives `timeout`.
    fn run<'a>(&'a self, command: &'a str, timeout: Duration) -> ExecFuture<'a, CommandOutput>;

    /// Release any session state held for the plan.
    fn close(&self) -> ExecFuture<'_, ()> {
        Box::pin(async {})
    }
}

/// Runs commands through `sh -c` on this machine.
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    shell: String,
}

impl LocalExecutor {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteExecutor for LocalExecutor {
    fn describe(&self) -> String {
        "local".to_string()
    }

    fn run<'a>(&'a self, command: &'a str, timeout: Duration) -> ExecFuture<'a, CommandOutput> {
        Box::pin(async move {
            let mut cmd = Command::new(&self.shell);
            cmd.arg("-c").arg(command);
            run_command(cmd, timeout).await
        })
    }
}

/// Runs commands on a remote host through the ssh client.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    target: SshTarget,
    config: SshConfig,
    control_path: Option<PathBuf>,
}

impl SshExecutor {
    /// `session` scopes the control master to one plan run.
    pub fn new(target: SshTarget, config: &SshConfig, session: Uuid) -> Self {
        let control_path = config.multiplex.then(|| {
            let id = session.simple().to_string();
            PathBuf::from(&config.control_dir).join(format!("bp-{}", &id[..12]))
        });
        Self {
            target,
            config: config.clone(),
            control_path,
        }
    }

    /// Options shared by every ssh invocation for this session.
    pub fn base_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.config.connect_timeout_secs),
            "-o".to_string(),
            format!("StrictHostKeyChecking={}", self.config.strict_host_key_checking),
        ];
        if let Some(path) = &self.control_path {
            args.extend([
                "-o".to_string(),
                "ControlMaster=auto".to_string(),
                "-o".to_string(),
                format!("ControlPath={}", path.display()),
                "-o".to_string(),
                "ControlPersist=60".to_string(),
            ]);
        }
        args.extend(["-p".to_string(), self.target.port.to_string()]);
        if let Some(key) = &self.target.key {
            args.extend(["-i".to_string(), key.clone()]);
        }
        args
    }

    /// Full argument list to run `command` remotely under a login shell.
    pub fn command_args(&self, command: &str) -> Vec<String> {
        let mut args = self.base_args();
        args.push(self.target.destination());
        args.push("--".to_string());
        args.push(login_shell_command(&self.config.login_shell, command));
        args
    }
}

impl RemoteExecutor for SshExecutor {
    fn describe(&self) -> String {
        format!("ssh {}", self.target)
    }

    fn run<'a>(&'a self, command: &'a str, timeout: Duration) -> ExecFuture<'a, CommandOutput> {
        Box::pin(async move {
            let mut cmd = Command::new(&self.config.program);
            cmd.args(self.command_args(command));
            let output = run_command(cmd, timeout).await;
            if output.exit_code == Some(255) {
                tracing::warn!(ssh = %self.target, "ssh exited 255, connection or authentication failed");
            }
            output
        })
    }

    fn close(&self) -> ExecFuture<'_, ()> {
        Box::pin(async move {
            let Some(path) = &self.control_path else {
                return;
            };
            let mut cmd = Command::new(&self.config.program);
            cmd.arg("-o")
                .arg(format!("ControlPath={}", path.display()))
                .arg("-O")
                .arg("exit")
                .arg(self.target.destination());
            let output = run_command(cmd, Duration::from_secs(5)).await;
            tracing::debug!(ssh = %self.target, success = output.success(), "ssh control master closed");
        })
    }
}

/// `<shell> -lc '<command>'`, with the command single-quoted.
pub fn login_shell_command(shell: &str, command: &str) -> String {
    format!("{} -lc {}", shell, shell_quote(command))
}

/// POSIX single-quote `s`.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Most recent bytes kept per output stream.
const OUTPUT_CAP: usize = 64 * 1024;

/// How long output is still collected after the process exits.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Spawn `cmd` with piped output and wait at most `timeout`.
///
/// Only the exit of the spawned process is awaited. Anything it leaves in
/// the background (a server started with `&`, an ssh control master) may
/// hold the pipes open indefinitely, so output is drained by separate tasks
/// and collected after a short grace period. The command runs in its own
/// process group, and the whole group is killed on timeout.
pub async fn run_command(mut cmd: Command, timeout: Duration) -> CommandOutput {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let started = Instant::now();
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return CommandOutput {
                spawn_error: Some(format!("failed to spawn: {}", e)),
                elapsed: started.elapsed(),
                ..CommandOutput::default()
            }
        }
    };

    // Kills the group if this future is dropped before the process exits.
    let mut group = GroupGuard::new(child.id());
    let stdout = child.stdout.take().map(Drain::spawn);
    let stderr = child.stderr.take().map(Drain::spawn);

    match time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            group.release();
            CommandOutput {
                exit_code: status.code(),
                stdout: Drain::collect(stdout).await,
                stderr: Drain::collect(stderr).await,
                timed_out: false,
                spawn_error: None,
                elapsed: started.elapsed(),
            }
        }
        Ok(Err(e)) => CommandOutput {
            spawn_error: Some(format!("failed to wait for process: {}", e)),
            elapsed: started.elapsed(),
            ..CommandOutput::default()
        },
        Err(_) => {
            group.kill();
            let _ = child.kill().await;
            CommandOutput {
                stdout: Drain::collect(stdout).await,
                stderr: Drain::collect(stderr).await,
                timed_out: true,
                elapsed: started.elapsed(),
                ..CommandOutput::default()
            }
        }
    }
}

/// Reads one output stream to EOF in the background, keeping the tail.
struct Drain {
    buf: Arc<Mutex<Vec<u8>>>,
    done: JoinHandle<()>,
}

impl Drain {
    fn spawn<R>(mut reader: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = buf.clone();
        let done = tokio::spawn(async move {
            let mut chunk = [0u8; 4096];
            loop {
                match reader.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let mut held = lock(&sink);
                        held.extend_from_slice(&chunk[..n]);
                        if held.len() > OUTPUT_CAP {
                            let excess = held.len() - OUTPUT_CAP;
                            held.drain(..excess);
                        }
                    }
                }
            }
        });
        Self { buf, done }
    }

    /// Output read so far, waiting up to [`DRAIN_GRACE`] for EOF.
    ///
    /// A reader still running afterwards is left to drain in the background
    /// so a detached writer does not hit a closed pipe.
    async fn collect(drain: Option<Self>) -> Vec<u8> {
        let Some(mut drain) = drain else {
            return Vec::new();
        };
        let _ = time::timeout(DRAIN_GRACE, &mut drain.done).await;
        let out = std::mem::take(&mut *lock(&drain.buf));
        out
    }
}

fn lock(buf: &Mutex<Vec<u8>>) -> MutexGuard<'_, Vec<u8>> {
    buf.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Kills a command's process group unless released after a normal exit.
struct GroupGuard {
    pgid: Option<u32>,
}

impl GroupGuard {
    fn new(pid: Option<u32>) -> Self {
        Self { pgid: pid }
    }

    /// The leader exited on its own; anything it backgrounded is kept.
    fn release(&mut self) {
        self.pgid = None;
    }

    fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    // A negative pid addresses every process in the group.
    let ret = unsafe { libc::kill(-(pgid as libc::pid_t), libc::SIGKILL) };
    if ret != 0 {
        tracing::debug!(pgid, "process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}
