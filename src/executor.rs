//! Runs commands through the host shell with a wall-clock timeout.
//!
//! A plain `cd` never reaches the shell: it is applied to a shared
//! [`WorkingDir`] so later commands in the same session run from the new
//! directory. A `cd` chained with other shell syntax runs in the shell.
//!
//! On unix each command gets its own process group, and a timeout kills the
//! whole group.

use parking_lot::RwLock;
use std::{
    borrow::Cow,
    env, fs, io,
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error("empty command")]
    EmptyCommand,

    #[error("cd: directory not found: {0}")]
    NotFound(String),

    #[error("cd: not a directory: {0}")]
    NotADirectory(String),

    #[error("cd: permission denied: {0}")]
    PermissionDenied(String),

    #[error("Command timed out after {0} seconds")]
    TimedOut(u64),

    #[error("Execution error: {0}")]
    Spawn(String),

    #[error("refused: command was not cleared to run")]
    NotCleared,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Completed {
        stdout: String,
        stderr: String,
        exit_code: Option<i32>,
    },
    DirectoryChanged {
        path: PathBuf,
    },
    Failed(ExecError),
}

impl ExecutionOutcome {
    pub fn stdout(&self) -> Cow<'_, str> {
        match self {
            ExecutionOutcome::Completed { stdout, .. } => Cow::Borrowed(stdout),
            ExecutionOutcome::DirectoryChanged { path } => {
                Cow::Owned(format!("Changed directory to {}", path.display()))
            }
            ExecutionOutcome::Failed(_) => Cow::Borrowed(""),
        }
    }

    pub fn stderr(&self) -> Cow<'_, str> {
        match self {
            ExecutionOutcome::Completed { stderr, .. } => Cow::Borrowed(stderr),
            ExecutionOutcome::DirectoryChanged { .. } => Cow::Borrowed(""),
            ExecutionOutcome::Failed(e) => Cow::Owned(e.to_string()),
        }
    }

    /// A zero exit status or an applied `cd`. A non-zero exit is a failure
    /// even when stderr is empty.
    pub fn succeeded(&self) -> bool {
        match self {
            ExecutionOutcome::Completed { exit_code, .. } => *exit_code == Some(0),
            ExecutionOutcome::DirectoryChanged { .. } => true,
            ExecutionOutcome::Failed(_) => false,
        }
    }
}

/// The ambient working directory of a session. Clones share one directory.
#[derive(Debug, Clone)]
pub struct WorkingDir {
    inner: Arc<RwLock<PathBuf>>,
}

impl WorkingDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(path.into())),
        }
    }

    pub fn from_process() -> Self {
        let start = env::current_dir()
            .ok()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(start)
    }

    pub fn get(&self) -> PathBuf {
        self.inner.read().clone()
    }

    /// Resolve `target` against the current directory and commit it. The
    /// write lock is held from resolution to commit.
    pub fn change(&self, target: &str) -> Result<PathBuf, ExecError> {
        let mut current = self.inner.write();
        let resolved = resolve_directory(&current, target)?;
        *current = resolved.clone();
        Ok(resolved)
    }
}

fn resolve_directory(base: &Path, target: &str) -> Result<PathBuf, ExecError> {
    let target = strip_quotes(target.trim());
    let candidate = match expand_home(target) {
        Some(path) if path.is_absolute() => path,
        Some(path) => base.join(path),
        None => return Err(ExecError::NotFound("~".to_string())),
    };

    let shown = || {
        if target.is_empty() {
            "~".to_string()
        } else {
            target.to_string()
        }
    };

    match fs::metadata(&candidate) {
        Ok(meta) if !meta.is_dir() => return Err(ExecError::NotADirectory(shown())),
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            return Err(ExecError::PermissionDenied(shown()))
        }
        Err(_) => return Err(ExecError::NotFound(shown())),
    }

    if let Err(e) = fs::read_dir(&candidate) {
        if e.kind() == io::ErrorKind::PermissionDenied {
            return Err(ExecError::PermissionDenied(shown()));
        }
    }

    candidate.canonicalize().map_err(|e| match e.kind() {
        io::ErrorKind::PermissionDenied => ExecError::PermissionDenied(shown()),
        _ => ExecError::NotFound(shown()),
    })
}

fn strip_quotes(s: &str) -> &str {
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

/// `""` and `~` go home, `~/x` is home-relative. `None` when there is no home.
fn expand_home(target: &str) -> Option<PathBuf> {
    if target.is_empty() || target == "~" {
        return dirs::home_dir();
    }
    if let Some(rest) = target.strip_prefix("~/") {
        return dirs::home_dir().map(|home| home.join(rest));
    }
    Some(PathBuf::from(target))
}

const SHELL_OPERATORS: &[char] = &['&', '|', ';', '>', '<', '`', '\n'];

/// The argument of a lone `cd`. `None` for anything else, including a `cd`
/// chained or redirected with shell operators.
fn cd_target(command: &str) -> Option<&str> {
    let trimmed = command.trim();
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    if parts.next() != Some("cd") {
        return None;
    }
    let target = parts.next().unwrap_or("").trim();
    if target.contains(SHELL_OPERATORS) || target.contains("$(") {
        return None;
    }
    Some(target)
}

#[derive(Debug, Clone)]
pub struct Executor {
    cwd: WorkingDir,
    timeout: Duration,
}

impl Executor {
    pub fn new(cwd: WorkingDir, timeout: Duration) -> Self {
        Self { cwd, timeout }
    }

    pub fn working_dir(&self) -> &WorkingDir {
        &self.cwd
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `command`, or apply it when it is a `cd`. `cwd_override` replaces
    /// the ambient directory for this one call; `cd` always resolves against
    /// and updates the ambient directory.
    pub async fn execute(&self, command: &str, cwd_override: Option<&Path>) -> ExecutionOutcome {
        let command = command.trim();
        if command.is_empty() {
            return ExecutionOutcome::Failed(ExecError::EmptyCommand);
        }

        if let Some(target) = cd_target(command) {
            return match self.cwd.change(target) {
                Ok(path) => {
                    tracing::debug!("working directory is now {}", path.display());
                    ExecutionOutcome::DirectoryChanged { path }
                }
                Err(e) => {
                    tracing::debug!("cd rejected: {}", e);
                    ExecutionOutcome::Failed(e)
                }
            };
        }

        let dir = cwd_override
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.cwd.get());
        self.run_shell(command, &dir).await
    }

    async fn run_shell(&self, command: &str, dir: &Path) -> ExecutionOutcome {
        let (shell, shell_arg) = if cfg!(windows) {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };

        tracing::info!("running `{}` in {}", command, dir.display());

        let mut cmd = Command::new(shell);
        cmd.arg(shell_arg)
            .arg(command)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return ExecutionOutcome::Failed(ExecError::Spawn(e.to_string())),
        };

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        let waited = tokio::time::timeout(self.timeout, async {
            let (status, stdout, stderr) =
                tokio::join!(child.wait(), read_pipe(stdout_pipe), read_pipe(stderr_pipe));
            status.map(|s| (s, stdout, stderr))
        })
        .await;

        match waited {
            Ok(Ok((status, stdout, stderr))) => ExecutionOutcome::Completed {
                stdout,
                stderr,
                exit_code: status.code(),
            },
            Ok(Err(e)) => ExecutionOutcome::Failed(ExecError::Spawn(e.to_string())),
            Err(_) => {
                #[cfg(unix)]
                kill_process_group(&child);
                // kill() also waits, so the child is reaped here
                if let Err(e) = child.kill().await {
                    tracing::warn!("failed to kill timed out command: {}", e);
                }
                tracing::warn!("`{}` timed out after {:?}", command, self.timeout);
                ExecutionOutcome::Failed(ExecError::TimedOut(whole_seconds(self.timeout)))
            }
        }
    }
}

/// Signal the group led by `child` so commands it started die with it.
/// Must run before the leader is reaped.
#[cfg(unix)]
fn kill_process_group(child: &tokio::process::Child) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => tracing::warn!("failed to kill process group {}: {}", pid, e),
    }
}

fn whole_seconds(timeout: Duration) -> u64 {
    let secs = timeout.as_secs();
    if timeout.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf).await {
            tracing::debug!("error reading command output: {}", e);
        }
    }
    String::from_utf8_lossy(&buf).trim_end().to_string()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    fn executor_in(dir: &Path) -> Executor {
        Executor::new(WorkingDir::new(dir), Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_empty_command() {
        let exec = Executor::new(WorkingDir::from_process(), Duration::from_secs(1));
        let outcome = exec.execute("   ", None).await;
        assert_eq!(outcome, ExecutionOutcome::Failed(ExecError::EmptyCommand));
        assert_eq!(outcome.stdout(), "");
        assert_eq!(outcome.stderr(), "empty command");
    }

    #[tokio::test]
    async fn test_cd_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor_in(dir.path());
        let outcome = exec.execute("cd /nonexistent-xyz", None).await;

        assert_eq!(outcome.stdout(), "");
        assert!(outcome.stderr().contains("not found"));
        assert_eq!(exec.working_dir().get(), dir.path());
    }

    #[tokio::test]
    async fn test_cd_parent() {
        let dir = tempfile::tempdir().unwrap();
        let child = dir.path().join("child");
        fs::create_dir(&child).unwrap();
        let exec = executor_in(&child);

        let outcome = exec.execute("cd ..", None).await;
        let expected = dir.path().canonicalize().unwrap();

        assert!(outcome.succeeded());
        assert_eq!(exec.working_dir().get(), expected);
        assert!(outcome.stdout().contains(&expected.display().to_string()));
    }

    #[tokio::test]
    async fn test_cd_relative_then_run() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub dir")).unwrap();
        fs::write(dir.path().join("sub dir").join("marker.txt"), "x").unwrap();
        let exec = executor_in(dir.path());

        let outcome = exec.execute("cd \"sub dir\"", None).await;
        assert!(outcome.succeeded(), "{:?}", outcome);

        let listing = exec.execute("ls", None).await;
        assert_eq!(listing.stdout(), "marker.txt");
    }

    #[tokio::test]
    async fn test_cd_into_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        let exec = executor_in(dir.path());

        let outcome = exec.execute("cd notes.txt", None).await;
        assert_eq!(
            outcome,
            ExecutionOutcome::Failed(ExecError::NotADirectory("notes.txt".to_string()))
        );
        assert!(outcome.stderr().contains("not a directory"));
    }

    #[tokio::test]
    async fn test_cd_home() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        let Ok(home) = home.canonicalize() else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let exec = executor_in(dir.path());

        assert!(exec.execute("cd ~", None).await.succeeded());
        assert_eq!(exec.working_dir().get(), home);

        let exec = executor_in(dir.path());
        assert!(exec.execute("cd", None).await.succeeded());
        assert_eq!(exec.working_dir().get(), home);
    }

    #[tokio::test]
    async fn test_captures_stdout_and_stderr_separately() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor_in(dir.path());

        let outcome = exec.execute("echo hello; echo oops 1>&2", None).await;
        assert_eq!(outcome.stdout(), "hello");
        assert_eq!(outcome.stderr(), "oops");
        assert!(outcome.succeeded());
    }

    #[tokio::test]
    async fn test_output_is_right_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor_in(dir.path());

        let outcome = exec.execute("printf '  a b  \\n\\n'", None).await;
        assert_eq!(outcome.stdout(), "  a b");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor_in(dir.path());

        let outcome = exec.execute("exit 3", None).await;
        assert_eq!(
            outcome,
            ExecutionOutcome::Completed {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: Some(3),
            }
        );
        assert!(!outcome.succeeded());
    }

    #[tokio::test]
    async fn test_runs_in_working_dir_and_override() {
        let ambient = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let exec = executor_in(&ambient.path().canonicalize().unwrap());

        let here = exec.execute("pwd -P", None).await;
        assert_eq!(
            here.stdout(),
            ambient.path().canonicalize().unwrap().display().to_string()
        );

        let there = exec.execute("pwd -P", Some(other.path())).await;
        assert_eq!(
            there.stdout(),
            other.path().canonicalize().unwrap().display().to_string()
        );
        // the override does not stick
        assert_eq!(exec.working_dir().get(), ambient.path().canonicalize().unwrap());
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let dir = tempfile::tempdir().unwrap();
        let exec = Executor::new(WorkingDir::new(dir.path()), Duration::from_secs(1));

        let started = Instant::now();
        let outcome = exec.execute("sleep 40", None).await;

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(outcome.stdout(), "");
        assert!(outcome.stderr().contains("timed out"));
        assert_eq!(outcome, ExecutionOutcome::Failed(ExecError::TimedOut(1)));
    }

    #[tokio::test]
    async fn test_timeout_kills_grandchildren() {
        let dir = tempfile::tempdir().unwrap();
        let exec = Executor::new(WorkingDir::new(dir.path()), Duration::from_millis(500));

        let outcome = exec
            .execute("sh -c 'sleep 2; touch late.txt'; true", None)
            .await;
        assert_eq!(outcome, ExecutionOutcome::Failed(ExecError::TimedOut(1)));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!dir.path().join("late.txt").exists());
    }

    #[test]
    fn test_whole_seconds_rounds_up() {
        assert_eq!(whole_seconds(Duration::from_millis(200)), 1);
        assert_eq!(whole_seconds(Duration::from_secs(30)), 30);
        assert_eq!(whole_seconds(Duration::from_millis(1500)), 2);
    }

    #[tokio::test]
    async fn test_chained_cd_runs_in_shell() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("inside.txt"), "").unwrap();
        let exec = executor_in(dir.path());

        let outcome = exec.execute("cd sub && ls", None).await;
        assert!(outcome.succeeded(), "{:?}", outcome);
        assert_eq!(outcome.stdout(), "inside.txt");
        // the shell's cd does not move the session
        assert_eq!(exec.working_dir().get(), dir.path());
    }

    #[tokio::test]
    async fn test_cd_permission_denied() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        // root ignores the mode bits
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }
        let exec = executor_in(dir.path());

        let outcome = exec.execute("cd locked", None).await;
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(
            outcome,
            ExecutionOutcome::Failed(ExecError::PermissionDenied("locked".to_string()))
        );
        assert!(outcome.stderr().contains("permission denied"));
        assert_eq!(exec.working_dir().get(), dir.path());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor_in(dir.path());
        let missing = dir.path().join("gone");

        let outcome = exec.execute("ls", Some(&missing)).await;
        assert!(matches!(outcome, ExecutionOutcome::Failed(ExecError::Spawn(_))));
        assert!(outcome.stderr().starts_with("Execution error:"));
    }

    #[tokio::test]
    async fn test_separate_contexts_do_not_interfere() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        fs::create_dir(a.path().join("inner")).unwrap();

        let first = executor_in(a.path());
        let second = executor_in(b.path());
        assert!(first.execute("cd inner", None).await.succeeded());

        assert_eq!(second.working_dir().get(), b.path());
    }

    #[test]
    fn test_shared_working_dir_clones() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("next")).unwrap();

        let cwd = WorkingDir::new(dir.path());
        let shared = cwd.clone();
        let path = cwd.change("next").unwrap();

        assert_eq!(shared.get(), path);
    }

    #[test]
    fn test_cd_target_parsing() {
        assert_eq!(cd_target("cd /tmp"), Some("/tmp"));
        assert_eq!(cd_target("  cd   ..  "), Some(".."));
        assert_eq!(cd_target("cd"), Some(""));
        assert_eq!(cd_target("cdrecord -v"), None);
        assert_eq!(cd_target("echo cd"), None);
        assert_eq!(cd_target("cd sub && ls"), None);
        assert_eq!(cd_target("cd a; pwd"), None);
        assert_eq!(cd_target("cd $(mktemp -d)"), None);
    }
}
