//! Shared harness for black-box specs

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};

pub use similar_asserts::assert_eq;
use tempfile::TempDir;

/// Upper bound for polling waits
pub const SPEC_WAIT_MAX_MS: u64 = 5000;

/// Poll `check` until it returns true or `max_ms` elapses
pub fn wait_for(max_ms: u64, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(max_ms);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    check()
}

fn cbd_bin() -> PathBuf {
    assert_cmd::cargo::cargo_bin("cbd")
}

fn cb_bin() -> PathBuf {
    assert_cmd::cargo::cargo_bin("cb")
}

/// A running `cbd` with the in-memory engine and an isolated state dir
pub struct Daemon {
    state: TempDir,
    child: Option<Child>,
    env: Vec<(String, String)>,
}

impl Daemon {
    pub fn start() -> Self {
        Self::start_with(&[])
    }

    /// Start with extra environment variables
    pub fn start_with(env: &[(&str, &str)]) -> Self {
        let state = TempDir::new().unwrap();
        let env = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut daemon = Self {
            state,
            child: None,
            env,
        };
        daemon.spawn();
        daemon
    }

    /// Start again on the same state directory
    pub fn restart(&mut self) {
        self.cb().args(&["shutdown"]).passes();
        self.wait_exit();
        self.spawn();
    }

    fn spawn(&mut self) {
        let mut child = self
            .cbd_command()
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();

        let stdout = child.stdout.take().unwrap();
        let mut line = String::new();
        BufReader::new(stdout).read_line(&mut line).unwrap();
        if line.trim() != "READY" {
            let _ = child.kill();
            let output = child.wait_with_output().unwrap();
            panic!(
                "cbd failed to start\nstderr: {}\nlog: {}",
                String::from_utf8_lossy(&output.stderr),
                self.log()
            );
        }
        self.child = Some(child);
    }

    /// A `cbd` command wired to this daemon's state dir, not yet spawned
    pub fn cbd_command(&self) -> Command {
        let mut cmd = Command::new(cbd_bin());
        cmd.env("CB_STATE_DIR", self.state.path())
            .env("CB_ENGINE", "memory")
            .env_remove("CB_CONFIG")
            .env_remove("CB_SOCKET_PATH")
            .env_remove("RUST_LOG");
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        cmd
    }

    /// A `cb` invocation pointed at this daemon
    pub fn cb(&self) -> CliBuilder {
        CliBuilder::new(self.socket_path())
    }

    pub fn state_path(&self) -> &Path {
        self.state.path()
    }

    pub fn socket_path(&self) -> PathBuf {
        self.state.path().join("cbd.sock")
    }

    pub fn log(&self) -> String {
        std::fs::read_to_string(self.state.path().join("cbd.log")).unwrap_or_default()
    }

    /// Wait for the daemon process to exit on its own
    pub fn wait_exit(&mut self) -> bool {
        let Some(mut child) = self.child.take() else {
            return true;
        };
        let exited = wait_for(SPEC_WAIT_MAX_MS, || matches!(child.try_wait(), Ok(Some(_))));
        if !exited {
            let _ = child.kill();
            let _ = child.wait();
        }
        exited
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Builder for one `cb` invocation
pub struct CliBuilder {
    cmd: Command,
}

impl CliBuilder {
    pub fn new(socket: PathBuf) -> Self {
        let mut cmd = Command::new(cb_bin());
        cmd.env("CB_SOCKET_PATH", socket);
        Self { cmd }
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    /// Run and require exit code 0
    pub fn passes(mut self) -> RunAssert {
        let output = self.cmd.output().unwrap();
        let run = RunAssert { output };
        assert!(
            run.output.status.success(),
            "expected success\nstdout: {}\nstderr: {}",
            run.stdout(),
            run.stderr()
        );
        run
    }

    /// Run and require a non-zero exit code
    pub fn fails(mut self) -> RunAssert {
        let output = self.cmd.output().unwrap();
        let run = RunAssert { output };
        assert!(
            !run.output.status.success(),
            "expected failure\nstdout: {}\nstderr: {}",
            run.stdout(),
            run.stderr()
        );
        run
    }
}

/// Captured result of a `cb` run
pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).to_string()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).to_string()
    }

    pub fn stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            stdout.contains(expected),
            "stdout missing {expected:?}\nstdout: {stdout}"
        );
        self
    }

    pub fn stdout_lacks(self, unexpected: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            !stdout.contains(unexpected),
            "stdout unexpectedly has {unexpected:?}\nstdout: {stdout}"
        );
        self
    }

    pub fn stderr_has(self, expected: &str) -> Self {
        let stderr = self.stderr();
        assert!(
            stderr.contains(expected),
            "stderr missing {expected:?}\nstderr: {stderr}"
        );
        self
    }

    /// Parse `KEY=value` lines from stdout
    pub fn env_lines(&self) -> std::collections::BTreeMap<String, String> {
        self.stdout()
            .lines()
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.stdout()).unwrap()
    }
}
