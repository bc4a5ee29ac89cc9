//! Test driver for getoptx integration tests.
//!
//! Spawns a binary with:
//! - stdin: a pipe fed with given bytes, or a PTY slave so isatty(0) is true
//! - stdout, stderr: pipes, captured for assertions

use nix::pty::openpty;
use std::ffi::OsStr;
use std::io::{Read, Write};
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::process::CommandExt;
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;

/// What the child sees on stdin.
pub enum Input<'a> {
    /// A pipe carrying these bytes, closed afterwards.
    Bytes(&'a [u8]),
    /// A terminal that never sends anything.
    Terminal,
}

/// A running child process.
pub struct Session {
    child: Child,
    /// PTY master, held open while the child runs.
    _pty_master: Option<OwnedFd>,
    stdout_capture: Arc<Mutex<Vec<u8>>>,
    stderr_capture: Arc<Mutex<Vec<u8>>>,
    _stdout_thread: thread::JoinHandle<()>,
    _stderr_thread: thread::JoinHandle<()>,
}

fn drain<R: Read + Send + 'static>(
    mut pipe: R,
    what: &'static str,
) -> (Arc<Mutex<Vec<u8>>>, thread::JoinHandle<()>) {
    let capture = Arc::new(Mutex::new(Vec::new()));
    let cap = Arc::clone(&capture);
    let handle = thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            match pipe.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => cap.lock().unwrap().extend_from_slice(&buf[..n]),
                Err(e) => {
                    eprintln!("{what} drain error: {e}");
                    break;
                }
            }
        }
    });
    (capture, handle)
}

impl Session {
    /// Spawn `binary` with `args`.
    ///
    /// `env` are additional environment variables to set.
    pub fn spawn<A: AsRef<OsStr>>(
        binary: &str,
        args: &[A],
        env: &[(&str, &str)],
        input: Input<'_>,
    ) -> std::io::Result<Session> {
        let mut cmd = Command::new(binary);
        cmd.args(args);
        cmd.env_remove("GETOPTX_LOG");
        for (k, v) in env {
            cmd.env(k, v);
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut pty = None;
        match input {
            Input::Bytes(_) => {
                cmd.stdin(Stdio::piped());
            }
            Input::Terminal => {
                let pair = openpty(None, None)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
                let slave_fd = pair.slave.as_raw_fd();
                cmd.stdin(Stdio::null());
                // Put the PTY slave on stdin so the child sees a terminal.
                unsafe {
                    cmd.pre_exec(move || {
                        if libc::dup2(slave_fd, 0) == -1 {
                            return Err(std::io::Error::last_os_error());
                        }
                        Ok(())
                    });
                }
                // The slave stays open in the parent until spawn returns.
                pty = Some((pair.master, pair.slave));
            }
        }

        let mut child = cmd.spawn()?;

        if let Input::Bytes(bytes) = input {
            let mut stdin = child.stdin.take().unwrap();
            stdin.write_all(bytes)?;
            // Dropping stdin closes the pipe.
        }

        let stdout: ChildStdout = child.stdout.take().unwrap();
        let stderr: ChildStderr = child.stderr.take().unwrap();
        let (stdout_capture, stdout_thread) = drain(stdout, "stdout");
        let (stderr_capture, stderr_thread) = drain(stderr, "stderr");

        Ok(Session {
            child,
            _pty_master: pty.map(|(master, _slave)| master),
            stdout_capture,
            stderr_capture,
            _stdout_thread: stdout_thread,
            _stderr_thread: stderr_thread,
        })
    }

    /// Wait for the child to exit and assert the exit code.
    pub fn wait_exit(mut self, expected_code: i32) -> SessionOutput {
        let status = self.child.wait().expect("failed to wait for child");
        let code = status.code().unwrap_or(-1);

        let _ = self._stdout_thread.join();
        let _ = self._stderr_thread.join();

        let stdout = String::from_utf8_lossy(&self.stdout_capture.lock().unwrap()).to_string();
        let stderr = String::from_utf8_lossy(&self.stderr_capture.lock().unwrap()).to_string();

        assert_eq!(
            code, expected_code,
            "expected exit code {expected_code}, got {code}\nstdout:\n{stdout}\nstderr:\n{stderr}"
        );

        SessionOutput { stdout, stderr }
    }
}

/// Output captured from a completed session.
pub struct SessionOutput {
    pub stdout: String,
    pub stderr: String,
}
