//! Starting a server as a child process and waiting for its port announcement.

use std::{
    collections::VecDeque,
    ffi::OsStr,
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
    process::{ExitStatus, Stdio},
};

use log::{debug, warn};
use tokio::{
    io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStderr, Command},
    task::JoinHandle,
};

use crate::{client::ModelClient, ClientErr};

/// Stderr lines kept from each end to explain a failed start.
const STDERR_HEAD: usize = 10;
const STDERR_TAIL: usize = 10;

/// How the launched server gets its snapshot.
#[derive(Debug, Clone)]
pub enum SnapshotInput {
    /// Piped through stdin, which is closed afterwards.
    Bytes(Vec<u8>),
    /// Read by the server from a file.
    Path(PathBuf),
}

/// A running server process. It's killed when dropped.
#[derive(Debug)]
pub struct ServerProcess {
    child: Child,
    port: u16,
}

impl ServerProcess {
    /// Launches `program` with `args` and waits for its first stdout line, which
    /// must end with the port it listens on.
    ///
    /// # Errors
    /// `ClientErr::Handshake` with the exit status and the first and last stderr
    /// lines if the process exits without announcing a port, or announces
    /// something else.
    pub async fn spawn<P, I, S>(program: P, args: I, snapshot: SnapshotInput) -> Result<Self, ClientErr>
    where
        P: AsRef<OsStr>,
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(program);
        cmd.args(args);
        Self::spawn_command(cmd, snapshot).await
    }

    /// Same as `spawn` for a prepared command, to set its environment for
    /// instance. Its stdio is overridden.
    pub async fn spawn_command(mut cmd: Command, snapshot: SnapshotInput) -> Result<Self, ClientErr> {
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match &snapshot {
            SnapshotInput::Bytes(_) => cmd.stdin(Stdio::piped()),
            SnapshotInput::Path(path) => cmd.arg(path).stdin(Stdio::null()),
        };

        let mut child = cmd.spawn()?;
        let stderr = child.stderr.take().map(drain_stderr);

        if let (SnapshotInput::Bytes(bytes), Some(mut stdin)) = (snapshot, child.stdin.take()) {
            // A server that rejects its arguments exits before reading stdin.
            if let Err(e) = stdin.write_all(&bytes).await {
                debug!("failed to pipe snapshot: {e}");
            }
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClientErr::Handshake("stdout isn't piped".to_string()))?;
        let handshake = BufReader::new(stdout).lines().next_line().await?;

        let Some(line) = handshake else {
            let status = child.wait().await?;
            let output = match stderr {
                Some(task) => task.await.unwrap_or_default(),
                None => Vec::new(),
            };

            return Err(ClientErr::Handshake(format!(
                "server exited with {status} before announcing its port: {}",
                output.join("\n")
            )));
        };

        let port = parse_handshake(&line)
            .ok_or_else(|| ClientErr::Handshake(format!("unexpected announcement {line:?}")))?;
        debug!(port = port; "server started");

        Ok(Self { child, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// A client for this server, assuming it listens on the loopback interface.
    pub fn client(&self) -> ModelClient {
        ModelClient::new(SocketAddr::from((Ipv4Addr::LOCALHOST, self.port)))
    }

    /// Waits for the process to exit, after an `exit` command for instance.
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Kills the process and waits for it.
    pub async fn kill(&mut self) -> io::Result<()> {
        self.child.kill().await
    }
}

/// Extracts the port from the announcement line, the last whitespace separated
/// token.
pub fn parse_handshake(line: &str) -> Option<u16> {
    line.split_whitespace().last()?.parse().ok()
}

/// Forwards the child's stderr to the log so the pipe never fills, keeping the
/// first and last lines around. Skipped lines are replaced by a marker.
fn drain_stderr(stderr: ChildStderr) -> JoinHandle<Vec<String>> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        let mut head = Vec::with_capacity(STDERR_HEAD);
        let mut tail = VecDeque::with_capacity(STDERR_TAIL);
        let mut skipped = 0usize;

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    debug!("server: {line}");
                    if head.len() < STDERR_HEAD {
                        head.push(line);
                        continue;
                    }

                    if tail.len() == STDERR_TAIL {
                        tail.pop_front();
                        skipped += 1;
                    }
                    tail.push_back(line);
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("failed to read server stderr: {e}");
                    break;
                }
            }
        }

        if skipped > 0 {
            head.push(format!("... {skipped} lines skipped ..."));
        }
        head.extend(tail);
        head
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_start_reports_both_ends_of_stderr() {
        let script = "echo 'fatal: bad snapshot' >&2; \
                      i=1; while [ $i -le 50 ]; do echo \"frame $i\" >&2; i=$((i+1)); done; \
                      exit 3";

        let err = ServerProcess::spawn("sh", ["-c", script], SnapshotInput::Bytes(Vec::new()))
            .await
            .unwrap_err();

        let msg = match err {
            ClientErr::Handshake(msg) => msg,
            err => panic!("expected a handshake error, got {err}"),
        };
        assert!(msg.contains("fatal: bad snapshot"), "{msg}");
        assert!(msg.contains("31 lines skipped"), "{msg}");
        assert!(msg.contains("frame 50"), "{msg}");
        assert!(!msg.contains("frame 20\n"), "{msg}");
    }

    #[test]
    fn port_is_the_last_token() {
        assert_eq!(parse_handshake("Listening on port 5482"), Some(5482));
        assert_eq!(parse_handshake("[Status] Listening on port: 5483"), Some(5483));
        assert_eq!(parse_handshake("  5484  "), Some(5484));
        assert_eq!(parse_handshake("Listening on port"), None);
        assert_eq!(parse_handshake(""), None);
        assert_eq!(parse_handshake("port 70000"), None);
    }
}
