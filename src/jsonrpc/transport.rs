//! Subprocess transport
//!
//! `PsgClient` owns the server child process. A background task drains the
//! child's stdout line by line into an unbounded queue, so sending never
//! waits for somebody to consume replies and streamed items pile up without
//! loss. One logical exchange at a time: `send`, then drain `receive`.

use log::{debug, info, warn};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::error::{RpcError, RpcResult};
use super::message::{Params, RequestGenerator};
use super::reply::ReplyCollector;
use crate::config::{ClientConfig, VerboseLevel};

/// How long `close` waits for the server to exit before killing it
const EXIT_GRACE: Duration = Duration::from_secs(5);

/// Line-delimited JSON-RPC client driving one server process
pub struct PsgClient {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    queue: mpsc::UnboundedReceiver<String>,
    reader: Option<JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    request_generator: RequestGenerator,
    timeout: Duration,
    verbose: VerboseLevel,
}

impl PsgClient {
    /// Spawn the server and start the stdout reader
    pub async fn open(config: &ClientConfig) -> RpcResult<Self> {
        let args = config.command_args();
        debug!("Spawning process: {} {:?}", config.binary.display(), args);

        let mut child = Command::new(&config.binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RpcError::Spawn {
                binary: config.binary.display().to_string(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            RpcError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "Child process stdin not available",
            ))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            RpcError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "Child process stdout not available",
            ))
        })?;

        let (queue_tx, queue) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let reader = tokio::spawn(Self::read_loop(stdout, queue_tx, shutdown_rx));

        info!("Started {} (pid {:?})", config.binary.display(), child.id());

        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            queue,
            reader: Some(reader),
            shutdown_tx: Some(shutdown_tx),
            request_generator: RequestGenerator::new(),
            timeout: config.timeout,
            verbose: config.verbose,
        })
    }

    /// Encode a request, write it as one line and flush.
    ///
    /// Returns the encoded request text for diagnostics.
    pub async fn send(&mut self, method: &str, params: Params) -> RpcResult<String> {
        let request = self.request_generator.generate(method, params);

        let stdin = self.stdin.as_mut().ok_or(RpcError::Closed)?;
        stdin.write_all(request.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;

        debug!("Sent: {}", request);
        if self.verbose >= VerboseLevel::Request {
            eprintln!("{}", request);
        }

        Ok(request)
    }

    /// Replies to the request sent last
    pub fn receive(&mut self) -> ReplyCollector<'_> {
        ReplyCollector::new(&mut self.queue, self.timeout, self.verbose)
    }

    /// Close stdin, stop reading stdout, wait for the server to exit and
    /// join the reader task.
    pub async fn close(mut self) -> RpcResult<()> {
        self.shutdown().await
    }

    async fn shutdown(&mut self) -> RpcResult<()> {
        debug!("Shutting down PsgClient");

        // stdinを閉じてサーバーに入力終了を通知
        drop(self.stdin.take());

        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }

        if let Some(mut child) = self.child.take() {
            match timeout(EXIT_GRACE, child.wait()).await {
                Ok(status) => {
                    let status = status?;
                    info!("Process exited with status: {}", status);
                }
                Err(_) => {
                    warn!("Process didn't exit gracefully, killing");
                    child.kill().await?;
                }
            }
        }

        if let Some(reader) = self.reader.take() {
            if let Err(e) = reader.await {
                warn!("Reader task join error: {}", e);
            }
        }

        // 残った応答行は破棄する
        self.queue.close();
        while self.queue.try_recv().is_ok() {}

        Ok(())
    }

    /// Push every stdout line onto the queue until EOF, a read error or the
    /// shutdown signal. None of these is an error: it is how the reader ends.
    async fn read_loop(
        stdout: ChildStdout,
        queue_tx: mpsc::UnboundedSender<String>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        debug!("Starting stdout reader");

        let mut lines = BufReader::new(stdout).lines();

        loop {
            tokio::select! {
                read = lines.next_line() => {
                    match read {
                        Ok(None) => {
                            debug!("Child stdout EOF");
                            break;
                        }
                        Ok(Some(line)) => {
                            if queue_tx.send(line).is_err() {
                                debug!("Queue dropped, terminating reader");
                                break;
                            }
                        }
                        Err(e) => {
                            debug!("Error reading stdout: {}", e);
                            break;
                        }
                    }
                }
                _ = &mut shutdown_rx => {
                    debug!("Shutdown signal received");
                    break;
                }
            }
        }

        debug!("Stdout reader stopped");
    }
}

impl Drop for PsgClient {
    fn drop(&mut self) {
        if self.child.is_some() {
            debug!("PsgClient dropped without close, cleaning up");
        }

        drop(self.stdin.take());
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
        }
    }
}
