//! Run a child program with the parent's channels redirected into a log file
//!
//! The child's stdout and stderr are piped back into this process and
//! re-emitted line by line on the parent's stdout and stderr channels, so
//! whatever channels are redirected see the child's output as their own.

use crate::config::LauncherConfig;
use crate::observers::LogFileWriter;
use crate::redirect::{channel, sink::StreamSink, Channel, RedirectGuard};
use anyhow::{Context, Result};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

/// What to run and how to capture it
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub program: String,
    pub args: Vec<String>,
    pub config: LauncherConfig,
}

impl LaunchRequest {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            config: LauncherConfig::default(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn config(mut self, config: LauncherConfig) -> Self {
        self.config = config;
        self
    }
}

/// Run the request to completion and return the child's exit code.
///
/// A child killed by a signal reports `128 + signal` on Unix, `1` elsewhere.
pub async fn run(request: LaunchRequest) -> Result<i32> {
    let LaunchRequest {
        program,
        args,
        config,
    } = request;
    config.validate().context("Invalid launcher configuration")?;

    channel::set_default_config(config.redirect.clone());

    let writer = Arc::new(
        LogFileWriter::with_flush_interval(&config.log_file, config.flush_interval())
            .with_context(|| format!("Unable to open log file: {}", config.log_file.display()))?
            .with_line_ending(config.line_ending.clone()),
    );

    let guards = capture(&config.capture, &writer)?;

    let outcome = run_child(&program, &args).await;

    // Stopping drains every complete line into the writer before it is dropped.
    for guard in &guards {
        channel::shutdown(guard.channel());
    }
    drop(guards);
    drop(writer);

    outcome
}

/// Redirect each of `channels` and attach `writer` to it.
///
/// On failure the writer is detached from every channel already captured,
/// so dropping the guards releases whatever this call created.
fn capture(channels: &[Channel], writer: &Arc<LogFileWriter>) -> Result<Vec<RedirectGuard>> {
    let mut guards: Vec<RedirectGuard> = Vec::with_capacity(channels.len());
    for &captured in channels {
        let attached = RedirectGuard::acquire(captured)
            .and_then(|guard| guard.attach(writer).map(|()| guard))
            .with_context(|| format!("Failed to redirect {captured}"));
        match attached {
            Ok(guard) => guards.push(guard),
            Err(e) => {
                for guard in &guards {
                    guard.detach(writer);
                }
                return Err(e);
            }
        }
    }
    Ok(guards)
}

async fn run_child(program: &str, args: &[String]) -> Result<i32> {
    let start = Instant::now();
    info!(%program, ?args, "launching child process");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to spawn {program}"))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow::anyhow!("Failed to capture stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow::anyhow!("Failed to capture stderr"))?;

    let stdout_handle = tokio::spawn(forward_lines(stdout, Channel::Stdout.sink()));
    let stderr_handle = tokio::spawn(forward_lines(stderr, Channel::Stderr.sink()));

    let status = child
        .wait()
        .await
        .context("Failed to wait for child process")?;
    let forwarded_out = stdout_handle.await.context("stdout forwarder failed")?;
    let forwarded_err = stderr_handle.await.context("stderr forwarder failed")?;

    debug!(
        %program,
        stdout_lines = forwarded_out,
        stderr_lines = forwarded_err,
        elapsed = ?start.elapsed(),
        "child process finished"
    );
    Ok(exit_code(status))
}

/// Copy `stream` line by line onto `sink`, returning the number of lines.
///
/// Invalid UTF-8 is replaced rather than ending the copy.
async fn forward_lines(stream: impl AsyncRead + Unpin, sink: Arc<StreamSink>) -> usize {
    let mut reader = BufReader::new(stream);
    let mut buf: Vec<u8> = Vec::with_capacity(1024);
    let mut count = 0;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                }
                let line = String::from_utf8_lossy(&buf);
                if let Err(e) = sink.write_line(&line) {
                    debug!(error = %e, "dropping forwarded line");
                }
                count += 1;
            }
            Err(e) => {
                debug!(error = %e, "child stream reader exiting due to read error");
                break;
            }
        }
    }
    count
}

#[cfg(unix)]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
