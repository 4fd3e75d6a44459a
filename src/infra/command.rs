//! # Command Execution Module / 命令执行模块
//!
//! Spawns external processes and captures their combined stdout and stderr
//! line by line.
//!
//! 派生外部进程并逐行捕获其合并后的 stdout 和 stderr。

use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;
use tracing::debug;

/// The result of a finished process.
#[derive(Debug)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    /// Interleaved stdout and stderr lines, in arrival order.
    pub lines: Vec<String>,
}

impl CapturedOutput {
    /// The exit code, or `-1` when the process was terminated by a signal.
    pub fn exit_code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }
}

/// Spawns a command and captures its stdout and stderr.
/// Both streams are read concurrently and merged into a single line sequence;
/// `on_line` is invoked for every line as soon as it arrives.
///
/// # Arguments
/// * `cmd` - The `tokio::process::Command` to execute.
/// * `on_line` - Called with each captured line, in arrival order.
///
/// # Returns
/// The exit status and all captured lines, or the I/O error raised while
/// spawning or waiting on the process.
///
/// 派生一个命令，捕获其 stdout 和 stderr。
/// 两个输出流被并发读取并合并为一个行序列；每一行到达时都会调用 `on_line`。
pub async fn spawn_and_capture<F>(
    mut cmd: tokio::process::Command,
    mut on_line: F,
) -> std::io::Result<CapturedOutput>
where
    F: FnMut(&str) + Send,
{
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("Failed to capture stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("Failed to capture stderr"))?;

    let stdout_lines = LinesStream::new(BufReader::new(stdout).lines());
    let stderr_lines = LinesStream::new(BufReader::new(stderr).lines());
    let mut merged = stdout_lines.merge(stderr_lines);

    let mut lines = Vec::new();
    while let Some(line) = merged.next().await {
        match line {
            Ok(line) => {
                let line = line.trim_end().to_string();
                on_line(&line);
                lines.push(line);
            }
            // Non UTF-8 output; the offending bytes are consumed, keep reading.
            Err(e) => debug!(error = %e, "Skipping unreadable output line"),
        }
    }

    let status = child.wait().await?;
    Ok(CapturedOutput { status, lines })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_both_streams() {
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg("echo out; echo err 1>&2; exit 3");

        let mut seen = 0;
        let captured = spawn_and_capture(cmd, |_| seen += 1).await.unwrap();

        assert_eq!(captured.exit_code(), 3);
        assert_eq!(seen, 2);
        assert!(captured.lines.contains(&"out".to_string()));
        assert!(captured.lines.contains(&"err".to_string()));
    }

    #[tokio::test]
    async fn missing_program_is_not_found() {
        let cmd = tokio::process::Command::new("definitely-not-a-real-program-12345");
        let err = spawn_and_capture(cmd, |_| {}).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
