//! Bounded subprocess capture shared by the shell, ssh, and git tools.
//!
//! Each stream is read into its own buffer capped at 1 MiB. Hitting the cap
//! kills the subprocess — a runaway producer must not stall the agent loop
//! on a full pipe.

use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Per-stream capture cap.
pub(crate) const MAX_CAPTURE: usize = 1024 * 1024;

/// Result-string cap for command-flavored tools.
pub(crate) const MAX_RESULT: usize = 10_000;

pub(crate) const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub(crate) const MAX_TIMEOUT_MS: u64 = 120_000;

/// What happened to a captured subprocess.
pub(crate) struct Capture {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub overflowed: bool,
}

/// Spawn `command` and capture both streams, bounded by `timeout_ms`.
pub(crate) async fn run(mut command: Command, timeout_ms: u64) -> Result<Capture, String> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|e| format!("Failed to spawn process: {e}"))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| "Failed to open stdout pipe".to_string())?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| "Failed to open stderr pipe".to_string())?;

    let work = async {
        let (out, err) = tokio::join!(read_capped(stdout), read_capped(stderr));
        let overflowed = out.1 || err.1;
        if overflowed {
            return (out.0, err.0, None, true);
        }
        let exit_code = child.wait().await.ok().and_then(|s| s.code());
        (out.0, err.0, exit_code, false)
    };

    // Bind before matching so the work future (and its borrow of `child`)
    // is dropped before the kill paths below.
    let result = tokio::time::timeout(std::time::Duration::from_millis(timeout_ms), work).await;
    match result {
        Ok((stdout, stderr, exit_code, overflowed)) => {
            if overflowed {
                let _ = child.kill().await;
            }
            Ok(Capture {
                stdout,
                stderr,
                exit_code,
                timed_out: false,
                overflowed,
            })
        }
        Err(_) => {
            let _ = child.kill().await;
            Ok(Capture {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: None,
                timed_out: true,
                overflowed: false,
            })
        }
    }
}

/// Read a stream until EOF or the capture cap; the bool reports overflow.
async fn read_capped(mut reader: impl tokio::io::AsyncRead + Unpin) -> (String, bool) {
    let mut buf = Vec::with_capacity(8 * 1024);
    let mut chunk = [0u8; 8 * 1024];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.len() > MAX_CAPTURE {
                    buf.truncate(MAX_CAPTURE);
                    return (String::from_utf8_lossy(&buf).into_owned(), true);
                }
            }
            Err(_) => break,
        }
    }
    (String::from_utf8_lossy(&buf).into_owned(), false)
}

/// Truncate to at most `max` bytes on a char boundary.
pub(crate) fn truncate_bytes(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Merge stdout and stderr behind a separator, capped at `MAX_RESULT`.
pub(crate) fn merge_output(stdout: &str, stderr: &str) -> String {
    let merged = if stderr.trim().is_empty() {
        stdout.trim_end().to_string()
    } else {
        format!("{}\n--- stderr ---\n{}", stdout.trim_end(), stderr.trim_end())
    };
    truncate_bytes(&merged, MAX_RESULT)
}

/// Clamp a requested timeout into the allowed window.
pub(crate) fn clamp_timeout(requested_ms: u64) -> u64 {
    requested_ms.min(MAX_TIMEOUT_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", script]);
        cmd
    }

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let capture = run(sh("echo hello"), 5_000).await.unwrap();
        assert_eq!(capture.stdout.trim(), "hello");
        assert_eq!(capture.exit_code, Some(0));
        assert!(!capture.timed_out);
        assert!(!capture.overflowed);
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported() {
        let capture = run(sh("exit 3"), 5_000).await.unwrap();
        assert_eq!(capture.exit_code, Some(3));
    }

    #[tokio::test]
    async fn timeout_kills_the_process() {
        let capture = run(sh("sleep 30"), 200).await.unwrap();
        assert!(capture.timed_out);
    }

    #[tokio::test]
    async fn overflow_kills_the_process() {
        // Produce well over the 1 MiB cap from /dev/zero.
        let capture = run(sh("head -c 5000000 /dev/zero | tr '\\0' 'x'"), 30_000)
            .await
            .unwrap();
        assert!(capture.overflowed);
        assert!(capture.stdout.len() <= MAX_CAPTURE);
    }

    #[test]
    fn merge_respects_result_cap() {
        let merged = merge_output(&"a".repeat(20_000), "");
        assert!(merged.len() <= MAX_RESULT);

        let with_err = merge_output("out", "err");
        assert!(with_err.contains("--- stderr ---"));
    }

    #[test]
    fn truncate_is_char_boundary_safe() {
        let s = "héllo".repeat(10);
        let t = truncate_bytes(&s, 7);
        assert!(t.len() <= 7);
        assert!(s.starts_with(&t));
    }

    #[test]
    fn timeout_clamping() {
        assert_eq!(clamp_timeout(500), 500);
        assert_eq!(clamp_timeout(999_999), MAX_TIMEOUT_MS);
    }
}
