//! Bounded shellouts to local CLIs (yt-dlp).
//!
//! Every run has a wall-clock timeout and a stdout cap; a child that overruns is killed.
//! Errors are short stable codes; callers decide what to surface.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

pub fn which(bin: &str) -> Option<PathBuf> {
    let candidate = std::path::Path::new(bin);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let cand = dir.join(bin);
        if cand.is_file() {
            return Some(cand);
        }
        if cfg!(windows) {
            let cand = dir.join(format!("{bin}.exe"));
            if cand.is_file() {
                return Some(cand);
            }
        }
    }
    None
}

pub fn has(bin: &str) -> bool {
    which(bin).is_some()
}

fn spawn(cmd: &mut Command) -> Result<Child, &'static str> {
    cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            "shellout_tool_not_found"
        } else {
            "shellout_spawn_failed"
        }
    })
}

fn wait_bounded(child: &mut Child, timeout: Duration) -> Result<(), &'static str> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().map_err(|_| "shellout_wait_failed")? {
            if !status.success() {
                return Err("shellout_nonzero_exit");
            }
            return Ok(());
        }
        if start.elapsed() > timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err("shellout_timeout");
        }
        std::thread::sleep(Duration::from_millis(25));
    }
}

/// Run a command and capture its stdout, keeping at most `max_stdout_bytes`.
///
/// Stdout is drained on a helper thread so a chatty child never blocks on a full pipe.
pub fn run_stdout_bounded(
    mut cmd: Command,
    timeout: Duration,
    max_stdout_bytes: usize,
) -> Result<Vec<u8>, &'static str> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    let mut child = spawn(&mut cmd)?;

    let reader = child.stdout.take().map(|mut s| {
        std::thread::spawn(move || {
            let mut kept = Vec::new();
            let mut buf = [0u8; 8192];
            loop {
                match s.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let room = max_stdout_bytes.saturating_sub(kept.len());
                        kept.extend_from_slice(&buf[..n.min(room)]);
                    }
                }
            }
            kept
        })
    });

    let waited = wait_bounded(&mut child, timeout);
    let out = match reader {
        Some(h) => h.join().map_err(|_| "shellout_read_failed")?,
        None => Vec::new(),
    };
    waited?;
    Ok(out)
}

/// Run a command for its side effects only (stdout and stderr discarded).
pub fn run_bounded(mut cmd: Command, timeout: Duration) -> Result<(), &'static str> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    let mut child = spawn(&mut cmd)?;
    wait_bounded(&mut child, timeout)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut c = Command::new("sh");
        c.arg("-c").arg(script);
        c
    }

    #[test]
    fn captures_stdout() {
        let out = run_stdout_bounded(sh("printf hello"), Duration::from_secs(5), 1024).unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn stdout_is_capped_without_blocking_the_child() {
        // 200 KiB exceeds a pipe buffer; the child must still exit.
        let out = run_stdout_bounded(
            sh("head -c 204800 /dev/zero"),
            Duration::from_secs(10),
            1000,
        )
        .unwrap();
        assert_eq!(out.len(), 1000);
    }

    #[test]
    fn nonzero_exit_and_timeout_are_reported() {
        assert_eq!(
            run_bounded(sh("exit 3"), Duration::from_secs(5)),
            Err("shellout_nonzero_exit")
        );
        assert_eq!(
            run_bounded(sh("sleep 5"), Duration::from_millis(100)),
            Err("shellout_timeout")
        );
    }

    #[test]
    fn missing_tool_is_reported() {
        let cmd = Command::new("websift-definitely-not-a-real-binary");
        assert_eq!(
            run_bounded(cmd, Duration::from_secs(1)),
            Err("shellout_tool_not_found")
        );
        assert!(!has("websift-definitely-not-a-real-binary"));
        assert!(has("sh"));
    }
}
