//! FFmpeg process management for reelgen.
//!
//! Spawns ffmpeg, streams its stderr into the log, and stops it cleanly
//! when the user presses Ctrl+C.

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::interrupt::ctrlc_received;

/// Stderr lines kept for error reports.
const STDERR_TAIL: usize = 20;

/// How long ffmpeg gets to finish after SIGINT before it is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Errors that can occur while running ffmpeg or ffprobe.
#[derive(Debug)]
pub enum FfmpegError {
    /// Executable not found on PATH
    NotFound(&'static str),
    SpawnFailed(std::io::Error),
    /// Process exited with non-zero status
    ProcessFailed {
        exit_code: Option<i32>,
        stderr: String,
    },
    /// Stopped by Ctrl+C
    Interrupted,
    /// ffprobe output could not be understood
    Probe(String),
    IoError(std::io::Error),
}

impl std::fmt::Display for FfmpegError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FfmpegError::NotFound(program) => write!(
                f,
                "{} not found. Install FFmpeg and make sure it is on your PATH",
                program
            ),
            FfmpegError::SpawnFailed(e) => write!(f, "Failed to spawn FFmpeg: {}", e),
            FfmpegError::ProcessFailed { exit_code, stderr } => {
                write!(f, "FFmpeg exited with code {:?}\n{}", exit_code, stderr)
            }
            FfmpegError::Interrupted => write!(f, "Render interrupted"),
            FfmpegError::Probe(msg) => write!(f, "ffprobe failed: {}", msg),
            FfmpegError::IoError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for FfmpegError {}

fn spawn_error(program: &'static str, e: std::io::Error) -> FfmpegError {
    if e.kind() == std::io::ErrorKind::NotFound {
        FfmpegError::NotFound(program)
    } else {
        FfmpegError::SpawnFailed(e)
    }
}

/// A running ffmpeg process.
pub struct FfmpegProcess {
    child: Child,
    stderr_thread: Option<JoinHandle<Vec<String>>>,
}

impl FfmpegProcess {
    /// Spawn ffmpeg with `args`, optionally inside `cwd`.
    pub fn spawn(args: &[String], cwd: Option<&Path>) -> Result<Self, FfmpegError> {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        log::debug!("ffmpeg {}", args.join(" "));

        let mut child = cmd.spawn().map_err(|e| spawn_error("ffmpeg", e))?;

        let stderr_thread = child.stderr.take().map(|stderr| {
            thread::spawn(move || {
                let reader = BufReader::new(stderr);
                let mut tail = Vec::new();
                for line in reader.lines() {
                    match line {
                        Ok(l) => {
                            log::debug!("[ffmpeg] {}", l);
                            if tail.len() == STDERR_TAIL {
                                tail.remove(0);
                            }
                            tail.push(l);
                        }
                        Err(_) => break,
                    }
                }
                tail
            })
        });

        Ok(Self {
            child,
            stderr_thread,
        })
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Ask ffmpeg to stop (SIGINT), then kill it if it is still running
    /// after the grace period.
    pub fn shutdown(&mut self) -> Result<ExitStatus, FfmpegError> {
        #[cfg(unix)]
        {
            unsafe {
                libc::kill(self.child.id() as i32, libc::SIGINT);
            }
        }

        #[cfg(not(unix))]
        {
            let _ = self.child.kill();
        }

        let start = Instant::now();
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {
                    if start.elapsed() > SHUTDOWN_GRACE {
                        let _ = self.child.kill();
                        return self.child.wait().map_err(FfmpegError::IoError);
                    }
                    thread::sleep(Duration::from_millis(50));
                }
                Err(e) => return Err(FfmpegError::IoError(e)),
            }
        }
    }

    /// Block until ffmpeg exits, stopping it early on Ctrl+C.
    pub fn wait(&mut self) -> Result<(), FfmpegError> {
        loop {
            if ctrlc_received() {
                log::warn!("Interrupt received, stopping ffmpeg");
                self.shutdown()?;
                return Err(FfmpegError::Interrupted);
            }
            match self.child.try_wait() {
                Ok(Some(status)) if status.success() => return Ok(()),
                Ok(Some(status)) => {
                    return Err(FfmpegError::ProcessFailed {
                        exit_code: status.code(),
                        stderr: self.take_stderr_output().join("\n"),
                    })
                }
                Ok(None) => thread::sleep(Duration::from_millis(100)),
                Err(e) => return Err(FfmpegError::IoError(e)),
            }
        }
    }

    /// The last stderr lines, once the process has finished.
    pub fn take_stderr_output(&mut self) -> Vec<String> {
        self.stderr_thread
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default()
    }
}

impl Drop for FfmpegProcess {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.shutdown();
        }
    }
}

/// Run ffmpeg to completion.
pub fn run_ffmpeg(args: &[String], cwd: Option<&Path>) -> Result<(), FfmpegError> {
    let mut process = FfmpegProcess::spawn(args, cwd)?;
    process.wait()
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse the container duration out of `ffprobe -print_format json -show_format`.
pub fn parse_probe_duration(json: &str) -> Result<f64, FfmpegError> {
    let output: ProbeOutput =
        serde_json::from_str(json).map_err(|e| FfmpegError::Probe(e.to_string()))?;
    let raw = output
        .format
        .duration
        .ok_or_else(|| FfmpegError::Probe("no duration in output".to_string()))?;
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| FfmpegError::Probe(format!("invalid duration '{}'", raw)))
}

/// Media duration in seconds.
pub fn probe_duration(path: &Path) -> Result<f64, FfmpegError> {
    let output = Command::new("ffprobe")
        .args(["-v", "error", "-print_format", "json", "-show_format"])
        .arg(path)
        .output()
        .map_err(|e| spawn_error("ffprobe", e))?;

    if !output.status.success() {
        return Err(FfmpegError::ProcessFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    parse_probe_duration(&String::from_utf8_lossy(&output.stdout))
}
