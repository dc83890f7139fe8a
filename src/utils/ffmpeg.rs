//! Running ffmpeg and ffprobe

use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;

use crate::error::{DubError, Result};

/// Lines of stderr kept in error messages
const STDERR_TAIL_LINES: usize = 12;

/// Resolve a media tool on `PATH` (or accept an explicit path)
pub fn locate_tool(program: &str) -> Result<PathBuf> {
    which::which(program).map_err(|_| {
        DubError::Configuration(format!(
            "{} not found. Please install it and make sure it is in PATH",
            program
        ))
    })
}

/// Last lines of a process' stderr
pub fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Run `program` with `args` and return its stdout.
///
/// A non-zero exit becomes a [`DubError::Composition`] carrying the tail of
/// the tool's stderr.
pub async fn run_tool<I, S>(program: &str, args: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<std::ffi::OsString> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
    log::debug!(
        "Running {} {}",
        program,
        args.iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    );

    let output = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| DubError::Composition(format!("Failed to start {}: {}", program, e)))?;

    if !output.status.success() {
        let tail = stderr_tail(&output.stderr);
        log::error!("{} exited with {}: {}", program, output.status, tail);
        return Err(DubError::Composition(format!(
            "{} exited with {}: {}",
            program, output.status, tail
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
