//! Clipboard hand-off for rendered snapshots.

use std::io::{self, Write};
use std::process::{Command, Stdio};

use thiserror::Error;

const WL_COPY_COMMAND: &str = "wl-copy";
const MIME_IMAGE_PNG: &str = "image/png";

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("failed to run clipboard command {command}: {source}")]
    CommandIo {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("clipboard command {command} exited with non-zero status: {status}")]
    CommandFailed { command: String, status: String },
}

pub type ClipboardResult<T> = std::result::Result<T, ClipboardError>;

pub trait ClipboardBackend {
    fn copy_png(&self, png: &[u8]) -> ClipboardResult<()>;
}

/// Pipes PNG bytes into `wl-copy` with an image MIME type.
#[derive(Debug, Default)]
pub struct WlCopyBackend;

impl ClipboardBackend for WlCopyBackend {
    fn copy_png(&self, png: &[u8]) -> ClipboardResult<()> {
        pipe_to_command(WL_COPY_COMMAND, &["--type", MIME_IMAGE_PNG], png)
    }
}

fn pipe_to_command(command: &str, args: &[&str], payload: &[u8]) -> ClipboardResult<()> {
    let command_io = |source| ClipboardError::CommandIo {
        command: command.to_string(),
        source,
    };

    let mut child = Command::new(command)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(command_io)?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(payload).map_err(command_io)?;
    }

    let status = child.wait().map_err(command_io)?;
    if !status.success() {
        return Err(ClipboardError::CommandFailed {
            command: command.to_string(),
            status: status.to_string(),
        });
    }
    Ok(())
}
