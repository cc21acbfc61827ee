//! External filter execution for `Through`

use std::io::{Read, Write};
use std::process::{Command, Stdio};

use log::debug;

use crate::error::{Result, Status};

/// Runs `command` under `sh -c`, feeding it `input` on stdin and
/// returning its stdout. A non-zero exit maps to an external-command
/// error.
pub fn filter_through(input: &[u8], command: &str) -> Result<Vec<u8>> {
    debug!("filtering {} bytes through: {command}", input.len());

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|_| Status::ExternalCommandError)?;

    // Feed stdin from a helper thread so a filter that writes before
    // reading everything cannot deadlock the pipe pair.
    let mut stdin = child.stdin.take().expect("piped stdin");
    let payload = input.to_vec();
    let writer = std::thread::spawn(move || {
        let _ = stdin.write_all(&payload);
    });

    let mut output = Vec::new();
    let mut stdout = child.stdout.take().expect("piped stdout");
    stdout
        .read_to_end(&mut output)
        .map_err(|_| Status::ExternalCommandError)?;
    let _ = writer.join();

    let status = child.wait().map_err(|_| Status::ExternalCommandError)?;
    if !status.success() {
        return Err(Status::ExternalCommandError);
    }
    Ok(output)
}
