//! External-program transcoder.
//!
//! Writing the target client's storage format requires a live handshake with
//! the messaging network, which tdconv does not implement. This transcoder
//! hands the session to an external program instead:
//!
//! ```text
//! <program> --target <destination>/tdata
//!   env   TDCONV_API_ID, TDCONV_API_HASH, TDCONV_PROXY (optional URL)
//!   stdin portable session token + "\n"
//! ```
//!
//! Exit status 0 means success. Secrets travel through env and stdin only,
//! never argv, so they do not show up in process listings.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, bail};
use tracing::{debug, info, warn};

use crate::backends::Transcoder;
use crate::backends::telethon::encode_string_session;
use crate::error::SENSITIVE_TARGET;
use crate::model::{ClientParams, SessionHandle};

/// Program looked up on `PATH` when no explicit transcoder is configured.
pub const DEFAULT_TRANSCODER: &str = "tdata-transcoder";

/// Runs an external program once per conversion.
#[derive(Debug, Clone)]
pub struct CommandTranscoder {
    program: PathBuf,
}

impl CommandTranscoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Locate `program` (a bare name or a path) with `which`.
    ///
    /// Lookup failure is not fatal here: the conversion will fail later as a
    /// transcode failure, after the session has been resolved.
    pub fn locate(program: &str) -> Self {
        match which::which(program) {
            Ok(found) => {
                debug!(program, path = %found.display(), "transcoder located");
                Self::new(found)
            }
            Err(e) => {
                warn!(program, error = %e, "transcoder not found on PATH");
                Self::new(program)
            }
        }
    }
}

impl Transcoder for CommandTranscoder {
    fn name(&self) -> &str {
        "external"
    }

    fn transcode(
        &self,
        session: SessionHandle,
        client: &ClientParams,
        target: &Path,
    ) -> anyhow::Result<()> {
        let token = encode_string_session(&session.session);

        let mut cmd = Command::new(&self.program);
        cmd.arg("--target")
            .arg(target)
            .env("TDCONV_API_ID", client.api_id.to_string())
            .env("TDCONV_API_HASH", &client.api_hash)
            .env_remove("TDCONV_PROXY")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(proxy) = &client.proxy {
            cmd.env("TDCONV_PROXY", proxy.to_url());
        }

        info!(
            program = %self.program.display(),
            target = %target.display(),
            mode = %session.mode,
            "running transcoder"
        );
        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to start {}", self.program.display()))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A program that exits without reading stdin closes the pipe;
            // its exit status is what decides the outcome.
            if let Err(e) = writeln!(stdin, "{token}") {
                debug!(error = %e, "transcoder closed stdin early");
            }
        }

        let output = child
            .wait_with_output()
            .with_context(|| format!("failed to wait for {}", self.program.display()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!(target: SENSITIVE_TARGET, stdout = %stdout.trim(), "transcoder stdout");
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!(target: SENSITIVE_TARGET, stderr = %stderr.trim(), "transcoder stderr");
        }

        if !output.status.success() {
            bail!(
                "{} exited with {}",
                self.program.display(),
                output.status
            );
        }
        Ok(())
    }
}
