//! Actionable typed errors for tdconv.
//!
//! Each error variant includes enough context for the operator to understand
//! what went wrong and what to do next. Collaborators propagate `anyhow`
//! errors internally; the public API exposes these `thiserror` types.
//!
//! No variant ever renders API credentials, proxy secrets or session key
//! material. Detail that might contain them is logged on the
//! [`SENSITIVE_TARGET`] tracing target instead.

use std::path::PathBuf;

/// Tracing target for diagnostics that may carry secrets.
///
/// The CLI turns this target off unless `--log-sensitive` is given.
pub const SENSITIVE_TARGET: &str = "tdconv::sensitive";

/// Canonical proxy format shown to the operator on every proxy error.
pub const PROXY_FORMAT_HINT: &str = "login:password@ip:port or ip:port";

/// Proxy text did not satisfy the grammar or the port range.
///
/// The rejected text is deliberately not stored: it may contain a password.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "Invalid proxy ({reason}). Please enter proxy in format {hint}",
    hint = PROXY_FORMAT_HINT
)]
pub struct ProxyFormatError {
    pub reason: &'static str,
}

/// Terminal failures of the session resolver.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    /// The artifact did not exist; no load attempt was made.
    #[error("Session file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The direct load failed and the artifact could not be read as text.
    #[error("Session file {} could not be read as a session string: {detail}", path.display())]
    UnreadableArtifact { path: PathBuf, detail: String },

    /// Neither the direct load nor the string fallback produced a session.
    #[error(
        "Unable to initialize session from {}. Please check the session file or API credentials.",
        path.display()
    )]
    InvalidCredentialsOrSession { path: PathBuf },
}

/// Errors that tdconv surfaces to the caller.
///
/// Every variant renders an operator-facing message *and* maps to a stable
/// JSON `error_type` string via [`ConversionError::error_type`].
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// Request fields violate their invariants (API id, API hash).
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Session artifact does not exist.
    #[error("Session file not found: {}. Please check the file path.", path.display())]
    NotFound { path: PathBuf },

    /// Proxy text failed the grammar or port range check.
    #[error(transparent)]
    InvalidProxyFormat(#[from] ProxyFormatError),

    /// Both the direct load and the string fallback failed.
    #[error("{source}")]
    SessionInitializationFailed {
        path: PathBuf,
        #[source]
        source: ResolutionError,
    },

    /// Destination directory could not be created.
    #[error("Failed to create output directory {}: {source}", path.display())]
    IoFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The external transcoder failed after the session was resolved.
    #[error(
        "Failed to convert session to tdata at {}. Please try again or check the logs.",
        destination.display()
    )]
    TranscodeFailed { destination: PathBuf },

    /// Anything that matches no other kind. `detail` is only ever logged.
    #[error("An unexpected error occurred. Please check the logs for details.")]
    Unexpected { detail: String },
}

impl ConversionError {
    /// Stable machine-readable kind, used by `--json` output.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::NotFound { .. } => "not_found",
            Self::InvalidProxyFormat(_) => "invalid_proxy_format",
            Self::SessionInitializationFailed { .. } => "session_initialization_failed",
            Self::IoFailure { .. } => "io_failure",
            Self::TranscodeFailed { .. } => "transcode_failed",
            Self::Unexpected { .. } => "unexpected",
        }
    }
}

impl From<ResolutionError> for ConversionError {
    fn from(source: ResolutionError) -> Self {
        match source {
            ResolutionError::NotFound { path } => Self::NotFound { path },
            ResolutionError::UnreadableArtifact { ref path, .. }
            | ResolutionError::InvalidCredentialsOrSession { ref path } => {
                Self::SessionInitializationFailed {
                    path: path.clone(),
                    source,
                }
            }
        }
    }
}
