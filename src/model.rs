//! Request-scoped value types shared by the resolver, the orchestrator and
//! the collaborator backends.
//!
//! Nothing here outlives a single conversion call. Types that hold secrets
//! (`AuthKey`, `ClientParams`) implement `Debug` by hand so that a stray
//! `{:?}` in a log line never leaks them.

use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ConversionError;
use crate::proxy::ProxyConfig;

/// Authorization key size in bytes (2048 bits).
pub const AUTH_KEY_SIZE: usize = 256;

// ---------------------------------------------------------------------------
// Session material
// ---------------------------------------------------------------------------

/// How a session handle was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// Opened directly from its native binary storage.
    FileBacked,
    /// Rebuilt from the artifact's text as a portable session token.
    StringBacked,
}

impl LoadMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FileBacked => "file_backed",
            Self::StringBacked => "string_backed",
        }
    }
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A 2048-bit authorization key. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthKey([u8; AUTH_KEY_SIZE]);

impl AuthKey {
    /// Build a key from raw bytes; `None` unless exactly [`AUTH_KEY_SIZE`] long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; AUTH_KEY_SIZE]>::try_from(bytes).ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; AUTH_KEY_SIZE] {
        &self.0
    }

    /// First 8 bytes of SHA-256 over the key, hex encoded. Safe to display.
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(self.0);
        digest[..8].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthKey({})", self.fingerprint())
    }
}

/// The authenticated identity carried by a session artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    /// Datacenter the key was negotiated with.
    pub dc_id: u8,
    pub server_address: IpAddr,
    pub port: u16,
    pub auth_key: AuthKey,
}

/// A resolved session, tagged with the mode that produced it.
///
/// Not `Clone`: the orchestrator hands it to the transcoder by value, exactly
/// once.
#[derive(Debug, PartialEq, Eq)]
pub struct SessionHandle {
    pub mode: LoadMode,
    pub session: AuthSession,
}

// ---------------------------------------------------------------------------
// Request / result
// ---------------------------------------------------------------------------

/// Credentials and transport settings handed to every collaborator call.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientParams {
    pub api_id: i32,
    pub api_hash: String,
    pub proxy: Option<ProxyConfig>,
}

impl fmt::Debug for ClientParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientParams")
            .field("api_id", &self.api_id)
            .field("api_hash", &"<redacted>")
            .field("proxy", &self.proxy.as_ref().map(ProxyConfig::redacted))
            .finish()
    }
}

/// One conversion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    pub artifact_path: PathBuf,
    pub client: ClientParams,
}

impl SessionRequest {
    /// Build a request, enforcing `api_id > 0` and a non-blank `api_hash`.
    ///
    /// Artifact existence is checked by the orchestrator, not here.
    pub fn new(
        artifact_path: impl Into<PathBuf>,
        api_id: i32,
        api_hash: impl Into<String>,
        proxy: Option<ProxyConfig>,
    ) -> Result<Self, ConversionError> {
        if api_id <= 0 {
            return Err(ConversionError::InvalidRequest {
                reason: "API ID must be a positive integer".to_string(),
            });
        }
        let api_hash = api_hash.into();
        if api_hash.trim().is_empty() {
            return Err(ConversionError::InvalidRequest {
                reason: "API hash must not be empty".to_string(),
            });
        }
        Ok(Self {
            artifact_path: artifact_path.into(),
            client: ClientParams {
                api_id,
                api_hash,
                proxy,
            },
        })
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }
}

/// Outcome of a successful conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionResult {
    /// The `<stem>_tdata` directory.
    pub output_directory: PathBuf,
    /// How the session was loaded.
    pub mode: LoadMode,
}
