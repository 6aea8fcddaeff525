//! Collaborator traits and their bundled implementations.
//!
//! The orchestrator only talks to two seams:
//!
//! - [`SessionLoader`] opens a session artifact, either directly from its
//!   native binary storage or from a portable string token.
//! - [`Transcoder`] takes a resolved session and writes the target client's
//!   `tdata` layout. It is the single opaque network-bound step.
//!
//! [`telethon::TelethonLoader`] implements the loader natively;
//! [`external::CommandTranscoder`] delegates transcoding to an external
//! program.

pub mod external;
pub mod telethon;

use std::path::Path;

use crate::model::{AuthSession, ClientParams, SessionHandle};

/// Opens session artifacts.
///
/// Object-safe so the converter can hold a `Box<dyn SessionLoader>`.
pub trait SessionLoader: Send + Sync {
    /// Short name used in logs (e.g. `"telethon"`).
    fn name(&self) -> &str;

    /// Open `path` as a directly loadable binary-backed session.
    fn load_file(&self, path: &Path, client: &ClientParams) -> anyhow::Result<AuthSession>;

    /// Build a session from a portable string token (already trimmed).
    fn load_string(&self, token: &str, client: &ClientParams) -> anyhow::Result<AuthSession>;
}

/// Writes a resolved session out in the target client's storage format.
pub trait Transcoder: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Convert `session` and write it under `target` (the `.../tdata` dir).
    ///
    /// Called at most once per request and never retried: a failed attempt
    /// may have invalidated the session on the remote side.
    fn transcode(
        &self,
        session: SessionHandle,
        client: &ClientParams,
        target: &Path,
    ) -> anyhow::Result<()>;
}
