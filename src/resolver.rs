//! Session resolution: decide how an artifact must be loaded.
//!
//! The same artifact path may hold either a binary session database or a
//! bare portable token. Resolution is a two-state machine:
//!
//! 1. [`ResolveState::TryDirect`]: open the artifact as a binary session.
//!    Success resolves to [`LoadMode::FileBacked`]. Any failure is expected
//!    for token artifacts, so it is logged and the machine moves on.
//! 2. [`ResolveState::TryStringFallback`]: read the artifact as text, trim
//!    it, and build a session from the token. Success resolves to
//!    [`LoadMode::StringBacked`]; failure is terminal.
//!
//! Each state runs at most once and strictly in order.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::backends::SessionLoader;
use crate::error::{ResolutionError, SENSITIVE_TARGET};
use crate::model::{ClientParams, LoadMode, SessionHandle};

/// States of the resolution machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveState {
    TryDirect,
    TryStringFallback,
}

impl ResolveState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TryDirect => "direct",
            Self::TryStringFallback => "string_fallback",
        }
    }
}

/// A resolved handle plus the states visited to get it.
#[derive(Debug)]
pub struct Resolution {
    pub handle: SessionHandle,
    pub attempts: Vec<ResolveState>,
}

/// Outcome of a single state.
enum Step {
    Next(ResolveState),
    Resolved(SessionHandle),
    Failed(ResolutionError),
}

/// Resolves artifact paths into session handles using a [`SessionLoader`].
pub struct SessionResolver<'a> {
    loader: &'a dyn SessionLoader,
}

impl<'a> SessionResolver<'a> {
    pub fn new(loader: &'a dyn SessionLoader) -> Self {
        Self { loader }
    }

    /// Resolve `path` into a handle.
    pub fn resolve(
        &self,
        path: &Path,
        client: &ClientParams,
    ) -> Result<SessionHandle, ResolutionError> {
        self.resolve_traced(path, client).map(|r| r.handle)
    }

    /// Like [`resolve`](Self::resolve), also reporting which states ran.
    pub fn resolve_traced(
        &self,
        path: &Path,
        client: &ClientParams,
    ) -> Result<Resolution, ResolutionError> {
        if !path.exists() {
            return Err(ResolutionError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let mut attempts = Vec::with_capacity(2);
        let mut state = ResolveState::TryDirect;
        loop {
            attempts.push(state);
            let step = match state {
                ResolveState::TryDirect => self.try_direct(path, client),
                ResolveState::TryStringFallback => self.try_string(path, client),
            };
            match step {
                Step::Next(next) => state = next,
                Step::Resolved(handle) => {
                    info!(
                        path = %path.display(),
                        mode = %handle.mode,
                        loader = self.loader.name(),
                        "session resolved"
                    );
                    return Ok(Resolution { handle, attempts });
                }
                Step::Failed(e) => return Err(e),
            }
        }
    }

    fn try_direct(&self, path: &Path, client: &ClientParams) -> Step {
        match self.loader.load_file(path, client) {
            Ok(session) => Step::Resolved(SessionHandle {
                mode: LoadMode::FileBacked,
                session,
            }),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "direct session load failed; trying session string"
                );
                Step::Next(ResolveState::TryStringFallback)
            }
        }
    }

    fn try_string(&self, path: &Path, client: &ClientParams) -> Step {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                return Step::Failed(ResolutionError::UnreadableArtifact {
                    path: path.to_path_buf(),
                    detail: e.to_string(),
                });
            }
        };
        let token = text.trim();
        debug!(path = %path.display(), len = token.len(), "session string read");

        match self.loader.load_string(token, client) {
            Ok(session) => Step::Resolved(SessionHandle {
                mode: LoadMode::StringBacked,
                session,
            }),
            Err(e) => {
                debug!(target: SENSITIVE_TARGET, error = ?e, "session string rejected");
                warn!(path = %path.display(), "session string fallback failed");
                Step::Failed(ResolutionError::InvalidCredentialsOrSession {
                    path: path.to_path_buf(),
                })
            }
        }
    }
}
