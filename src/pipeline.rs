//! Conversion pipeline orchestrator.
//!
//! Ties existence checking, session resolution, destination naming, output
//! directory creation and transcoding into a single `convert()` call. Generic
//! over the [`SessionLoader`] and [`Transcoder`] traits; concrete backends are
//! wired in by the caller.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::backends::{SessionLoader, Transcoder};
use crate::error::{ConversionError, SENSITIVE_TARGET};
use crate::model::{ConversionResult, SessionRequest};
use crate::resolver::{Resolution, SessionResolver};

/// Suffix appended to the artifact stem to name the destination directory.
pub const DESTINATION_SUFFIX: &str = "_tdata";

/// Directory inside the destination that the transcoder writes into.
pub const TDATA_DIR: &str = "tdata";

/// Top-level orchestrator for session conversion.
pub struct Converter {
    loader: Box<dyn SessionLoader>,
    transcoder: Box<dyn Transcoder>,
}

/// Per-call options that are not part of the request itself.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Parent of the `<stem>_tdata` directory. Defaults to the artifact's
    /// own directory.
    pub output_dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Destination naming and materialization
// ---------------------------------------------------------------------------

/// Compute `<output_dir>/<artifact stem>_tdata`.
///
/// `output_dir` defaults to the artifact's parent directory. Pure: the same
/// inputs always give the same path.
pub fn destination_for(
    artifact: &Path,
    output_dir: Option<&Path>,
) -> Result<PathBuf, ConversionError> {
    let stem = artifact
        .file_stem()
        .ok_or_else(|| ConversionError::Unexpected {
            detail: format!("cannot derive a file stem from {}", artifact.display()),
        })?;
    let mut name = OsString::from(stem);
    name.push(DESTINATION_SUFFIX);

    let parent = match output_dir {
        Some(dir) => dir,
        None => artifact.parent().unwrap_or(Path::new("")),
    };
    Ok(parent.join(name))
}

/// Create `path` and any missing parents. Already existing is not an error.
pub fn ensure_directory(path: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(path)?;
    debug!(path = %path.display(), "output directory ready");
    Ok(())
}

// ---------------------------------------------------------------------------
// Pipeline orchestrator
// ---------------------------------------------------------------------------

impl Converter {
    pub fn new(loader: Box<dyn SessionLoader>, transcoder: Box<dyn Transcoder>) -> Self {
        Self { loader, transcoder }
    }

    /// Resolver backed by this converter's loader.
    pub fn resolver(&self) -> SessionResolver<'_> {
        SessionResolver::new(self.loader.as_ref())
    }

    /// Run only the existence check and the resolver.
    pub fn inspect(&self, request: &SessionRequest) -> Result<Resolution, ConversionError> {
        let path = request.artifact_path();
        if !path.exists() {
            return Err(ConversionError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Ok(self.resolver().resolve_traced(path, &request.client)?)
    }

    /// Run the full check → resolve → name → materialize → transcode pipeline.
    pub fn convert(
        &self,
        request: &SessionRequest,
        opts: &ConvertOptions,
    ) -> Result<ConversionResult, ConversionError> {
        let path = request.artifact_path();

        // 1. Existence, before any session logic.
        if !path.exists() {
            error!(path = %path.display(), "session file not found");
            return Err(ConversionError::NotFound {
                path: path.to_path_buf(),
            });
        }

        match &request.client.proxy {
            Some(proxy) => info!(proxy = %proxy.redacted(), "using proxy"),
            None => info!("no proxy configured"),
        }

        // 2. Resolve the session.
        let handle = self
            .resolver()
            .resolve(path, &request.client)
            .inspect_err(|e| error!(path = %path.display(), error = %e, "session initialization failed"))?;
        let mode = handle.mode;

        // 3. Destination.
        let destination = destination_for(path, opts.output_dir.as_deref()).inspect_err(|e| {
            if let ConversionError::Unexpected { detail } = e {
                error!(detail, "unexpected error while naming destination");
            }
        })?;

        // 4. Materialize.
        ensure_directory(&destination).map_err(|source| {
            error!(path = %destination.display(), error = %source, "failed to create output directory");
            ConversionError::IoFailure {
                path: destination.clone(),
                source,
            }
        })?;

        // 5. Transcode, exactly once.
        let target = destination.join(TDATA_DIR);
        if let Err(e) = self.transcoder.transcode(handle, &request.client, &target) {
            error!(
                transcoder = self.transcoder.name(),
                destination = %destination.display(),
                "conversion to tdata failed"
            );
            debug!(target: SENSITIVE_TARGET, error = ?e, "transcoder error detail");
            return Err(ConversionError::TranscodeFailed { destination });
        }

        info!(destination = %destination.display(), %mode, "tdata saved");
        Ok(ConversionResult {
            output_directory: destination,
            mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_defaults_to_artifact_directory() {
        let dest = destination_for(Path::new("/data/accounts/alice.session"), None).expect("dest");
        assert_eq!(dest, PathBuf::from("/data/accounts/alice_tdata"));
    }

    #[test]
    fn destination_uses_explicit_output_dir() {
        let dest = destination_for(
            Path::new("/data/accounts/alice.session"),
            Some(Path::new("/srv/out")),
        )
        .expect("dest");
        assert_eq!(dest, PathBuf::from("/srv/out/alice_tdata"));
    }

    #[test]
    fn destination_strips_only_last_extension() {
        let dest = destination_for(Path::new("/x/bob.backup.session"), None).expect("dest");
        assert_eq!(dest, PathBuf::from("/x/bob.backup_tdata"));

        let dest = destination_for(Path::new("/x/plain"), None).expect("dest");
        assert_eq!(dest, PathBuf::from("/x/plain_tdata"));
    }

    #[test]
    fn destination_of_bare_file_name_is_relative() {
        let dest = destination_for(Path::new("alice.session"), None).expect("dest");
        assert_eq!(dest, PathBuf::from("alice_tdata"));
    }

    #[test]
    fn destination_without_stem_is_unexpected() {
        let err = destination_for(Path::new("/"), None).expect_err("no stem");
        assert_eq!(err.error_type(), "unexpected");
    }

    #[test]
    fn ensure_directory_is_idempotent() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let nested = tmp.path().join("a/b/c_tdata");
        ensure_directory(&nested).expect("first create");
        ensure_directory(&nested).expect("second create");
        assert!(nested.is_dir());
    }

    #[test]
    fn ensure_directory_fails_on_file_conflict() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let conflict = tmp.path().join("taken");
        std::fs::write(&conflict, b"x").expect("write");
        assert!(ensure_directory(&conflict).is_err());
        assert!(ensure_directory(&conflict.join("child")).is_err());
    }
}
