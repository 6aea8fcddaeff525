//! Batch input expansion.
//!
//! Operators usually point tdconv at a folder full of accounts. This module
//! turns the CLI's path arguments into an ordered, de-duplicated list of
//! session artifacts and detects artifacts that would share a destination
//! directory, since the core provides no cross-request locking.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::pipeline::destination_for;

/// Extension of session artifacts picked up from directories.
pub const SESSION_EXTENSION: &str = "session";

/// Two or more artifacts deriving the same destination directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationConflict {
    pub destination: PathBuf,
    pub artifacts: Vec<PathBuf>,
}

/// Expand `inputs` into session artifacts.
///
/// - A file (or a path that does not exist) is kept as given, whatever its
///   extension; missing paths surface later as `NotFound`.
/// - A directory contributes its `*.session` files, sorted by path; nested
///   directories are only walked when `recursive` is set.
///
/// Order follows `inputs`; duplicates keep their first position.
pub fn collect_artifacts(inputs: &[PathBuf], recursive: bool) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut artifacts = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let max_depth = if recursive { usize::MAX } else { 1 };
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .max_depth(max_depth)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|path| is_session_file(path))
                .collect();
            found.sort();
            debug!(dir = %input.display(), count = found.len(), "scanned directory");
            for path in found {
                if seen.insert(path.clone()) {
                    artifacts.push(path);
                }
            }
        } else if seen.insert(input.clone()) {
            trace!(path = %input.display(), "explicit artifact");
            artifacts.push(input.clone());
        }
    }

    artifacts
}

fn is_session_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(SESSION_EXTENSION))
}

/// Group artifacts by derived destination and report every shared one.
///
/// Artifacts that do not exist, or whose destination cannot be derived, never
/// write anything; they are left out here and fail on their own during
/// conversion.
pub fn find_destination_conflicts(
    artifacts: &[PathBuf],
    output_dir: Option<&Path>,
) -> Vec<DestinationConflict> {
    let mut by_destination: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    for artifact in artifacts {
        if !artifact.exists() {
            trace!(path = %artifact.display(), "missing artifact skipped in conflict check");
            continue;
        }
        let destination = match destination_for(artifact, output_dir) {
            Ok(destination) => destination,
            Err(e) => {
                debug!(path = %artifact.display(), error = %e, "no destination for artifact");
                continue;
            }
        };
        by_destination
            .entry(destination)
            .or_default()
            .push(artifact.clone());
    }

    by_destination
        .into_iter()
        .filter(|(_, artifacts)| artifacts.len() > 1)
        .map(|(destination, artifacts)| DestinationConflict {
            destination,
            artifacts,
        })
        .collect()
}
