//! `Gemfile.lock` inspection.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

pub const CALABASH_CUCUMBER_GEM: &str = "calabash-cucumber";

const LOCKFILE_NAME: &str = "Gemfile.lock";

#[derive(Error, Debug)]
pub enum GemfileError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to check if {path} exists, error: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn calabash_spec_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"calabash-cucumber \((.+)\)").expect("static pattern is valid")
    })
}

/// Extracts the locked `calabash-cucumber` version from lockfile content.
///
/// Only the first `specs:` block is searched: collection starts at the first
/// line containing `specs:` and the scan ends at the first blank line.
pub fn calabash_cucumber_version_from_lock(content: &str) -> Option<String> {
    content
        .lines()
        .take_while(|line| !line.trim().is_empty())
        .skip_while(|line| !line.contains("specs:"))
        .find_map(|line| {
            calabash_spec_pattern()
                .captures(line)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        })
}

/// Reads a lockfile and extracts the locked `calabash-cucumber` version.
pub fn calabash_cucumber_version_from_lock_file(
    path: &Path,
) -> Result<Option<String>, GemfileError> {
    let content = std::fs::read_to_string(path).map_err(|source| GemfileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(calabash_cucumber_version_from_lock(&content))
}

/// Whether `path` exists. Only a missing path counts as absent; any other
/// failure to stat it is an error.
pub fn file_exists(path: &Path) -> Result<bool, GemfileError> {
    path.try_exists().map_err(|source| GemfileError::Stat {
        path: path.to_path_buf(),
        source,
    })
}

/// The `Gemfile.lock` that sits next to `gemfile`.
pub fn lockfile_for(gemfile: &Path) -> PathBuf {
    gemfile
        .parent()
        .map(|dir| dir.join(LOCKFILE_NAME))
        .unwrap_or_else(|| PathBuf::from(LOCKFILE_NAME))
}
