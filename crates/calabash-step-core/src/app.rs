//! Preparation of Xamarin `.app` bundles for the chosen simulator.
//!
//! A Xamarin build targeting `i386 + x86_64` ships both architecture slices
//! inside the bundle, under `.monotouch-32` and `.monotouch-64`. The simulator
//! only loads the slice that sits at the bundle root, so such an app is copied
//! to a scratch directory and the matching slice is laid over the copy.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

pub const MONOTOUCH_32_DIR: &str = ".monotouch-32";
pub const MONOTOUCH_64_DIR: &str = ".monotouch-64";

const SCRATCH_DIR_PREFIX: &str = "_calabash_ios_";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("app path has no file name: {0}")]
    InvalidAppPath(PathBuf),

    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to create tmp dir, error: {0}")]
    TempDir(#[source] std::io::Error),

    #[error("Failed to check if path ({path}) exist, error: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Whether the bundle carries both architecture slices.
pub fn is_fat_app(app: &Path) -> Result<bool, AppError> {
    Ok(is_dir(&app.join(MONOTOUCH_32_DIR))? && is_dir(&app.join(MONOTOUCH_64_DIR))?)
}

fn is_dir(path: &Path) -> Result<bool, AppError> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.is_dir()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(AppError::Stat {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Returns an app path the simulator can run, rebuilding fat bundles under a
/// fresh directory in the system temp dir.
pub fn prepare_app(app: &Path, is_64bit: bool) -> Result<PathBuf, AppError> {
    if !is_fat_app(app)? {
        return Ok(app.to_path_buf());
    }

    let scratch_name = format!("{}{}", SCRATCH_DIR_PREFIX, uuid::Uuid::new_v4());
    let scratch = std::env::temp_dir().join(scratch_name);
    fs::create_dir_all(&scratch).map_err(AppError::TempDir)?;
    prepare_app_in(app, is_64bit, &scratch)
}

/// Like [`prepare_app`], but places the rebuilt bundle under `scratch`.
pub fn prepare_app_in(app: &Path, is_64bit: bool, scratch: &Path) -> Result<PathBuf, AppError> {
    if !is_fat_app(app)? {
        return Ok(app.to_path_buf());
    }

    warn!("The .app file generated for 'i386 + x86_64' architecture");
    warn!("Simulator is 64-bit architecture: {}", is_64bit);

    let app_name = app
        .file_name()
        .ok_or_else(|| AppError::InvalidAppPath(app.to_path_buf()))?;
    let new_app = scratch.join(app_name);

    warn!("Creating compatible .app file at: {}", new_app.display());
    copy_dir_contents(app, &new_app)?;

    let slice = if is_64bit { MONOTOUCH_64_DIR } else { MONOTOUCH_32_DIR };
    warn!("Copy files from {} dir...", slice);
    copy_dir_contents(&new_app.join(slice), &new_app)?;

    Ok(new_app)
}

/// Recursively copies everything inside `src` into `dst`, overwriting what
/// already exists there. Symlinks are recreated, not followed, and an existing
/// entry of a different kind is replaced rather than written through.
fn copy_dir_contents(src: &Path, dst: &Path) -> Result<(), AppError> {
    let copy_err = |from: &Path, to: &Path, source: std::io::Error| AppError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    fs::create_dir_all(dst).map_err(|e| copy_err(src, dst, e))?;

    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|source| AppError::Walk {
            path: src.to_path_buf(),
            source,
        })?;
        let rel = match entry.path().strip_prefix(src) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let target = dst.join(rel);
        let file_type = entry.file_type();

        let copied = if file_type.is_dir() {
            clear_target(&target, true).and_then(|_| fs::create_dir_all(&target))
        } else {
            clear_target(&target, false).and_then(|_| {
                if file_type.is_symlink() {
                    copy_symlink(entry.path(), &target)
                } else {
                    fs::copy(entry.path(), &target).map(|_| ())
                }
            })
        };
        copied.map_err(|e| copy_err(entry.path(), &target, e))?;
    }
    Ok(())
}

/// Removes whatever sits at `target` unless it is a real directory and
/// `keep_dir` is set. Symlinks are removed themselves, never their targets.
fn clear_target(target: &Path, keep_dir: bool) -> std::io::Result<()> {
    let meta = match fs::symlink_metadata(target) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    let file_type = meta.file_type();
    if file_type.is_dir() {
        if keep_dir {
            return Ok(());
        }
        return fs::remove_dir_all(target);
    }
    fs::remove_file(target)
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(src)?, dst)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::copy(src, dst).map(|_| ())
}
