//! On-disk cache for window coefficients.
//!
//! The cache is process-wide state with an init/teardown lifecycle. It has to
//! be initialized before any load or save; saves that fail are logged and
//! skipped so a later load simply misses and triggers recomputation.

use std::fs;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use lazy_static::lazy_static;
use log::warn;

lazy_static! {
    static ref CACHE_DIR: Mutex<Option<PathBuf>> = Mutex::new(None);
}

/// Cache initialization failure.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache path '{0}' is not a directory; please remove the file at that path")]
    NotADirectory(PathBuf),
    #[error("failed to create cache directory '{0}': {1}")]
    Create(PathBuf, #[source] std::io::Error),
}

/// Establish the backing directory, creating it if absent.
///
/// Idempotent; calling again warns and leaves the current directory in place.
pub fn init(root: &Path) -> Result<(), CacheError> {
    let mut dir = CACHE_DIR.lock().unwrap();
    if dir.is_some() {
        warn!("cache directory is already initialized; this function shouldn't be called twice");
        return Ok(());
    }

    if !root.exists() {
        fs::create_dir_all(root).map_err(|e| CacheError::Create(root.to_path_buf(), e))?;
    }
    if !root.is_dir() {
        return Err(CacheError::NotADirectory(root.to_path_buf()));
    }

    *dir = Some(root.to_path_buf());
    Ok(())
}

/// Drop the cache directory binding. Loads and saves miss afterwards.
pub fn teardown() {
    *CACHE_DIR.lock().unwrap() = None;
}

/// Whether [`init`] has been called.
pub fn is_initialized() -> bool {
    CACHE_DIR.lock().unwrap().is_some()
}

/// The backing directory, if initialized.
pub fn dir() -> Option<PathBuf> {
    CACHE_DIR.lock().unwrap().clone()
}

/// Deterministic file name of a Dolph-Chebyshev window. The attenuation is
/// keyed with exactly three decimal digits.
pub fn dolph_filename(size: usize, attenuation_db: f64) -> String {
    format!("dolph_window_{}_{:.3}.txt", size, attenuation_db)
}

/// Write window coefficients through to disk, one per line in ascending index
/// order. Failures are non-fatal and logged.
pub fn save_dolph_window(window: &[f64], size: usize, attenuation_db: f64) {
    if cfg!(not(feature = "window-cache")) {
        return;
    }

    let Some(dir) = dir() else {
        warn!("cache was not yet initialized, so the directory is not yet set");
        return;
    };

    let path = dir.join(dolph_filename(size, attenuation_db));
    let file = match File::create(&path) {
        Ok(file) => file,
        Err(e) => {
            warn!(
                "failed to open window cache file '{}' for writing; not saving to cache ({})",
                path.display(),
                e
            );
            return;
        }
    };

    let mut out = BufWriter::new(file);
    for v in window {
        if let Err(e) = writeln!(out, "{}", v) {
            warn!("failed to write window cache file '{}' ({})", path.display(), e);
            return;
        }
    }
    if let Err(e) = out.flush() {
        warn!("failed to flush window cache file '{}' ({})", path.display(), e);
    }
}

/// Load window coefficients, or `None` when no matching file exists.
pub fn load_dolph_window(size: usize, attenuation_db: f64) -> Option<Vec<f64>> {
    if cfg!(not(feature = "window-cache")) {
        return None;
    }

    let dir = dir()?;
    let path = dir.join(dolph_filename(size, attenuation_db));
    if !path.exists() {
        return None;
    }

    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) => {
            warn!("failed to open window cache file '{}' ({})", path.display(), e);
            return None;
        }
    };

    let mut window = Vec::with_capacity(size);
    for line in BufReader::new(file).lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("failed to read window cache file '{}' ({})", path.display(), e);
                return None;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.parse::<f64>() {
            Ok(v) => window.push(v),
            Err(_) => {
                warn!("malformed coefficient in window cache file '{}'", path.display());
                return None;
            }
        }
        if window.len() == size {
            break;
        }
    }

    if window.len() != size {
        warn!(
            "window cache file '{}' holds {} coefficients, expected {}",
            path.display(),
            window.len(),
            size
        );
        return None;
    }

    Some(window)
}
