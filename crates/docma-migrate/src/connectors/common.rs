//! Common utilities shared across connectors and target stores.

use crate::error::{Error, Result};

/// Maximum file size for snapshot imports (100MB).
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

const VALID_SCHEMES: [&str; 4] = ["mongodb://", "mongodb+srv://", "mysql://", "mariadb://"];

/// Validates a connection URL.
///
/// # Errors
///
/// Returns [`Error::Config`] for an unsupported scheme or a URL without a host.
pub fn validate_url(url: &str) -> Result<()> {
    let Some(scheme) = VALID_SCHEMES.iter().find(|s| url.starts_with(*s)) else {
        return Err(Error::Config(format!(
            "Invalid URL scheme in '{}'. Allowed: mongodb, mongodb+srv, mysql, mariadb",
            url
        )));
    };

    if url.len() <= scheme.len() {
        return Err(Error::Config(format!("Invalid URL format: {}", url)));
    }

    Ok(())
}

/// Checks that a local file is small enough to load into memory.
///
/// # Errors
///
/// Returns an IO error when the file is missing and [`Error::Config`] when it
/// exceeds [`MAX_FILE_SIZE`].
pub fn check_file_size(path: &std::path::Path) -> Result<u64> {
    let size = std::fs::metadata(path)?.len();
    if size > MAX_FILE_SIZE {
        return Err(Error::Config(format!(
            "File {} is {} bytes, larger than the {} byte limit",
            path.display(),
            size,
            MAX_FILE_SIZE
        )));
    }
    Ok(size)
}
