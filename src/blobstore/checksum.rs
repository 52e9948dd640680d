//! Fingerprint computation for blob content.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::constants::FINGERPRINT_PREFIX;

/// Compute the SHA-256 fingerprint of a file.
///
/// Returns `sha256:<lowercase hex>`, 71 characters in total. The file is streamed
/// through the hasher so large job archives are not loaded into memory.
///
/// # Examples
///
/// ```rust,no_run
/// use std::path::Path;
/// use tplcache::blobstore::compute_checksum;
///
/// # fn example() -> anyhow::Result<()> {
/// let fingerprint = compute_checksum(Path::new("router.tgz"))?;
/// assert!(fingerprint.starts_with("sha256:"));
/// # Ok(())
/// # }
/// ```
pub fn compute_checksum(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| {
        format!("Cannot read file for checksum calculation: {}", path.display())
    })?;

    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("Reading {} for checksum", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{FINGERPRINT_PREFIX}{}", hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_known_digest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, "hello").unwrap();

        assert_eq!(
            compute_checksum(&path).unwrap(),
            "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_missing_file_errors() {
        let dir = TempDir::new().unwrap();
        assert!(compute_checksum(&dir.path().join("nope")).is_err());
    }
}
