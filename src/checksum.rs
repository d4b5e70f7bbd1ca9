// src/checksum.rs
// Optional integrity verification against a sha256sum-style manifest. Never
// required for the pipeline to run: a missing manifest or a missing entry is
// logged as a warning, only a present-but-mismatched digest is an error.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use crate::error::PipelineError;

pub fn sha256_file(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Parses a manifest of `<hexdigest>  <filename>` lines. Leading `./` on the
/// filename is stripped so manifests generated from a different working
/// directory still match.
pub fn load_manifest(path: &Path) -> io::Result<HashMap<String, String>> {
    let contents = std::fs::read_to_string(path)?;
    let mut map = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.splitn(2, char::is_whitespace);
        let digest = match parts.next() {
            Some(d) => d,
            None => continue,
        };
        let filename = match parts.next() {
            Some(f) => f.trim(),
            None => continue,
        };
        let filename = filename.strip_prefix("./").unwrap_or(filename);
        map.insert(filename.to_string(), digest.to_lowercase());
    }
    Ok(map)
}

/// Verifies `path` against `manifest` by basename. Returns `Ok(())` when the
/// file isn't listed in the manifest at all (nothing to check), or when the
/// digest matches; errors only on a present-but-mismatched entry.
pub fn verify(path: &Path, manifest: &HashMap<String, String>) -> Result<(), PipelineError> {
    let basename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    let expected = match manifest.get(basename) {
        Some(d) => d,
        None => {
            log::warn!("no checksum entry for {basename}, skipping verification");
            return Ok(());
        }
    };

    let actual = sha256_file(path).map_err(|e| PipelineError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    if actual.to_lowercase() != *expected {
        return Err(PipelineError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.clone(),
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_strips_leading_dot_slash() {
        let data = "deadbeef  ./games-2024-01.pgn.zst\n";
        let tmp = std::env::temp_dir().join("checksum_test_manifest.sha256");
        std::fs::write(&tmp, data).unwrap();
        let map = load_manifest(&tmp).unwrap();
        assert_eq!(map.get("games-2024-01.pgn.zst"), Some(&"deadbeef".to_string()));
        let _ = std::fs::remove_file(&tmp);
    }
}
