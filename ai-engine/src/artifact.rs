//! Versioned on-disk envelope shared by the statistics and network artifacts.
//!
//! Layout (little-endian):
//!
//! ```text
//! magic "FRDART" | kind u8 | version u16 | payload_len u64 | blake3(payload) [32] | payload
//! ```
//!
//! A missing file maps to `ArtifactMissing`. Everything else that prevents the
//! payload from being trusted (short read, wrong magic/kind/version, checksum
//! mismatch) maps to `ArtifactCorrupt`.

use fraud_core::{FraudError, Result};
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::debug;

const MAGIC: &[u8; 6] = b"FRDART";
const HEADER_LEN: usize = MAGIC.len() + 1 + 2 + 8 + 32;

pub const FORMAT_VERSION: u16 = 1;

/// Upper bound on accepted payloads; both artifacts are a few hundred KB at most.
pub const MAX_PAYLOAD_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ArtifactKind {
    Statistics = 1,
    Network = 2,
}

impl ArtifactKind {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(ArtifactKind::Statistics),
            2 => Some(ArtifactKind::Network),
            _ => None,
        }
    }
}

pub fn encode(kind: ArtifactKind, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.push(kind as u8);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    bytes.extend_from_slice(blake3::hash(payload).as_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

/// Validate an envelope and return its payload
pub fn decode<'a>(path: &Path, kind: ArtifactKind, bytes: &'a [u8]) -> Result<&'a [u8]> {
    if bytes.len() < HEADER_LEN {
        return Err(FraudError::corrupt(
            path,
            format!("truncated header ({} bytes)", bytes.len()),
        ));
    }

    let (header, payload) = bytes.split_at(HEADER_LEN);
    if &header[..6] != MAGIC {
        return Err(FraudError::corrupt(path, "bad magic"));
    }

    match ArtifactKind::from_byte(header[6]) {
        Some(found) if found == kind => {}
        Some(found) => {
            return Err(FraudError::corrupt(
                path,
                format!("expected {:?} artifact, found {:?}", kind, found),
            ))
        }
        None => {
            return Err(FraudError::corrupt(
                path,
                format!("unknown artifact kind {}", header[6]),
            ))
        }
    }

    let version = u16::from_le_bytes([header[7], header[8]]);
    if version != FORMAT_VERSION {
        return Err(FraudError::corrupt(
            path,
            format!("unsupported format version {}", version),
        ));
    }

    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&header[9..17]);
    let declared = u64::from_le_bytes(len_bytes);
    if declared > MAX_PAYLOAD_BYTES || declared != payload.len() as u64 {
        return Err(FraudError::corrupt(
            path,
            format!(
                "payload length mismatch (declared {}, found {})",
                declared,
                payload.len()
            ),
        ));
    }

    if blake3::hash(payload).as_bytes()[..] != header[17..HEADER_LEN] {
        return Err(FraudError::corrupt(path, "checksum mismatch"));
    }

    Ok(payload)
}

pub fn read(path: &Path, kind: ArtifactKind) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => FraudError::ArtifactMissing {
            path: path.to_path_buf(),
        },
        _ => FraudError::corrupt(path, format!("unreadable: {}", e)),
    })?;

    debug!(path = %path.display(), bytes = bytes.len(), kind = ?kind, "Read artifact");
    decode(path, kind, &bytes).map(<[u8]>::to_vec)
}

/// Write atomically: temp file in the same directory, then rename.
pub fn write(path: &Path, kind: ArtifactKind, payload: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("tmp");
    {
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(&encode(kind, payload))?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;

    debug!(path = %path.display(), bytes = payload.len(), kind = ?kind, "Wrote artifact");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_accepts_valid_envelope() {
        let bytes = encode(ArtifactKind::Statistics, b"payload");
        let payload = decode(Path::new("x"), ArtifactKind::Statistics, &bytes).unwrap();
        assert_eq!(payload, b"payload");
    }

    #[test]
    fn test_decode_rejects_truncation() {
        let bytes = encode(ArtifactKind::Network, b"some weights");
        let truncated = &bytes[..bytes.len() - 3];
        let err = decode(Path::new("x"), ArtifactKind::Network, truncated).unwrap_err();
        assert!(matches!(err, FraudError::ArtifactCorrupt { .. }));

        let header_only = &bytes[..10];
        assert!(decode(Path::new("x"), ArtifactKind::Network, header_only).is_err());
    }

    #[test]
    fn test_decode_rejects_wrong_kind() {
        let bytes = encode(ArtifactKind::Network, b"weights");
        let err = decode(Path::new("x"), ArtifactKind::Statistics, &bytes).unwrap_err();
        assert!(err.to_string().contains("expected Statistics"));
    }

    #[test]
    fn test_decode_rejects_flipped_payload_bit() {
        let mut bytes = encode(ArtifactKind::Statistics, b"{\"means\":[]}");
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let err = decode(Path::new("x"), ArtifactKind::Statistics, &bytes).unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read(&dir.path().join("absent.stats"), ArtifactKind::Statistics).unwrap_err();
        assert!(matches!(err, FraudError::ArtifactMissing { .. }));
    }
}
