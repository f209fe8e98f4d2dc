use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const DEFAULT_URL: &str = "/api/v1/NEMO/fw-update/get-bin";

/// Update descriptor served next to the signed image.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReleaseManifest {
    /// Build date as a number (`YYMMDDHHmm`)
    pub ver: u64,
    pub size: u64,
    /// Upper-case hex SHA-256 of the signed image
    pub hash: String,
    pub url: String,
}

impl ReleaseManifest {
    pub fn new(ver: u64, signed: &[u8], url: impl Into<String>) -> Self {
        Self {
            ver,
            size: signed.len() as u64,
            hash: sha256_upper(signed),
            url: url.into(),
        }
    }

    /// JSON with four-space indentation.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut out = Vec::new();
        let fmt = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut out, fmt);
        self.serialize(&mut ser)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        fs::write(path, self.to_json()?)
            .map_err(|e| anyhow!("can not write manifest {}: {e}", path.display()))
    }
}

pub fn sha256_upper(data: &[u8]) -> String {
    hex::encode_upper(Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_size() {
        let m = ReleaseManifest::new(2403071530, b"abc", DEFAULT_URL);
        assert_eq!(m.size, 3);
        assert_eq!(
            m.hash,
            "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD"
        );
        assert_eq!(m.hash.len(), 64);
    }

    #[test]
    fn test_json_layout() {
        let m = ReleaseManifest::new(2403071530, b"", "/fw");
        let json = m.to_json().unwrap();
        assert_eq!(
            json,
            "{\n    \"ver\": 2403071530,\n    \"size\": 0,\n    \"hash\": \"E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855\",\n    \"url\": \"/fw\"\n}"
        );
        let back: ReleaseManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
