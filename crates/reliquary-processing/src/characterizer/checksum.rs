use crate::traits::Characterizer;
use async_trait::async_trait;
use reliquary_core::models::Characterization;
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `data`.
pub fn checksum_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Records only size and checksum. Used for anything no other strategy claims.
pub struct DefaultCharacterizer;

#[async_trait]
impl Characterizer for DefaultCharacterizer {
    fn name(&self) -> &'static str {
        "default"
    }

    async fn characterize(
        &self,
        data: &[u8],
        _filename: &str,
    ) -> Result<Characterization, anyhow::Error> {
        Ok(Characterization {
            characterizer: self.name().to_string(),
            format_label: "Unknown Binary".to_string(),
            size_bytes: data.len() as u64,
            checksum_sha256: checksum_sha256(data),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_matches_known_digest() {
        assert_eq!(
            checksum_sha256(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
