//! Hand-off of a certified world to whatever writes the final image.

use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use thiserror::Error;

use crate::world::WorldModel;

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("patch rejected: {0}")]
    Rejected(String),
}

/// Writes a world model into a base image.
pub trait PatchApplier {
    fn apply_patches(&mut self, model: &WorldModel, base: &[u8]) -> Result<Vec<u8>, PatchError>;
}

const ARCHIVE_FORMAT: u32 = 1;

/// What [`WorldArchivePatcher`] writes, before compression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldArchive {
    pub format: u32,
    /// Hex SHA-256 of the base image the model was generated against.
    pub base_sha256: String,
    pub world: WorldModel,
}

/// Packs the model as gzip-compressed JSON for a downstream assembler
/// instead of touching the image bytes directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorldArchivePatcher;

impl PatchApplier for WorldArchivePatcher {
    fn apply_patches(&mut self, model: &WorldModel, base: &[u8]) -> Result<Vec<u8>, PatchError> {
        let archive = WorldArchive {
            format: ARCHIVE_FORMAT,
            base_sha256: format!("{:x}", Sha256::digest(base)),
            world: model.clone(),
        };
        let json = serde_json::to_vec(&archive)?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json)?;
        Ok(encoder.finish()?)
    }
}

pub fn read_archive(bytes: &[u8]) -> Result<WorldArchive, PatchError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut json = Vec::new();
    decoder.read_to_end(&mut json)?;
    let archive: WorldArchive = serde_json::from_slice(&json)?;
    if archive.format != ARCHIVE_FORMAT {
        return Err(PatchError::Rejected(format!(
            "unsupported archive format {}",
            archive.format
        )));
    }
    Ok(archive)
}
