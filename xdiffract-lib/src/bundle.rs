//! Reading postcard-serialized, zstd-compressed files.

use std::io::Read;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{DiffractError, Result};

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut decoder = ruzstd::decoding::StreamingDecoder::new(bytes)
        .map_err(|e| DiffractError::DataError(format!("zstd frame: {e}")))?;
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;
    postcard::from_bytes(&decompressed)
        .map_err(|e| DiffractError::DataError(format!("postcard: {e}")))
}

pub fn read<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path)?;
    decode(&bytes)
}
