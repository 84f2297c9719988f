//! Snapshot blobs: a model serialized as JSON, optionally inside a gzip envelope.

use std::io::Write;

use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use serde::{Serialize, de::DeserializeOwned};

use crate::{CodecErr, Result};

/// How a snapshot is laid out on the wire.
///
/// The encoding is a deployment choice: the server and its clients are configured
/// with the same value, a transfer is never sniffed to guess it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SnapshotEncoding {
    /// Plain serialized bytes.
    #[default]
    Raw,
    /// A gzip envelope with the given compression level (0-9).
    Compressed(u32),
}

impl SnapshotEncoding {
    pub const DEFAULT_LEVEL: u32 = 5;
    pub const MAX_LEVEL: u32 = 9;

    /// A gzip envelope with the default compression level.
    pub fn compressed() -> Self {
        Self::Compressed(Self::DEFAULT_LEVEL)
    }

    /// Serializes `value` into a snapshot blob.
    ///
    /// # Errors
    /// Returns `CodecErr::Snapshot` if `value` can't be serialized.
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        let raw = serde_json::to_vec(value).map_err(snapshot_err)?;

        match *self {
            SnapshotEncoding::Raw => Ok(raw),
            SnapshotEncoding::Compressed(level) => {
                let level = Compression::new(level.min(Self::MAX_LEVEL));
                let mut gz = GzEncoder::new(Vec::with_capacity(raw.len() / 2), level);
                gz.write_all(&raw)?;
                Ok(gz.finish()?)
            }
        }
    }

    /// Deserializes a snapshot blob produced with this encoding.
    ///
    /// # Errors
    /// Returns `CodecErr::Snapshot` if the blob isn't a valid snapshot for `T`.
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        match self {
            SnapshotEncoding::Raw => serde_json::from_slice(bytes).map_err(snapshot_err),
            SnapshotEncoding::Compressed(_) => {
                serde_json::from_reader(GzDecoder::new(bytes)).map_err(snapshot_err)
            }
        }
    }
}

/// Deserializes a snapshot whose encoding is unknown, trying the raw layout first
/// and the gzip envelope second. Only meant for snapshots handed over at startup.
///
/// # Errors
/// Returns the error of the compressed attempt if both fail.
pub fn decode_any<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    SnapshotEncoding::Raw
        .decode(bytes)
        .or_else(|_| SnapshotEncoding::compressed().decode(bytes))
}

fn snapshot_err(e: serde_json::Error) -> CodecErr {
    CodecErr::Snapshot(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Weights {
        bias: f64,
        values: Vec<f64>,
    }

    fn weights() -> Weights {
        Weights {
            bias: 0.1,
            values: vec![1.0 / 3.0, -2.5e-300, 7.0],
        }
    }

    #[test]
    fn compressed_blob_is_gzip() {
        let blob = SnapshotEncoding::compressed().encode(&weights()).unwrap();
        assert_eq!(&blob[..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn decode_any_accepts_both_layouts() {
        for encoding in [SnapshotEncoding::Raw, SnapshotEncoding::Compressed(9)] {
            let blob = encoding.encode(&weights()).unwrap();
            let decoded: Weights = decode_any(&blob).unwrap();
            assert_eq!(decoded, weights());
        }
    }

    #[test]
    fn wrong_encoding_fails() {
        let blob = SnapshotEncoding::compressed().encode(&weights()).unwrap();
        let res = SnapshotEncoding::Raw.decode::<Weights>(&blob);
        assert!(matches!(res, Err(CodecErr::Snapshot(_))));
    }

    #[test]
    fn garbage_is_rejected_by_both_layouts() {
        let res = decode_any::<Weights>(b"definitely not a model");
        assert!(matches!(res, Err(CodecErr::Snapshot(_))));
    }
}
