//! Loading the startup snapshot.

use log::{debug, info};
use model::{Capability, Model};
use serde::de::DeserializeOwned;
use tokio::io::{self, AsyncReadExt};

use crate::{config::SnapshotSource, ServerErr};

/// Reads every byte of the snapshot source.
///
/// # Errors
/// Returns an io error if the file or stdin can't be read.
pub async fn read_source(source: &SnapshotSource) -> io::Result<Vec<u8>> {
    match source {
        SnapshotSource::Stdin => {
            let mut bytes = Vec::new();
            io::stdin().read_to_end(&mut bytes).await?;
            Ok(bytes)
        }
        SnapshotSource::Path(path) => tokio::fs::read(path).await,
    }
}

/// Decodes a snapshot in either layout and checks it against the expected
/// capability.
///
/// # Arguments
/// * `bytes` - The snapshot, raw or inside a gzip envelope.
/// * `expect` - The capability asked for at startup, if any.
///
/// # Returns
/// The model and its capability.
///
/// # Errors
/// `ServerErr::SnapshotCorrupt` if neither layout decodes, or
/// `ServerErr::CapabilityMismatch` if the model doesn't have `expect`.
pub fn decode<M>(bytes: &[u8], expect: Option<Capability>) -> Result<(M, Capability), ServerErr>
where
    M: Model + DeserializeOwned,
{
    debug!(bytes = bytes.len(); "decoding snapshot");

    let model: M = comms::snapshot::decode_any(bytes).map_err(ServerErr::SnapshotCorrupt)?;
    let capability = check_capability(&model, expect)?;

    info!("loaded {}", model.describe());
    Ok((model, capability))
}

/// Reads and decodes the snapshot from `source`.
///
/// # Errors
/// See `read_source` and `decode`.
pub async fn load<M>(
    source: &SnapshotSource,
    expect: Option<Capability>,
) -> Result<(M, Capability), ServerErr>
where
    M: Model + DeserializeOwned,
{
    let bytes = read_source(source).await?;
    decode(&bytes, expect)
}

/// Returns the model's capability, failing if it isn't `expect`.
pub fn check_capability<M: Model>(
    model: &M,
    expect: Option<Capability>,
) -> Result<Capability, ServerErr> {
    let actual = model.capability();

    match expect {
        Some(expected) if expected != actual => {
            Err(ServerErr::CapabilityMismatch { expected, actual })
        }
        _ => Ok(actual),
    }
}
