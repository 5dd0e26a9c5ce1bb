//! Asset name to [`EventStream`] pipeline.

use super::container;
use super::locator::AssetLocator;
use crate::error::Result;
use crate::midi::{smf, EventStream};

/// Loads compressed MIDI assets from the cache.
#[derive(Debug, Clone)]
pub struct Loader {
    locator: AssetLocator,
}

impl Loader {
    pub fn new(locator: AssetLocator) -> Self {
        Self { locator }
    }

    /// Resolves, reads, decompresses and parses an asset.
    ///
    /// # Arguments
    ///
    /// * `name` - Logical asset name (file stem)
    /// * `expected_len` - Decompressed size, if the caller knows it. When
    ///   given it must agree with the size embedded in the container.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the asset is missing from both directories and
    /// `Decode` if the container or the MIDI data is invalid.
    pub fn load(&self, name: &str, expected_len: Option<usize>) -> Result<EventStream> {
        let raw = self.locator.read(name)?;
        let expected_len = match expected_len {
            Some(len) => len,
            None => container::embedded_len(&raw)?,
        };
        tracing::info!(
            "Loading '{}': {} bytes compressed, {} bytes uncompressed",
            name,
            raw.len(),
            expected_len
        );

        let data = container::decompress(&raw, expected_len)?;
        let stream = smf::parse(&data)?;
        tracing::info!(
            "Parsed '{}': {} events, {:.1}s",
            name,
            stream.len(),
            stream.duration_ms() / 1000.0
        );
        Ok(stream)
    }
}
