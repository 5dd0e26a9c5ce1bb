//! Asset cache access.
//!
//! Songs and jingles are stored as compressed MIDI files in one of two
//! cache directories. This module resolves an asset name to a file, unpacks
//! the compressed container and hands the result to the SMF parser.

mod container;
mod loader;
mod locator;

pub use container::{compress, decompress, embedded_len, LENGTH_PREFIX_LEN};
pub use loader::Loader;
pub use locator::AssetLocator;
