//! Legacy replay serialization
//!
//! Legacy replays are stored as bare frame data. Clients expect a complete
//! `.osr` stream, so the header is rebuilt from database rows whenever a
//! legacy replay is uploaded to or served from the cache.

mod encoding;
pub mod error;
pub mod header;
pub mod reader;

pub use error::{LegacyReplayError, Result};
pub use header::{build, score_checksum, DEFAULT_SCORE_VERSION};
pub use reader::LegacyReplay;
