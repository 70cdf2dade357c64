//! Domain model shared by every layer of the sync engine
//!
//! - `Provider`: which gallery site a record came from
//! - `MediaRecord` / `PoolRecord`: the documents that end up in the store
//! - tag and date normalization applied by the extractors

mod normalize;
mod provider;
mod record;

pub use normalize::{artist_tag, normalize_tag, normalize_tags, parse_remote_datetime};
pub use provider::Provider;
pub use record::{ItemId, MediaRecord, PoolRecord, Submission};
