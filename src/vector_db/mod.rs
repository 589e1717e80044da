//! Persisted vector index: building, publishing and loading generations
//!
//! The primary loader ([`load_index`]) verifies a generation against its
//! manifest; the manual reader ([`ManualRetriever`]) reads the raw files of
//! older or damaged layouts without verification.

pub mod builder;
pub mod fallback;
pub mod flat_index;
pub mod layout;
pub mod loader;
pub mod store;

pub use builder::{BuildOutcome, IndexBuilder};
pub use fallback::{ManualRetriever, RawIndex};
pub use flat_index::{FlatIndex, FlatIndexError};
pub use layout::has_published_index;
pub use loader::{LoadedIndex, load_index};
pub use store::{Manifest, NodeMap, StoreError, StoredChunk};
