//! Content-addressed storage for pubsync.
//!
//! The storage network is an opaque put/get service. This crate fixes the
//! contract the synchronizer relies on and ships two backends for it.
//!
//! # Contract
//!
//! - [`ContentStore::hash`] is a dry run: deterministic, no durability side
//!   effect. Identical bytes always yield the identical address.
//! - [`ContentStore::put`] uploads durably and returns exactly the address
//!   `hash` would have returned for the same bytes.
//! - [`ContentStore::put_structured`] addresses a JSON value (manifests,
//!   template sets) under a separate hash domain, so a structured value and
//!   an opaque blob with the same bytes never collide.
//!
//! # Storage Backends
//!
//! - [`InMemoryContentStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsContentStore`] -- one file per object under a root directory

pub mod error;
pub mod fs;
pub mod hasher;
pub mod memory;
pub mod object;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsContentStore;
pub use hasher::ContentHasher;
pub use memory::InMemoryContentStore;
pub use object::{canonical_json, ObjectKind, StoredObject};
pub use traits::ContentStore;
