//! Rendered-tile caching.
//!
//! [`Cache`] is the byte-cache seam; [`MemoryCacheProvider`] is the moka
//! implementation, and [`TileCacheClient`] keys encoded tiles on top of it.

mod memory;
mod tile;
mod traits;

pub use memory::MemoryCacheProvider;
pub use tile::{TileCacheClient, TileKey};
pub use traits::{BoxFuture, Cache, ServiceCacheError};
