pub mod aggregator;
pub mod catalog;
pub mod domain;
pub mod enrich;
pub mod error;
pub mod linking;
pub mod platforms;
pub mod profile;
pub mod resolver;
pub mod storage;
pub mod sync;
pub mod tracing;
pub mod wishlist_engine;

pub mod util {
    pub mod env;
}

#[cfg(test)]
pub mod testing;

pub use aggregator::DetailAggregator;
pub use domain::{Game, GameDetail, IdentityPatch, Platform};
pub use error::{CoreError, Result};
pub use linking::{LinkStrategy, PlatformLinker};
pub use resolver::GameIdentityResolver;
pub use storage::{StorageRouter, UserId};
pub use wishlist_engine::WishlistEnrichmentEngine;
