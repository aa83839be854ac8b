pub mod detail;
pub mod game;
pub mod link;
pub mod wishlist;

pub use detail::{
    CompatibilityRating, Deal, DurationEstimate, Enrichment, GameDetail, StoreMetadata,
    Unavailable,
};
pub use game::{Game, IdentityPatch, Platform};
pub use link::{LinkedPlatform, OAuthTokens};
pub use wishlist::WishlistItem;
