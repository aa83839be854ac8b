//! Composite profile read. Unlike detail aggregation, all three branches
//! are mandatory: a profile without its library or wishlist is not a
//! degraded profile, it is wrong, so the fan-out is fail-fast.

use futures::try_join;

use crate::domain::{Game, LinkedPlatform, WishlistItem};
use crate::error::Result;
use crate::storage::{StorageRouter, UserId};

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileView {
    pub library: Vec<Game>,
    pub linked_platforms: Vec<LinkedPlatform>,
    pub wishlist: Vec<WishlistItem>,
}

pub struct ProfileService {
    router: StorageRouter,
}

impl ProfileService {
    pub fn new(router: StorageRouter) -> Self {
        ProfileService { router }
    }

    pub async fn get_profile(&self, user: &UserId) -> Result<ProfileView> {
        let library = self.router.library(user);
        let links = self.router.links(user);
        let wishlist = self.router.wishlist(user);

        let (library, linked_platforms, wishlist) = try_join!(
            library.get_all(user),
            links.get_linked(user),
            wishlist.get_all(user),
        )?;
        Ok(ProfileView {
            library,
            linked_platforms,
            wishlist,
        })
    }
}
