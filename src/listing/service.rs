use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{
    models::{ListingChanges, ListingModel, NewListing, NewReview, ReviewModel},
    repository::ListingRepository,
    types::{CreateListingRequest, CreateReviewRequest, UpdateListingRequest},
};
use crate::account::{repository::AccountRepository, AccountModel, AccountRole};
use crate::session::Identity;
use crate::shared::{AppError, AppState};

/// Listings are owned by admins; favorites and reviews belong to users
pub struct ListingService {
    listings: Arc<dyn ListingRepository + Send + Sync>,
    accounts: Arc<dyn AccountRepository + Send + Sync>,
}

impl ListingService {
    pub fn new(
        listings: Arc<dyn ListingRepository + Send + Sync>,
        accounts: Arc<dyn AccountRepository + Send + Sync>,
    ) -> Self {
        Self { listings, accounts }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            Arc::clone(&state.listing_repository),
            Arc::clone(&state.account_repository),
        )
    }

    /// Sessions carry no role, so the caller is looked up in the admins table
    async fn admin(&self, identity: &Identity) -> Result<AccountModel, AppError> {
        self.accounts
            .get_account_by_email(AccountRole::Admin, &identity.email)
            .await?
            .ok_or_else(|| {
                warn!(id = identity.id, "Admin-only operation refused");
                AppError::Forbidden("unauthorized admins only".to_string())
            })
    }

    async fn user(&self, identity: &Identity) -> Result<AccountModel, AppError> {
        self.accounts
            .get_account_by_email(AccountRole::User, &identity.email)
            .await?
            .ok_or_else(|| {
                warn!(id = identity.id, "User-only operation refused");
                AppError::Forbidden("authorized users only".to_string())
            })
    }

    async fn existing_listing(&self, id: i32) -> Result<ListingModel, AppError> {
        self.listings
            .get_listing(id)
            .await?
            .ok_or_else(|| AppError::NotFound("listing not found".to_string()))
    }

    #[instrument(skip(self, identity, request), fields(id = identity.id))]
    pub async fn create_listing(
        &self,
        identity: &Identity,
        request: CreateListingRequest,
    ) -> Result<ListingModel, AppError> {
        let price = request.validate()?;
        let admin = self.admin(identity).await?;

        let listing = self
            .listings
            .create_listing(&NewListing {
                admin_id: admin.id,
                title: request.title.trim().to_string(),
                description: request.description.filter(|d| !d.trim().is_empty()),
                price,
                location: request.location.filter(|l| !l.trim().is_empty()),
                available: request.available,
                image_links: request
                    .image_links
                    .into_iter()
                    .filter(|link| !link.trim().is_empty())
                    .collect(),
            })
            .await?;

        info!(listing_id = listing.id, admin_id = admin.id, "Listing created");
        Ok(listing)
    }

    pub async fn all_listings(&self) -> Result<Vec<ListingModel>, AppError> {
        self.listings.list_listings().await
    }

    pub async fn search_listings(&self, keyword: &str) -> Result<Vec<ListingModel>, AppError> {
        let keyword = required_keyword(keyword)?;
        self.listings.search_listings(keyword).await
    }

    /// Every listing, paired with whether the user has it among their favorites
    pub async fn listings_for_user(
        &self,
        identity: &Identity,
    ) -> Result<Vec<(ListingModel, bool)>, AppError> {
        let user = self.user(identity).await?;
        let favorites: HashSet<i32> = self
            .listings
            .favorite_listings(user.id)
            .await?
            .into_iter()
            .map(|listing| listing.id)
            .collect();

        Ok(self
            .listings
            .list_listings()
            .await?
            .into_iter()
            .map(|listing| {
                let bookmarked = favorites.contains(&listing.id);
                (listing, bookmarked)
            })
            .collect())
    }

    /// A listing with its reviews
    pub async fn listing_detail(
        &self,
        id: i32,
    ) -> Result<(ListingModel, Vec<ReviewModel>), AppError> {
        let listing = self.existing_listing(id).await?;
        let reviews = self.listings.reviews_for_listing(listing.id).await?;
        Ok((listing, reviews))
    }

    pub async fn admin_listings(&self, identity: &Identity) -> Result<Vec<ListingModel>, AppError> {
        let admin = self.admin(identity).await?;
        self.listings.list_admin_listings(admin.id).await
    }

    /// One of the caller's own listings; other admins' listings are reported as missing
    pub async fn admin_listing(
        &self,
        identity: &Identity,
        id: i32,
    ) -> Result<ListingModel, AppError> {
        let admin = self.admin(identity).await?;
        self.listings
            .get_listing(id)
            .await?
            .filter(|listing| listing.admin_id == admin.id)
            .ok_or_else(|| AppError::NotFound("listing not found".to_string()))
    }

    pub async fn admin_listing_reviews(
        &self,
        identity: &Identity,
        id: i32,
    ) -> Result<Vec<ReviewModel>, AppError> {
        let listing = self.admin_listing(identity, id).await?;
        self.listings.reviews_for_listing(listing.id).await
    }

    #[instrument(skip(self, identity, request), fields(id = identity.id))]
    pub async fn update_listing(
        &self,
        identity: &Identity,
        listing_id: i32,
        request: UpdateListingRequest,
    ) -> Result<(), AppError> {
        let changes = request.into_changes()?;
        let admin = self.admin(identity).await?;

        self.listings
            .update_listing(listing_id, admin.id, &changes)
            .await?;
        info!(listing_id, "Listing updated");
        Ok(())
    }

    #[instrument(skip(self, identity), fields(id = identity.id))]
    pub async fn set_listing_status(
        &self,
        identity: &Identity,
        listing_id: i32,
        available: bool,
    ) -> Result<(), AppError> {
        let admin = self.admin(identity).await?;
        let changes = ListingChanges {
            available: Some(available),
            ..ListingChanges::default()
        };

        self.listings
            .update_listing(listing_id, admin.id, &changes)
            .await
    }

    #[instrument(skip(self, identity), fields(id = identity.id))]
    pub async fn delete_listing(&self, identity: &Identity, listing_id: i32) -> Result<(), AppError> {
        let admin = self.admin(identity).await?;
        self.listings.delete_listing(listing_id, admin.id).await?;

        info!(listing_id, "Listing deleted");
        Ok(())
    }

    pub async fn record_view(&self, listing_id: i32) -> Result<(), AppError> {
        self.listings.increment_views(listing_id).await
    }

    #[instrument(skip(self, identity), fields(id = identity.id))]
    pub async fn add_favorite(&self, identity: &Identity, listing_id: i32) -> Result<(), AppError> {
        let user = self.user(identity).await?;
        let listing = self.existing_listing(listing_id).await?;

        self.listings.add_favorite(user.id, listing.id).await?;
        Ok(())
    }

    pub async fn favorites(&self, identity: &Identity) -> Result<Vec<ListingModel>, AppError> {
        let user = self.user(identity).await?;
        self.listings.favorite_listings(user.id).await
    }

    pub async fn search_favorites(
        &self,
        identity: &Identity,
        keyword: &str,
    ) -> Result<Vec<ListingModel>, AppError> {
        let keyword = required_keyword(keyword)?;
        let user = self.user(identity).await?;

        Ok(self
            .listings
            .favorite_listings(user.id)
            .await?
            .into_iter()
            .filter(|listing| listing.matches(keyword))
            .collect())
    }

    pub async fn remove_favorite(
        &self,
        identity: &Identity,
        listing_id: i32,
    ) -> Result<(), AppError> {
        let user = self.user(identity).await?;
        self.listings.remove_favorite(user.id, listing_id).await
    }

    #[instrument(skip(self, identity, request), fields(id = identity.id))]
    pub async fn create_review(
        &self,
        identity: &Identity,
        request: CreateReviewRequest,
    ) -> Result<ReviewModel, AppError> {
        request.validate()?;
        let user = self.user(identity).await?;
        let listing = self.existing_listing(request.listing_id).await?;

        let review = self
            .listings
            .create_review(&NewReview {
                user_id: user.id,
                username: user.username,
                listing_id: listing.id,
                rating: request.rating,
                comment: request.comment.trim().to_string(),
            })
            .await?;

        info!(review_id = review.id, listing_id = listing.id, "Review created");
        Ok(review)
    }

    pub async fn review(&self, identity: &Identity, id: i32) -> Result<ReviewModel, AppError> {
        let user = self.user(identity).await?;
        self.listings
            .get_review(id, user.id)
            .await?
            .ok_or_else(|| AppError::NotFound("review not found".to_string()))
    }

    pub async fn delete_review(&self, identity: &Identity, id: i32) -> Result<(), AppError> {
        let user = self.user(identity).await?;
        self.listings.delete_review(id, user.id).await
    }
}

fn required_keyword(keyword: &str) -> Result<&str, AppError> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err(AppError::BadRequest("keyword is required".to_string()));
    }
    Ok(keyword)
}
