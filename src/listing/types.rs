use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::{ListingChanges, ListingModel, ReviewModel};
use crate::shared::AppError;

/// Upper bound of a NUMERIC(10, 2) price
const MAX_PRICE: f64 = 99_999_999.99;

fn default_available() -> bool {
    true
}

/// Request payload for creating a listing. Images are already hosted; only their URLs are stored.
#[derive(Debug, Deserialize)]
pub struct CreateListingRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default, rename = "imagelinks")]
    pub image_links: Vec<String>,
}

impl CreateListingRequest {
    /// Checks the fields and returns the price in canonical two-decimal form
    pub fn validate(&self) -> Result<String, AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::BadRequest("title is required".to_string()));
        }
        if self.image_links.iter().all(|link| link.trim().is_empty()) {
            return Err(AppError::BadRequest(
                "At least one image is required".to_string(),
            ));
        }
        normalize_price(&self.price)
    }
}

/// Partial update; blank strings and empty image lists leave the field unchanged
#[derive(Debug, Default, Deserialize)]
pub struct UpdateListingRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub available: Option<bool>,
    #[serde(default, rename = "imagelinks")]
    pub image_links: Option<Vec<String>>,
}

impl UpdateListingRequest {
    pub fn into_changes(self) -> Result<ListingChanges, AppError> {
        let price = match non_blank(self.price) {
            Some(price) => Some(normalize_price(&price)?),
            None => None,
        };

        Ok(ListingChanges {
            title: non_blank(self.title),
            description: non_blank(self.description),
            price,
            location: non_blank(self.location),
            available: self.available,
            image_links: self.image_links.filter(|links| !links.is_empty()),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parses a non-negative price and renders it with two decimals
pub fn normalize_price(raw: &str) -> Result<String, AppError> {
    let invalid = || AppError::BadRequest("invalid price".to_string());
    let value: f64 = raw.trim().parse().map_err(|_| invalid())?;
    if !value.is_finite() || !(0.0..=MAX_PRICE).contains(&value) {
        return Err(invalid());
    }
    Ok(format!("{value:.2}"))
}

#[derive(Debug, Deserialize)]
pub struct ListingStatusRequest {
    pub available: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub keyword: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ListingResponse {
    pub id: i32,
    pub admin_id: i32,
    pub title: String,
    pub description: String,
    pub price: String,
    pub location: String,
    pub available: bool,
    #[serde(rename = "imagelink")]
    pub image_links: Vec<String>,
    pub total_views: i32,
    pub created_at: DateTime<Utc>,
}

impl From<ListingModel> for ListingResponse {
    fn from(listing: ListingModel) -> Self {
        Self {
            id: listing.id,
            admin_id: listing.admin_id,
            title: listing.title,
            description: listing.description.unwrap_or_default(),
            price: listing.price,
            location: listing.location.unwrap_or_default(),
            available: listing.available,
            image_links: listing.image_links,
            total_views: listing.total_views,
            created_at: listing.created_at,
        }
    }
}

/// A listing as seen by a signed-in user, flagged when it is one of their favorites
#[derive(Debug, Serialize, Deserialize)]
pub struct UserListingResponse {
    #[serde(flatten)]
    pub listing: ListingResponse,
    #[serde(rename = "bookmarkStatus")]
    pub bookmark_status: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListingDetailResponse {
    #[serde(flatten)]
    pub listing: ListingResponse,
    pub reviews: Vec<ReviewResponse>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFavoriteRequest {
    pub listing_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    #[serde(rename = "listingId")]
    pub listing_id: i32,
    pub rating: i32,
    pub comment: String,
}

impl CreateReviewRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if !(1..=5).contains(&self.rating) {
            return Err(AppError::BadRequest(
                "rating must be between 1 and 5".to_string(),
            ));
        }
        if self.comment.trim().is_empty() {
            return Err(AppError::BadRequest("comment is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ReviewResponse {
    pub id: i32,
    pub user_id: i32,
    pub listing_id: i32,
    pub username: String,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl From<ReviewModel> for ReviewResponse {
    fn from(review: ReviewModel) -> Self {
        Self {
            id: review.id,
            user_id: review.user_id,
            listing_id: review.listing_id,
            username: review.username,
            rating: review.rating,
            comment: review.comment,
            created_at: review.created_at,
        }
    }
}

/// `{"status": ...}` body used by listing and favorite mutations
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }
}
