use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database model for the listings table. `price` is the NUMERIC column rendered as text.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListingModel {
    pub id: i32,
    pub admin_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub price: String,
    pub location: Option<String>,
    pub available: bool,
    pub total_views: i32,
    pub image_links: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ListingModel {
    /// Case-insensitive substring match on title, description and location
    pub fn matches(&self, keyword: &str) -> bool {
        let keyword = keyword.to_lowercase();
        [
            Some(self.title.as_str()),
            self.description.as_deref(),
            self.location.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&keyword))
    }
}

#[derive(Debug, Clone)]
pub struct NewListing {
    pub admin_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub price: String,
    pub location: Option<String>,
    pub available: bool,
    pub image_links: Vec<String>,
}

/// Partial listing update; `None` leaves the column as it is
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub location: Option<String>,
    pub available: Option<bool>,
    pub image_links: Option<Vec<String>>,
}

impl ListingChanges {
    pub fn apply(&self, listing: &mut ListingModel) {
        if let Some(title) = &self.title {
            listing.title = title.clone();
        }
        if let Some(description) = &self.description {
            listing.description = Some(description.clone());
        }
        if let Some(price) = &self.price {
            listing.price = price.clone();
        }
        if let Some(location) = &self.location {
            listing.location = Some(location.clone());
        }
        if let Some(available) = self.available {
            listing.available = available;
        }
        if let Some(image_links) = &self.image_links {
            listing.image_links = image_links.clone();
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct FavoriteModel {
    pub id: i32,
    pub user_id: i32,
    pub listing_id: i32,
    pub created_at: DateTime<Utc>,
}

/// A review joined with the author's current username
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewModel {
    pub id: i32,
    pub user_id: i32,
    pub listing_id: i32,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub username: String,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub user_id: i32,
    /// Kept by stores that cannot join the users table
    pub username: String,
    pub listing_id: i32,
    pub rating: i32,
    pub comment: String,
}
