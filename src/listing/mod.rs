// Public API - what other modules can use
pub use handlers::{
    add_favorite, admin_listing, admin_listing_reviews, admin_listings, all_listings,
    create_listing, create_review, delete_listing, delete_review, favorites, get_listing,
    get_review, record_view, remove_favorite, search_favorites, search_listings, update_listing,
    update_listing_status, user_listings,
};
pub use models::{ListingModel, ReviewModel};
pub use service::ListingService;

// Internal modules
mod handlers;
pub mod models;
pub mod repository;
mod service;
pub mod types;
