use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::models::{
    FavoriteModel, ListingChanges, ListingModel, NewListing, NewReview, ReviewModel,
};
use crate::shared::AppError;

/// Storage for listings and the favorites and reviews that hang off them
#[async_trait]
pub trait ListingRepository {
    async fn create_listing(&self, listing: &NewListing) -> Result<ListingModel, AppError>;
    async fn list_listings(&self) -> Result<Vec<ListingModel>, AppError>;
    async fn search_listings(&self, keyword: &str) -> Result<Vec<ListingModel>, AppError>;
    async fn get_listing(&self, id: i32) -> Result<Option<ListingModel>, AppError>;
    async fn list_admin_listings(&self, admin_id: i32) -> Result<Vec<ListingModel>, AppError>;
    /// Fails with `NotFound` unless the listing belongs to `admin_id`
    async fn update_listing(
        &self,
        id: i32,
        admin_id: i32,
        changes: &ListingChanges,
    ) -> Result<(), AppError>;
    async fn increment_views(&self, id: i32) -> Result<(), AppError>;
    /// Removes the listing with its favorites and reviews
    async fn delete_listing(&self, id: i32, admin_id: i32) -> Result<(), AppError>;

    async fn add_favorite(&self, user_id: i32, listing_id: i32) -> Result<FavoriteModel, AppError>;
    async fn favorite_listings(&self, user_id: i32) -> Result<Vec<ListingModel>, AppError>;
    async fn remove_favorite(&self, user_id: i32, listing_id: i32) -> Result<(), AppError>;

    async fn create_review(&self, review: &NewReview) -> Result<ReviewModel, AppError>;
    async fn get_review(&self, id: i32, user_id: i32) -> Result<Option<ReviewModel>, AppError>;
    async fn reviews_for_listing(&self, listing_id: i32) -> Result<Vec<ReviewModel>, AppError>;
    async fn delete_review(&self, id: i32, user_id: i32) -> Result<(), AppError>;
}

#[derive(Default)]
struct ListingTables {
    next_listing_id: i32,
    next_favorite_id: i32,
    next_review_id: i32,
    listings: BTreeMap<i32, ListingModel>,
    favorites: Vec<FavoriteModel>,
    reviews: Vec<ReviewModel>,
}

impl ListingTables {
    fn owned_listing_mut(&mut self, id: i32, admin_id: i32) -> Result<&mut ListingModel, AppError> {
        self.listings
            .get_mut(&id)
            .filter(|listing| listing.admin_id == admin_id)
            .ok_or_else(|| AppError::NotFound("listing not found".to_string()))
    }
}

/// In-memory implementation of ListingRepository for development and testing
#[derive(Default)]
pub struct InMemoryListingRepository {
    tables: Mutex<ListingTables>,
}

impl InMemoryListingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn favorite_count(&self) -> usize {
        self.tables.lock().await.favorites.len()
    }

    pub async fn review_count(&self) -> usize {
        self.tables.lock().await.reviews.len()
    }
}

#[async_trait]
impl ListingRepository for InMemoryListingRepository {
    #[instrument(skip(self, listing), fields(admin_id = listing.admin_id))]
    async fn create_listing(&self, listing: &NewListing) -> Result<ListingModel, AppError> {
        let mut tables = self.tables.lock().await;
        tables.next_listing_id += 1;

        let model = ListingModel {
            id: tables.next_listing_id,
            admin_id: listing.admin_id,
            title: listing.title.clone(),
            description: listing.description.clone(),
            price: listing.price.clone(),
            location: listing.location.clone(),
            available: listing.available,
            total_views: 0,
            image_links: listing.image_links.clone(),
            created_at: Utc::now(),
        };
        tables.listings.insert(model.id, model.clone());

        debug!(id = model.id, "Listing created in memory");
        Ok(model)
    }

    async fn list_listings(&self) -> Result<Vec<ListingModel>, AppError> {
        Ok(self.tables.lock().await.listings.values().cloned().collect())
    }

    async fn search_listings(&self, keyword: &str) -> Result<Vec<ListingModel>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .listings
            .values()
            .filter(|listing| listing.matches(keyword))
            .cloned()
            .collect())
    }

    async fn get_listing(&self, id: i32) -> Result<Option<ListingModel>, AppError> {
        Ok(self.tables.lock().await.listings.get(&id).cloned())
    }

    async fn list_admin_listings(&self, admin_id: i32) -> Result<Vec<ListingModel>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .listings
            .values()
            .filter(|listing| listing.admin_id == admin_id)
            .cloned()
            .collect())
    }

    #[instrument(skip(self, changes))]
    async fn update_listing(
        &self,
        id: i32,
        admin_id: i32,
        changes: &ListingChanges,
    ) -> Result<(), AppError> {
        let mut tables = self.tables.lock().await;
        changes.apply(tables.owned_listing_mut(id, admin_id)?);
        Ok(())
    }

    async fn increment_views(&self, id: i32) -> Result<(), AppError> {
        let mut tables = self.tables.lock().await;
        let listing = tables
            .listings
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("listing not found".to_string()))?;
        listing.total_views += 1;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_listing(&self, id: i32, admin_id: i32) -> Result<(), AppError> {
        let mut tables = self.tables.lock().await;
        tables.owned_listing_mut(id, admin_id)?;

        tables.listings.remove(&id);
        tables.favorites.retain(|favorite| favorite.listing_id != id);
        tables.reviews.retain(|review| review.listing_id != id);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn add_favorite(&self, user_id: i32, listing_id: i32) -> Result<FavoriteModel, AppError> {
        let mut tables = self.tables.lock().await;
        if !tables.listings.contains_key(&listing_id) {
            return Err(AppError::NotFound("listing not found".to_string()));
        }
        if tables
            .favorites
            .iter()
            .any(|f| f.user_id == user_id && f.listing_id == listing_id)
        {
            warn!("Favorite already exists in memory");
            return Err(AppError::Conflict("listing is already a favorite".to_string()));
        }

        tables.next_favorite_id += 1;
        let model = FavoriteModel {
            id: tables.next_favorite_id,
            user_id,
            listing_id,
            created_at: Utc::now(),
        };
        tables.favorites.push(model.clone());
        Ok(model)
    }

    async fn favorite_listings(&self, user_id: i32) -> Result<Vec<ListingModel>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .favorites
            .iter()
            .filter(|favorite| favorite.user_id == user_id)
            .filter_map(|favorite| tables.listings.get(&favorite.listing_id).cloned())
            .collect())
    }

    #[instrument(skip(self))]
    async fn remove_favorite(&self, user_id: i32, listing_id: i32) -> Result<(), AppError> {
        let mut tables = self.tables.lock().await;
        let before = tables.favorites.len();
        tables
            .favorites
            .retain(|f| !(f.user_id == user_id && f.listing_id == listing_id));

        if tables.favorites.len() == before {
            return Err(AppError::NotFound("favorite not found".to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self, review), fields(listing_id = review.listing_id))]
    async fn create_review(&self, review: &NewReview) -> Result<ReviewModel, AppError> {
        let mut tables = self.tables.lock().await;
        if !tables.listings.contains_key(&review.listing_id) {
            return Err(AppError::NotFound("listing not found".to_string()));
        }

        tables.next_review_id += 1;
        let model = ReviewModel {
            id: tables.next_review_id,
            user_id: review.user_id,
            listing_id: review.listing_id,
            rating: review.rating,
            comment: review.comment.clone(),
            created_at: Utc::now(),
            username: review.username.clone(),
        };
        tables.reviews.push(model.clone());
        Ok(model)
    }

    async fn get_review(&self, id: i32, user_id: i32) -> Result<Option<ReviewModel>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .reviews
            .iter()
            .find(|review| review.id == id && review.user_id == user_id)
            .cloned())
    }

    async fn reviews_for_listing(&self, listing_id: i32) -> Result<Vec<ReviewModel>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .reviews
            .iter()
            .filter(|review| review.listing_id == listing_id)
            .cloned()
            .collect())
    }

    #[instrument(skip(self))]
    async fn delete_review(&self, id: i32, user_id: i32) -> Result<(), AppError> {
        let mut tables = self.tables.lock().await;
        let before = tables.reviews.len();
        tables
            .reviews
            .retain(|review| !(review.id == id && review.user_id == user_id));

        if tables.reviews.len() == before {
            return Err(AppError::NotFound("review not found".to_string()));
        }
        Ok(())
    }
}

/// PostgreSQL implementation of listing repository
pub struct PostgresListingRepository {
    pool: PgPool,
}

impl PostgresListingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const LISTING_COLUMNS: &str = "l.id, l.admin_id, l.title, l.description, l.price::TEXT AS price, \
     l.location, l.available, l.total_views, l.image_links, l.created_at";

fn database_error(error: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_error) = &error {
        if db_error.is_unique_violation() {
            return AppError::Conflict("listing is already a favorite".to_string());
        }
        if db_error.is_foreign_key_violation() {
            return AppError::NotFound("listing not found".to_string());
        }
    }
    warn!(error = %error, "Database query failed");
    AppError::DatabaseError(error.to_string())
}

fn require_one_row(rows_affected: u64, what: &str) -> Result<(), AppError> {
    if rows_affected == 0 {
        return Err(AppError::NotFound(format!("{what} not found")));
    }
    Ok(())
}

/// ILIKE pattern matching `keyword` literally anywhere in the column
fn contains_pattern(keyword: &str) -> String {
    let escaped = keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[async_trait]
impl ListingRepository for PostgresListingRepository {
    #[instrument(skip(self, listing), fields(admin_id = listing.admin_id))]
    async fn create_listing(&self, listing: &NewListing) -> Result<ListingModel, AppError> {
        let sql = format!(
            "INSERT INTO listings AS l \
             (admin_id, title, description, price, location, available, image_links) \
             VALUES ($1, $2, $3, $4::NUMERIC, $5, $6, $7) \
             RETURNING {LISTING_COLUMNS}"
        );

        let model = sqlx::query_as::<_, ListingModel>(&sql)
            .bind(listing.admin_id)
            .bind(&listing.title)
            .bind(&listing.description)
            .bind(&listing.price)
            .bind(&listing.location)
            .bind(listing.available)
            .bind(&listing.image_links)
            .fetch_one(&self.pool)
            .await
            .map_err(database_error)?;

        debug!(id = model.id, "Listing created in database");
        Ok(model)
    }

    async fn list_listings(&self) -> Result<Vec<ListingModel>, AppError> {
        let sql = format!("SELECT {LISTING_COLUMNS} FROM listings l ORDER BY l.id");
        sqlx::query_as::<_, ListingModel>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(database_error)
    }

    #[instrument(skip(self))]
    async fn search_listings(&self, keyword: &str) -> Result<Vec<ListingModel>, AppError> {
        let sql = format!(
            "SELECT {LISTING_COLUMNS} FROM listings l \
             WHERE l.title ILIKE $1 OR l.description ILIKE $1 OR l.location ILIKE $1 \
             ORDER BY l.id"
        );
        sqlx::query_as::<_, ListingModel>(&sql)
            .bind(contains_pattern(keyword))
            .fetch_all(&self.pool)
            .await
            .map_err(database_error)
    }

    async fn get_listing(&self, id: i32) -> Result<Option<ListingModel>, AppError> {
        let sql = format!("SELECT {LISTING_COLUMNS} FROM listings l WHERE l.id = $1");
        sqlx::query_as::<_, ListingModel>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)
    }

    async fn list_admin_listings(&self, admin_id: i32) -> Result<Vec<ListingModel>, AppError> {
        let sql =
            format!("SELECT {LISTING_COLUMNS} FROM listings l WHERE l.admin_id = $1 ORDER BY l.id");
        sqlx::query_as::<_, ListingModel>(&sql)
            .bind(admin_id)
            .fetch_all(&self.pool)
            .await
            .map_err(database_error)
    }

    #[instrument(skip(self, changes))]
    async fn update_listing(
        &self,
        id: i32,
        admin_id: i32,
        changes: &ListingChanges,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE listings SET \
             title = COALESCE($3, title), \
             description = COALESCE($4, description), \
             price = COALESCE($5::NUMERIC, price), \
             location = COALESCE($6, location), \
             available = COALESCE($7, available), \
             image_links = COALESCE($8, image_links) \
             WHERE id = $1 AND admin_id = $2",
        )
        .bind(id)
        .bind(admin_id)
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(&changes.price)
        .bind(&changes.location)
        .bind(changes.available)
        .bind(&changes.image_links)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        require_one_row(result.rows_affected(), "listing")
    }

    async fn increment_views(&self, id: i32) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE listings SET total_views = total_views + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        require_one_row(result.rows_affected(), "listing")
    }

    #[instrument(skip(self))]
    async fn delete_listing(&self, id: i32, admin_id: i32) -> Result<(), AppError> {
        // favorites and reviews go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM listings WHERE id = $1 AND admin_id = $2")
            .bind(id)
            .bind(admin_id)
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        require_one_row(result.rows_affected(), "listing")
    }

    #[instrument(skip(self))]
    async fn add_favorite(&self, user_id: i32, listing_id: i32) -> Result<FavoriteModel, AppError> {
        sqlx::query_as::<_, FavoriteModel>(
            "INSERT INTO favorites (user_id, listing_id) VALUES ($1, $2) \
             RETURNING id, user_id, listing_id, created_at",
        )
        .bind(user_id)
        .bind(listing_id)
        .fetch_one(&self.pool)
        .await
        .map_err(database_error)
    }

    async fn favorite_listings(&self, user_id: i32) -> Result<Vec<ListingModel>, AppError> {
        let sql = format!(
            "SELECT {LISTING_COLUMNS} FROM favorites f \
             JOIN listings l ON l.id = f.listing_id \
             WHERE f.user_id = $1 ORDER BY f.id"
        );
        sqlx::query_as::<_, ListingModel>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(database_error)
    }

    #[instrument(skip(self))]
    async fn remove_favorite(&self, user_id: i32, listing_id: i32) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND listing_id = $2")
            .bind(user_id)
            .bind(listing_id)
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        require_one_row(result.rows_affected(), "favorite")
    }

    #[instrument(skip(self, review), fields(listing_id = review.listing_id))]
    async fn create_review(&self, review: &NewReview) -> Result<ReviewModel, AppError> {
        sqlx::query_as::<_, ReviewModel>(
            "WITH inserted AS ( \
                 INSERT INTO reviews (user_id, listing_id, rating, comment) \
                 VALUES ($1, $2, $3, $4) \
                 RETURNING id, user_id, listing_id, rating, comment, created_at \
             ) \
             SELECT i.id, i.user_id, i.listing_id, i.rating, i.comment, i.created_at, u.username \
             FROM inserted i JOIN users u ON u.id = i.user_id",
        )
        .bind(review.user_id)
        .bind(review.listing_id)
        .bind(review.rating)
        .bind(&review.comment)
        .fetch_one(&self.pool)
        .await
        .map_err(database_error)
    }

    async fn get_review(&self, id: i32, user_id: i32) -> Result<Option<ReviewModel>, AppError> {
        sqlx::query_as::<_, ReviewModel>(
            "SELECT r.id, r.user_id, r.listing_id, r.rating, r.comment, r.created_at, u.username \
             FROM reviews r JOIN users u ON u.id = r.user_id \
             WHERE r.id = $1 AND r.user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)
    }

    async fn reviews_for_listing(&self, listing_id: i32) -> Result<Vec<ReviewModel>, AppError> {
        sqlx::query_as::<_, ReviewModel>(
            "SELECT r.id, r.user_id, r.listing_id, r.rating, r.comment, r.created_at, u.username \
             FROM reviews r JOIN users u ON u.id = r.user_id \
             WHERE r.listing_id = $1 ORDER BY r.id",
        )
        .bind(listing_id)
        .fetch_all(&self.pool)
        .await
        .map_err(database_error)
    }

    #[instrument(skip(self))]
    async fn delete_review(&self, id: i32, user_id: i32) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        require_one_row(result.rows_affected(), "review")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_listing(admin_id: i32, title: &str) -> NewListing {
        NewListing {
            admin_id,
            title: title.to_string(),
            description: Some("Quiet street, two bedrooms".to_string()),
            price: "120.00".to_string(),
            location: Some("Nairobi".to_string()),
            available: true,
            image_links: vec!["https://img/1.jpg".to_string()],
        }
    }

    fn new_review(user_id: i32, listing_id: i32) -> NewReview {
        NewReview {
            user_id,
            username: "bob".to_string(),
            listing_id,
            rating: 4,
            comment: "Lovely stay".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_list_and_search() {
        let repo = InMemoryListingRepository::new();
        let loft = repo.create_listing(&new_listing(1, "Sunny loft")).await.unwrap();
        repo.create_listing(&new_listing(2, "Beach house")).await.unwrap();

        assert_eq!(loft.id, 1);
        assert_eq!(loft.total_views, 0);
        assert_eq!(repo.list_listings().await.unwrap().len(), 2);
        assert_eq!(repo.list_admin_listings(1).await.unwrap(), vec![loft.clone()]);

        let found = repo.search_listings("beach").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Beach house");
        assert_eq!(repo.search_listings("nairobi").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_and_delete_require_owner() {
        let repo = InMemoryListingRepository::new();
        let listing = repo.create_listing(&new_listing(1, "Sunny loft")).await.unwrap();
        let changes = ListingChanges {
            available: Some(false),
            ..ListingChanges::default()
        };

        let result = repo.update_listing(listing.id, 2, &changes).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        let result = repo.delete_listing(listing.id, 2).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        repo.update_listing(listing.id, 1, &changes).await.unwrap();
        let updated = repo.get_listing(listing.id).await.unwrap().unwrap();
        assert!(!updated.available);
        assert_eq!(updated.title, "Sunny loft");
    }

    #[tokio::test]
    async fn test_views_are_counted() {
        let repo = InMemoryListingRepository::new();
        let listing = repo.create_listing(&new_listing(1, "Sunny loft")).await.unwrap();

        repo.increment_views(listing.id).await.unwrap();
        repo.increment_views(listing.id).await.unwrap();
        assert_eq!(repo.get_listing(listing.id).await.unwrap().unwrap().total_views, 2);

        let result = repo.increment_views(99).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_favorites() {
        let repo = InMemoryListingRepository::new();
        let listing = repo.create_listing(&new_listing(1, "Sunny loft")).await.unwrap();

        repo.add_favorite(7, listing.id).await.unwrap();
        let result = repo.add_favorite(7, listing.id).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        let result = repo.add_favorite(7, 99).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        assert_eq!(repo.favorite_listings(7).await.unwrap(), vec![listing.clone()]);
        assert!(repo.favorite_listings(8).await.unwrap().is_empty());

        repo.remove_favorite(7, listing.id).await.unwrap();
        let result = repo.remove_favorite(7, listing.id).await;
        assert!(matches!(result, Err(AppError::NotFound(msg)) if msg == "favorite not found"));
    }

    #[tokio::test]
    async fn test_reviews_belong_to_their_author() {
        let repo = InMemoryListingRepository::new();
        let listing = repo.create_listing(&new_listing(1, "Sunny loft")).await.unwrap();

        let review = repo.create_review(&new_review(7, listing.id)).await.unwrap();
        assert_eq!(review.username, "bob");
        assert!(repo.get_review(review.id, 8).await.unwrap().is_none());
        assert_eq!(repo.get_review(review.id, 7).await.unwrap(), Some(review.clone()));
        assert_eq!(repo.reviews_for_listing(listing.id).await.unwrap().len(), 1);

        let result = repo.delete_review(review.id, 8).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        repo.delete_review(review.id, 7).await.unwrap();
        assert_eq!(repo.review_count().await, 0);
    }

    #[tokio::test]
    async fn test_deleting_listing_removes_favorites_and_reviews() {
        let repo = InMemoryListingRepository::new();
        let listing = repo.create_listing(&new_listing(1, "Sunny loft")).await.unwrap();
        repo.add_favorite(7, listing.id).await.unwrap();
        repo.create_review(&new_review(7, listing.id)).await.unwrap();

        repo.delete_listing(listing.id, 1).await.unwrap();

        assert!(repo.get_listing(listing.id).await.unwrap().is_none());
        assert_eq!(repo.favorite_count().await, 0);
        assert_eq!(repo.review_count().await, 0);
    }

    #[test]
    fn test_search_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("loft"), "%loft%");
        assert_eq!(contains_pattern("100%_off"), "%100\\%\\_off%");
    }
}
