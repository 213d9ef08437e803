use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::instrument;

use super::{
    models::ListingModel,
    service::ListingService,
    types::{
        CreateFavoriteRequest, CreateListingRequest, CreateReviewRequest, ListingDetailResponse,
        ListingResponse, ListingStatusRequest, ReviewResponse, SearchParams, StatusResponse,
        UpdateListingRequest, UserListingResponse,
    },
};
use crate::account::types::MessageResponse;
use crate::session::Identity;
use crate::shared::{AppError, AppState};

fn listing_responses(listings: Vec<ListingModel>) -> Json<Vec<ListingResponse>> {
    Json(listings.into_iter().map(ListingResponse::from).collect())
}

/// GET /api/listing
pub async fn all_listings(
    State(state): State<AppState>,
) -> Result<Json<Vec<ListingResponse>>, AppError> {
    let listings = ListingService::from_state(&state).all_listings().await?;
    Ok(listing_responses(listings))
}

/// GET /api/listing/search?keyword=
pub async fn search_listings(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<ListingResponse>>, AppError> {
    let listings = ListingService::from_state(&state)
        .search_listings(&params.keyword)
        .await?;
    Ok(listing_responses(listings))
}

/// GET /api/listings/{id}/views
pub async fn record_view(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<StatusResponse>, AppError> {
    ListingService::from_state(&state).record_view(id).await?;
    Ok(Json(StatusResponse::new("view count incremented")))
}

/// GET /api/listing/user
pub async fn user_listings(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<UserListingResponse>>, AppError> {
    let listings = ListingService::from_state(&state)
        .listings_for_user(&identity)
        .await?;

    Ok(Json(
        listings
            .into_iter()
            .map(|(listing, bookmark_status)| UserListingResponse {
                listing: listing.into(),
                bookmark_status,
            })
            .collect(),
    ))
}

/// POST /api/listing/create
#[instrument(name = "create_listing", skip(state, identity, request), fields(id = identity.id))]
pub async fn create_listing(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<CreateListingRequest>,
) -> Result<(StatusCode, Json<ListingResponse>), AppError> {
    let listing = ListingService::from_state(&state)
        .create_listing(&identity, request)
        .await?;
    Ok((StatusCode::CREATED, Json(listing.into())))
}

/// GET /api/listing/{id}
pub async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ListingDetailResponse>, AppError> {
    let (listing, reviews) = ListingService::from_state(&state).listing_detail(id).await?;

    Ok(Json(ListingDetailResponse {
        listing: listing.into(),
        reviews: reviews.into_iter().map(ReviewResponse::from).collect(),
    }))
}

/// GET /api/listing/admin/listing
pub async fn admin_listings(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<ListingResponse>>, AppError> {
    let listings = ListingService::from_state(&state)
        .admin_listings(&identity)
        .await?;
    Ok(listing_responses(listings))
}

/// GET /api/listing/admin/listing/{id}
pub async fn admin_listing(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i32>,
) -> Result<Json<ListingResponse>, AppError> {
    let listing = ListingService::from_state(&state)
        .admin_listing(&identity, id)
        .await?;
    Ok(Json(listing.into()))
}

/// GET /api/listing/admin/listing/{id}/reviews
pub async fn admin_listing_reviews(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<ReviewResponse>>, AppError> {
    let reviews = ListingService::from_state(&state)
        .admin_listing_reviews(&identity, id)
        .await?;
    Ok(Json(reviews.into_iter().map(ReviewResponse::from).collect()))
}

/// PUT /api/listing/admin/listing/update/{id}
#[instrument(name = "update_listing", skip(state, identity, request), fields(id = identity.id))]
pub async fn update_listing(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(listing_id): Path<i32>,
    Json(request): Json<UpdateListingRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    ListingService::from_state(&state)
        .update_listing(&identity, listing_id, request)
        .await?;
    Ok(Json(StatusResponse::new("listing updated successfully")))
}

/// PUT /api/listing/listing/status/{id}
pub async fn update_listing_status(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(listing_id): Path<i32>,
    Json(request): Json<ListingStatusRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    ListingService::from_state(&state)
        .set_listing_status(&identity, listing_id, request.available)
        .await?;
    Ok(Json(MessageResponse::new("listing status updated")))
}

/// DELETE /api/listing/admin/listing/{id}
#[instrument(name = "delete_listing", skip(state, identity), fields(id = identity.id))]
pub async fn delete_listing(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(listing_id): Path<i32>,
) -> Result<Json<StatusResponse>, AppError> {
    ListingService::from_state(&state)
        .delete_listing(&identity, listing_id)
        .await?;
    Ok(Json(StatusResponse::new("listing deleted successfully")))
}

/// POST /api/favorites
pub async fn add_favorite(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<CreateFavoriteRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    ListingService::from_state(&state)
        .add_favorite(&identity, request.listing_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Favorite created successfully")),
    ))
}

/// GET /api/favorites
pub async fn favorites(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<ListingResponse>>, AppError> {
    let listings = ListingService::from_state(&state)
        .favorites(&identity)
        .await?;
    Ok(listing_responses(listings))
}

/// GET /api/favorites/search?keyword=
pub async fn search_favorites(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<ListingResponse>>, AppError> {
    let listings = ListingService::from_state(&state)
        .search_favorites(&identity, &params.keyword)
        .await?;
    Ok(listing_responses(listings))
}

/// DELETE /api/favorites/{listing_id}
pub async fn remove_favorite(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(listing_id): Path<i32>,
) -> Result<Json<StatusResponse>, AppError> {
    ListingService::from_state(&state)
        .remove_favorite(&identity, listing_id)
        .await?;
    Ok(Json(StatusResponse::new("favorite deleted successfully")))
}

/// POST /api/reviews
#[instrument(name = "create_review", skip(state, identity, request), fields(id = identity.id))]
pub async fn create_review(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<ReviewResponse>), AppError> {
    let review = ListingService::from_state(&state)
        .create_review(&identity, request)
        .await?;
    Ok((StatusCode::CREATED, Json(review.into())))
}

/// GET /api/reviews/{id}
pub async fn get_review(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i32>,
) -> Result<Json<ReviewResponse>, AppError> {
    let review = ListingService::from_state(&state)
        .review(&identity, id)
        .await?;
    Ok(Json(review.into()))
}

/// DELETE /api/reviews/{id}
pub async fn delete_review(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    ListingService::from_state(&state)
        .delete_review(&identity, id)
        .await?;
    Ok(Json(MessageResponse::new("Review deleted successfully")))
}
