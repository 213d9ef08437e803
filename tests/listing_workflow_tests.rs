use axum::http::StatusCode;
use chrono::Duration;
use serde_json::json;

mod utils;

use utils::*;

fn loft() -> serde_json::Value {
    json!({
        "title": "Sunny loft",
        "description": "Two rooms near the lake",
        "price": "120",
        "location": "Nairobi",
        "imagelinks": ["https://img.example/loft-1.jpg"],
    })
}

async fn create_listing(setup: &TestSetup, admin: &str, listing: serde_json::Value) -> i64 {
    let response = setup
        .post_json_with_cookies("/api/listing/create", listing, admin)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_admin_listing_lifecycle() {
    let setup = TestSetupBuilder::new().build();
    let admin = setup.signed_in("admin", "alice", "a@x.com").await;

    let response = setup
        .post_json_with_cookies("/api/listing/create", loft(), &admin)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["price"], "120.00");
    assert_eq!(created["available"], true);
    assert_eq!(created["imagelink"][0], "https://img.example/loft-1.jpg");
    let id = created["id"].as_i64().unwrap();

    // Browsing is public
    let response = setup.get_with_cookies("/api/listing", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

    let response = setup
        .put_json_with_cookies(
            &format!("/api/listing/admin/listing/update/{id}"),
            json!({ "title": "", "price": "95.5" }),
            &admin,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "listing updated successfully");

    let response = setup
        .put_json_with_cookies(
            &format!("/api/listing/listing/status/{id}"),
            json!({ "available": false }),
            &admin,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "listing status updated");

    let response = setup
        .get_with_cookies(&format!("/api/listing/admin/listing/{id}"), Some(&admin))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let listing = body_json(response).await;
    assert_eq!(listing["title"], "Sunny loft");
    assert_eq!(listing["price"], "95.50");
    assert_eq!(listing["available"], false);

    let response = setup
        .delete_with_cookies(&format!("/api/listing/admin/listing/{id}"), &admin)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "listing deleted successfully");

    let response = setup
        .get_with_cookies(&format!("/api/listing/{id}"), Some(&admin))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "listing not found");
}

#[tokio::test]
async fn test_listing_writes_need_an_owning_admin() {
    let setup = TestSetupBuilder::new().build();
    let owner = setup.signed_in("admin", "alice", "a@x.com").await;
    let rival = setup.signed_in("admin", "carol", "c@x.com").await;
    let user = setup.signed_in("user", "bob", "b@x.com").await;

    // No session at all
    let response = setup.post_json("/api/listing/create", loft()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = setup
        .post_json_with_cookies("/api/listing/create", loft(), &user)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "unauthorized admins only");

    let id = create_listing(&setup, &owner, loft()).await;

    let response = setup
        .delete_with_cookies(&format!("/api/listing/admin/listing/{id}"), &rival)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = setup
        .get_with_cookies("/api/listing/admin/listing", Some(&rival))
        .await;
    assert_eq!(body_json(response).await, json!([]));

    let response = setup
        .get_with_cookies("/api/listing/admin/listing", Some(&owner))
        .await;
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_search_and_view_counter() {
    let setup = TestSetupBuilder::new().build();
    let admin = setup.signed_in("admin", "alice", "a@x.com").await;
    let id = create_listing(&setup, &admin, loft()).await;
    create_listing(
        &setup,
        &admin,
        json!({
            "title": "Beach house",
            "price": "300",
            "location": "Mombasa",
            "imagelinks": ["https://img.example/beach.jpg"],
        }),
    )
    .await;

    let response = setup
        .get_with_cookies("/api/listing/search?keyword=mombasa", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let found = body_json(response).await;
    assert_eq!(found.as_array().unwrap().len(), 1);
    assert_eq!(found[0]["title"], "Beach house");

    let response = setup.get_with_cookies("/api/listing/search?keyword=", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    for _ in 0..3 {
        let response = setup
            .get_with_cookies(&format!("/api/listings/{id}/views"), None)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = setup
        .get_with_cookies(&format!("/api/listing/admin/listing/{id}"), Some(&admin))
        .await;
    assert_eq!(body_json(response).await["total_views"], 3);
}

#[tokio::test]
async fn test_user_favorites() {
    let setup = TestSetupBuilder::new().build();
    let admin = setup.signed_in("admin", "alice", "a@x.com").await;
    let user = setup.signed_in("user", "bob", "b@x.com").await;
    let id = create_listing(&setup, &admin, loft()).await;

    let response = setup
        .post_json_with_cookies("/api/favorites", json!({ "listing_id": id }), &user)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["message"], "Favorite created successfully");

    let response = setup
        .post_json_with_cookies("/api/favorites", json!({ "listing_id": id }), &user)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = setup
        .post_json_with_cookies("/api/favorites", json!({ "listing_id": id }), &admin)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = setup.get_with_cookies("/api/listing/user", Some(&user)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let listings = body_json(response).await;
    assert_eq!(listings[0]["bookmarkStatus"], true);

    let response = setup
        .get_with_cookies("/api/favorites/search?keyword=lake", Some(&user))
        .await;
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

    let response = setup
        .delete_with_cookies(&format!("/api/favorites/{id}"), &user)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "favorite deleted successfully");

    let response = setup.get_with_cookies("/api/favorites", Some(&user)).await;
    assert_eq!(body_json(response).await, json!([]));
    assert_eq!(setup.listings.favorite_count().await, 0);
}

#[tokio::test]
async fn test_reviews_appear_on_listing() {
    let setup = TestSetupBuilder::new().build();
    let admin = setup.signed_in("admin", "alice", "a@x.com").await;
    let user = setup.signed_in("user", "bob", "b@x.com").await;
    let id = create_listing(&setup, &admin, loft()).await;

    let response = setup
        .post_json_with_cookies(
            "/api/reviews",
            json!({ "listingId": id, "rating": 6, "comment": "Too good" }),
            &user,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = setup
        .post_json_with_cookies(
            "/api/reviews",
            json!({ "listingId": id, "rating": 5, "comment": "Great host" }),
            &user,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let review = body_json(response).await;
    assert_eq!(review["username"], "bob");
    let review_id = review["id"].as_i64().unwrap();

    let response = setup
        .get_with_cookies(&format!("/api/listing/{id}"), Some(&user))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let detail = body_json(response).await;
    assert_eq!(detail["title"], "Sunny loft");
    assert_eq!(detail["reviews"][0]["comment"], "Great host");
    assert_eq!(detail["reviews"][0]["rating"], 5);

    let response = setup
        .get_with_cookies(
            &format!("/api/listing/admin/listing/{id}/reviews"),
            Some(&admin),
        )
        .await;
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

    // Only the author can read or delete their review
    let response = setup
        .get_with_cookies(&format!("/api/reviews/{review_id}"), Some(&admin))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = setup
        .delete_with_cookies(&format!("/api/reviews/{review_id}"), &user)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "Review deleted successfully");
    assert_eq!(setup.listings.review_count().await, 0);
}

#[tokio::test]
async fn test_listing_routes_renew_expired_sessions() {
    let setup = TestSetupBuilder::new().build();
    let admin = setup.signed_in("admin", "alice", "a@x.com").await;

    setup.clock.advance(Duration::hours(73));

    let response = setup
        .post_json_with_cookies("/api/listing/create", loft(), &admin)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let issued = set_cookies(&response);
    assert!(cookie_value(&issued, "token").is_some_and(|token| !token.is_empty()));
}
