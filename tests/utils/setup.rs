use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

use rental::{
    account::repository::{AccountRepository, InMemoryAccountRepository},
    build_router,
    listing::repository::{InMemoryListingRepository, ListingRepository},
    tasks::{InMemoryTaskQueue, TaskQueue},
    AppConfig, AppState, ManualClock, TokenIssuer,
};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub app: Router,
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    pub accounts: Arc<InMemoryAccountRepository>,
    pub listings: Arc<InMemoryListingRepository>,
    pub queue: Arc<InMemoryTaskQueue>,
}

pub struct TestSetupBuilder {
    config: AppConfig,
    task_queue: Option<Arc<dyn TaskQueue + Send + Sync>>,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::for_tests(),
            task_queue: None,
        }
    }

    /// Replaces the in-memory queue the handlers enqueue to
    pub fn with_task_queue(mut self, queue: Arc<dyn TaskQueue + Send + Sync>) -> Self {
        self.task_queue = Some(queue);
        self
    }

    pub fn build(self) -> TestSetup {
        let clock = Arc::new(ManualClock::starting_now());
        let token_issuer = Arc::new(
            TokenIssuer::new(&self.config.secret_key, clock.clone())
                .expect("test secret is not empty"),
        );
        let accounts = Arc::new(InMemoryAccountRepository::new());
        let listings = Arc::new(InMemoryListingRepository::new());
        let queue = Arc::new(InMemoryTaskQueue::new(self.config.worker.queue.clone()));

        let state = AppState::new(
            Arc::new(self.config),
            clock.clone(),
            token_issuer,
            accounts.clone() as Arc<dyn AccountRepository + Send + Sync>,
            listings.clone() as Arc<dyn ListingRepository + Send + Sync>,
            self.task_queue
                .unwrap_or_else(|| queue.clone() as Arc<dyn TaskQueue + Send + Sync>),
        );

        TestSetup {
            app: build_router(state.clone()),
            state,
            clock,
            accounts,
            listings,
            queue,
        }
    }
}

impl Default for TestSetupBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestSetup {
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response {
        self.send(json_request("POST", uri, body, None)).await
    }

    pub async fn put_json_with_cookies(
        &self,
        uri: &str,
        body: serde_json::Value,
        cookies: &str,
    ) -> Response {
        self.send(json_request("PUT", uri, body, Some(cookies)))
            .await
    }

    pub async fn post_json_with_cookies(
        &self,
        uri: &str,
        body: serde_json::Value,
        cookies: &str,
    ) -> Response {
        self.send(json_request("POST", uri, body, Some(cookies)))
            .await
    }

    pub async fn delete_with_cookies(&self, uri: &str, cookies: &str) -> Response {
        let request = Request::builder()
            .method("DELETE")
            .uri(uri)
            .header(header::COOKIE, cookies)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn get_with_cookies(&self, uri: &str, cookies: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookies) = cookies {
            builder = builder.header(header::COOKIE, cookies);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_with_cookies(&self, uri: &str, cookies: &str) -> Response {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::COOKIE, cookies)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Registers through the API and returns the verification link that was queued
    pub async fn register(&self, role: &str, username: &str, email: &str, password: &str) -> String {
        let response = self
            .post_json(
                &format!("/api/{role}/register"),
                serde_json::json!({
                    "username": username,
                    "password": password,
                    "email": email,
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let job = self
            .queue
            .pending()
            .await
            .into_iter()
            .rev()
            .find(|job| job.payload["to_email"] == email)
            .expect("verification email queued");
        job.payload["verification_link"]
            .as_str()
            .expect("link is a string")
            .to_string()
    }

    /// Follows a verification link against the router; returns the redirect response
    pub async fn follow_link(&self, link: &str) -> Response {
        let path = link
            .strip_prefix(&self.state.config.public_base_url)
            .expect("link points at this server");
        self.get_with_cookies(path, None).await
    }

    /// Registers, verifies and logs in; returns the session `Cookie` header value
    pub async fn signed_in(&self, role: &str, username: &str, email: &str) -> String {
        let link = self.register(role, username, email, "secret1").await;
        let response = self.follow_link(&link).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        self.login(role, email, "secret1").await
    }

    /// Logs in and returns a `Cookie` header value carrying both session cookies
    pub async fn login(&self, role: &str, email: &str, password: &str) -> String {
        let response = self
            .post_json(
                &format!("/api/{role}/login"),
                serde_json::json!({ "email": email, "password": password }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let cookies = set_cookies(&response);
        let token = cookie_value(&cookies, "token").expect("token cookie set");
        let refresh = cookie_value(&cookies, "refreshToken").expect("refreshToken cookie set");
        format!("token={token}; refreshToken={refresh}")
    }
}

fn json_request(
    method: &str,
    uri: &str,
    body: serde_json::Value,
    cookies: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookies) = cookies {
        builder = builder.header(header::COOKIE, cookies);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// All `Set-Cookie` header values of a response
pub fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

/// Value of the named cookie among `Set-Cookie` headers
pub fn cookie_value(set_cookies: &[String], name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    set_cookies.iter().find_map(|cookie| {
        cookie
            .strip_prefix(&prefix)
            .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
    })
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
