// src/services/api_server.rs
//! API Server for the badge registry
//!
//! This module provides the REST API used by the static admin page:
//! - Administrator login and logout (session cookie)
//! - Badge issuance, gated on an admin session
//!
//! The API is built using Axum. Badge verification is intentionally not
//! served here: issued badges are public files in the registry repository
//! and are resolved by the static site through their verification link.

use crate::error::ApiError;
use crate::models::claims::SessionClaims;
use crate::services::authenticator::Authenticator;
use crate::services::badge_issuer::{BadgeIssuer, IssueRequest};
use crate::session::gate::{
    authorize, clear_cookie_directive, session_cookie, session_cookie_directive, SESSION_COOKIE,
};
use crate::settings::Settings;
use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

// API request and response structures

/// Request payload for administrator login
#[derive(Deserialize, Default)]
#[serde(default)]
struct LoginRequest {
    email: String,
    password: String,
}

/// Identity echoed back after a successful login
#[derive(Serialize, Deserialize)]
struct LoginUser {
    email: String,
    role: String,
}

/// Response for a successful login
#[derive(Serialize, Deserialize)]
struct LoginResponse {
    ok: bool,
    user: LoginUser,
}

/// Response for logout
#[derive(Serialize, Deserialize)]
struct LogoutResponse {
    ok: bool,
}

/// Response for badge issuance
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueResponse {
    ok: bool,
    id: String,
    verify_url: String,
}

/// API server state containing all service dependencies
pub struct ApiServer {
    settings: Arc<Settings>,

    /// Login credential checks and session signing
    authenticator: Authenticator,

    /// Badge issuance; `None` when no registry store is configured
    badge_issuer: Option<BadgeIssuer>,
}

/// Claims of a request that passed the session gate.
///
/// Extracting this before the body guarantees no handler touches the
/// registry for an unauthenticated request.
pub struct AdminSession(pub SessionClaims);

#[async_trait]
impl FromRequestParts<Arc<ApiServer>> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ApiServer>,
    ) -> Result<Self, Self::Rejection> {
        let secret = state
            .settings
            .auth_secret()
            .ok_or(ApiError::Configuration("AUTH_SECRET"))?;
        let token = session_cookie(&parts.headers, SESSION_COOKIE);
        let claims = authorize(
            token.as_deref(),
            secret.as_bytes(),
            &state.settings.admin_role,
            chrono::Utc::now().timestamp(),
        )
        .map_err(|_| ApiError::Unauthorized)?;
        Ok(AdminSession(claims))
    }
}

impl ApiServer {
    /// Creates a new instance of the API server
    ///
    /// # Arguments
    /// * `settings` - Loaded service configuration
    /// * `authenticator` - Service for login
    /// * `badge_issuer` - Service for issuance, if a store is available
    pub fn new(
        settings: Arc<Settings>,
        authenticator: Authenticator,
        badge_issuer: Option<BadgeIssuer>,
    ) -> Self {
        ApiServer {
            settings,
            authenticator,
            badge_issuer,
        }
    }

    /// Builds the router with CORS for the configured site origin
    ///
    /// # Errors
    /// Returns `ApiError::Configuration` if `SITE_ORIGIN` is not a valid header value.
    pub fn router(self) -> Result<Router, ApiError> {
        let origin = HeaderValue::from_str(&self.settings.site_origin)
            .map_err(|_| ApiError::Configuration("SITE_ORIGIN"))?;
        let cors = CorsLayer::new()
            .allow_origin(AllowOrigin::exact(origin))
            .allow_credentials(true)
            .allow_headers([header::CONTENT_TYPE])
            .allow_methods([Method::POST, Method::OPTIONS]);

        Ok(Router::new()
            .route(
                "/api/login",
                post(Self::login_handler)
                    .options(Self::preflight_handler)
                    .fallback(Self::method_not_allowed_handler),
            )
            .route(
                "/api/logout",
                post(Self::logout_handler)
                    .options(Self::preflight_handler)
                    .fallback(Self::method_not_allowed_handler),
            )
            .route(
                "/api/issue",
                post(Self::issue_handler)
                    .options(Self::preflight_handler)
                    .fallback(Self::method_not_allowed_handler),
            )
            .layer(cors)
            .with_state(Arc::new(self)))
    }

    /// Starts the API server and begins listening for requests
    ///
    /// # Arguments
    /// * `addr` - Socket address to bind to (e.g., "127.0.0.1:3000")
    pub async fn run(self, addr: SocketAddr) -> anyhow::Result<()> {
        let app = self.router()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }

    // =====================
    // Session Handlers
    // =====================

    /// Authenticates an administrator and sets the session cookie
    ///
    /// # Endpoint
    /// POST /api/login
    ///
    /// # Request Body
    /// JSON `{email, password}`; an unparsable body counts as empty credentials
    ///
    /// # Responses
    /// - 200 OK: `{ok, user: {email, role}}` with `Set-Cookie`
    /// - 401 Unauthorized: Email not allowed or wrong password
    /// - 500 Internal Server Error: Secrets not configured
    async fn login_handler(
        State(state): State<Arc<ApiServer>>,
        body: Bytes,
    ) -> Result<impl IntoResponse, ApiError> {
        let credentials: LoginRequest = serde_json::from_slice(&body).unwrap_or_default();
        let session = state.authenticator.login(
            &credentials.email,
            &credentials.password,
            chrono::Utc::now().timestamp(),
        )?;

        Ok((
            StatusCode::OK,
            [(
                header::SET_COOKIE,
                session_cookie_directive(&session.token, session.max_age_secs),
            )],
            Json(LoginResponse {
                ok: true,
                user: LoginUser {
                    email: session.claims.sub,
                    role: session.claims.role,
                },
            }),
        ))
    }

    /// Clears the session cookie
    ///
    /// # Endpoint
    /// POST /api/logout
    ///
    /// # Responses
    /// - 200 OK: `{ok: true}` with an expiring `Set-Cookie`
    async fn logout_handler() -> impl IntoResponse {
        (
            StatusCode::OK,
            [(header::SET_COOKIE, clear_cookie_directive())],
            Json(LogoutResponse { ok: true }),
        )
    }

    /// Answers bare `OPTIONS` requests that are not CORS preflights
    async fn preflight_handler() -> StatusCode {
        StatusCode::OK
    }

    /// Rejects any other method on a known route with the usual error body
    async fn method_not_allowed_handler() -> ApiError {
        ApiError::MethodNotAllowed
    }

    // =====================
    // Badge Handlers
    // =====================

    /// Issues a new badge and records it in the registry
    ///
    /// # Endpoint
    /// POST /api/issue
    ///
    /// # Request Body
    /// JSON `{name?, recipientName?, recipientEmail?, skills?, description?, image?}`
    ///
    /// # Responses
    /// - 200 OK: `{ok, id, verifyUrl}`
    /// - 401 Unauthorized: Missing, invalid or expired session, or wrong role
    /// - 409 Conflict: Registry kept changing underneath the update
    /// - 500 Internal Server Error: Secrets not configured
    /// - 502 Bad Gateway: Registry store failed
    async fn issue_handler(
        State(state): State<Arc<ApiServer>>,
        AdminSession(claims): AdminSession,
        body: Bytes,
    ) -> Result<Json<IssueResponse>, ApiError> {
        let issuer = state
            .badge_issuer
            .as_ref()
            .ok_or(ApiError::Configuration("GITHUB_TOKEN"))?;

        let badge = issuer.issue(IssueRequest::from_body(&body)).await?;
        log::info!("Badge {} issued by {}", badge.id, claims.sub);

        Ok(Json(IssueResponse {
            ok: true,
            id: badge.id,
            verify_url: badge.verify_url,
        }))
    }
}
