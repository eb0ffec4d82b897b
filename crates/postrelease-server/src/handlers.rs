use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Path, Query, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use url::form_urlencoded;

use crate::{
    control::{self, ControlReply, ControlRequest, Operation},
    error::PrxError,
    ip_auth::caller_ip,
    redirect::{AD_MARKER, MARKER_PARAM},
    store::NewPost,
    AppState,
};

// ── Health ────────────────────────────────────────────────────────────────────

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

// ── Site front door ───────────────────────────────────────────────────────────

/// Every request the router does not match otherwise. Decides, in order:
/// callback rejection, signup ping, control call, ad redirect, or "not ours".
pub async fn site_request(State(state): State<AppState>, request: Request) -> Response {
    let raw_query = request.uri().query().unwrap_or("").to_owned();
    let params: Vec<(String, String)> = form_urlencoded::parse(raw_query.as_bytes())
        .into_owned()
        .collect();
    let param = |name: &str| {
        params
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    };

    if let Some(callback) = param("callback") {
        if !is_valid_callback(callback) {
            warn!(callback, "rejecting malformed callback");
            return StatusCode::BAD_REQUEST.into_response();
        }
    }

    if param("do") == Some("update") && param("postrelease_enable") == Some("1") {
        return jsonp(param("callback").unwrap_or(""));
    }

    if let Some(req) = ControlRequest::from_query(&raw_query) {
        if req.operation != Operation::Unknown {
            let peer = request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr);
            let ip = caller_ip(peer, request.headers());
            return match control::dispatch(&state, &req, &ip).await {
                Ok(Some(reply)) => reply_response(reply),
                Ok(None) => not_handled(),
                Err(e) => internal_error(e),
            };
        }
    }

    if param(MARKER_PARAM) == Some(AD_MARKER) {
        match state.ad_redirect().resolve(&raw_query) {
            Ok(Some(target)) => {
                return (StatusCode::FOUND, [(header::LOCATION, target.to_string())]).into_response();
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "ad redirect failed; rendering normally"),
        }
    }

    not_handled()
}

/// `^\w*$` over ASCII word characters.
pub fn is_valid_callback(name: &str) -> bool {
    name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn jsonp(callback: &str) -> Response {
    let body = format!("{callback}({});", json!({"result": 1}));
    (
        [
            (header::CACHE_CONTROL, "no-cache, must-revalidate"),
            (header::CONTENT_TYPE, "application/javascript; charset=utf-8"),
        ],
        body,
    )
        .into_response()
}

fn reply_response(reply: ControlReply) -> Response {
    match reply {
        ControlReply::Silent => StatusCode::OK.into_response(),
        ControlReply::Text(text) => text.into_response(),
        ControlReply::Json(value) => Json(value).into_response(),
        ControlReply::Xml(xml) => ([(header::CONTENT_TYPE, "text/xml; charset=utf-8")], xml).into_response(),
    }
}

/// The host renders the page; nothing here for us.
fn not_handled() -> Response {
    StatusCode::NOT_FOUND.into_response()
}

// ── Admin: content sync ───────────────────────────────────────────────────────

pub async fn create_post(State(state): State<AppState>, Json(body): Json<NewPost>) -> Response {
    if body.post_type.trim().is_empty() || body.slug.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "post_type and slug are required"})),
        )
            .into_response();
    }

    match state.store.insert_post(body) {
        Ok(post) => {
            info!(id = post.id, post_type = %post.post_type, slug = %post.slug, "audit: post.create");
            (StatusCode::CREATED, Json(json!({"id": post.id}))).into_response()
        }
        Err(e) => internal_error(e.into()),
    }
}

pub async fn delete_post(State(state): State<AppState>, Path(id): Path<u64>) -> Response {
    match state.store.delete_post(id) {
        Ok(true) => {
            state.permalinks.remove(id);
            info!(id, "audit: post.delete");
            Json(json!({"deleted": true})).into_response()
        }
        Ok(false) => (StatusCode::NOT_FOUND, Json(json!({"error": "not found"}))).into_response(),
        Err(e) => internal_error(e.into()),
    }
}

// ── Admin: rendering filters ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct BylineQuery {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub author_link: String,
}

pub async fn post_byline(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Query(q): Query<BylineQuery>,
) -> Response {
    let post = match state.store.get_post(id) {
        Ok(Some(p)) => p,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, Json(json!({"error": "not found"}))).into_response()
        }
        Err(e) => return internal_error(e.into()),
    };
    match state.rewriter() {
        Ok(rw) => Json(rw.byline(&post, q.author, q.author_link)).into_response(),
        Err(e) => internal_error(e.into()),
    }
}

// ── Admin: dashboard ──────────────────────────────────────────────────────────

pub async fn dashboard(State(state): State<AppState>) -> Response {
    match state.settings.dashboard_url() {
        Ok(url) => Json(json!({"url": url.to_string()})).into_response(),
        Err(e) => internal_error(e.into()),
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn internal_error(e: PrxError) -> Response {
    tracing::error!(error = %e, "internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "internal server error"})),
    )
        .into_response()
}
