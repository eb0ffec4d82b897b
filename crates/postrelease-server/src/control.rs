//! Provider control calls: parsing and the dispatch table.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use url::form_urlencoded;

use crate::activation::parse_enable_flag;
use crate::error::{PrxError, PrxResult};
use crate::feed;
use crate::settings::{ARTICLE_POST_TYPE, DB_VERSION, PLUGIN_VERSION};
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GenerateKey,
    Enable,
    GetStatus,
    GetCheck,
    GetPosts,
    Unknown,
}

impl Operation {
    /// Case-insensitive. `prx_generate_key` is the name deployed providers send.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "generate_key" | "prx_generate_key" => Operation::GenerateKey,
            "enable" => Operation::Enable,
            "status" => Operation::GetStatus,
            "check" => Operation::GetCheck,
            "getposts" => Operation::GetPosts,
            _ => Operation::Unknown,
        }
    }

    /// The operations that must pass the security gate.
    pub fn gated(self) -> Option<GatedOp> {
        match self {
            Operation::Enable => Some(GatedOp::Enable),
            Operation::GetStatus => Some(GatedOp::GetStatus),
            Operation::GetCheck => Some(GatedOp::GetCheck),
            Operation::GetPosts => Some(GatedOp::GetPosts),
            Operation::GenerateKey | Operation::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatedOp {
    Enable,
    GetStatus,
    GetCheck,
    GetPosts,
}

/// Leading integer of `raw` after optional whitespace and sign, so `50abc`
/// reads as 50. `None` when no digit leads.
fn leading_int(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    rest[..digits].parse::<i64>().ok().map(|n| sign * n)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRequest {
    pub operation: Operation,
    pub callback_name: Option<String>,
    pub caller_key: Option<String>,
    pub enable_flag: Option<String>,
    pub post_limit: Option<i64>,
}

impl ControlRequest {
    /// `None` when the query carries no `prx` parameter at all.
    pub fn from_query(raw_query: &str) -> Option<Self> {
        let mut operation = None;
        let mut req = ControlRequest {
            operation: Operation::Unknown,
            callback_name: None,
            caller_key: None,
            enable_flag: None,
            post_limit: None,
        };
        for (key, value) in form_urlencoded::parse(raw_query.as_bytes()) {
            match key.as_ref() {
                "prx" => operation = Some(Operation::parse(&value)),
                "callback" => req.callback_name = Some(value.into_owned()),
                "id" => req.caller_key = Some(value.trim().to_owned()),
                "status" => req.enable_flag = Some(value.into_owned()),
                "num" => req.post_limit = leading_int(&value),
                _ => {}
            }
        }
        req.operation = operation?;
        Some(req)
    }
}

/// What a handled control call writes back.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlReply {
    /// Request ends with an empty body (denied).
    Silent,
    /// Plain-text body, used for `FAIL: ...`.
    Text(String),
    Json(Value),
    Xml(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusReply {
    pub publication_title: String,
    pub enabled: u8,
    pub platform_version: String,
    pub plugin_version: String,
}

#[derive(Debug, Serialize)]
pub struct CheckReply {
    pub plugin_activated: u8,
    pub site_url: String,
    pub plugin_version: String,
    pub postrelease_server: String,
    pub javascript_url: String,
    pub db_version: u32,
    pub runtime_version: String,
    pub host_version: String,
    pub blog_title: String,
    pub template_post_id: i64,
    pub prx_dev: bool,
}

/// Run one control call. `Ok(None)` means the operation is not ours and the
/// request continues down the normal pipeline.
pub async fn dispatch(state: &AppState, req: &ControlRequest, caller_ip: &str) -> PrxResult<Option<ControlReply>> {
    if req.operation == Operation::GenerateKey {
        return Ok(Some(generate_key(state, caller_ip).await?));
    }
    let Some(op) = req.operation.gated() else {
        return Ok(None);
    };

    let decision = state.gate().authorize(req.caller_key.as_deref(), caller_ip).await?;
    if !decision.authorized {
        return Ok(Some(ControlReply::Silent));
    }
    debug!(operation = ?op, caller_ip, "authorized control call");
    let reply = match op {
        GatedOp::Enable => enable(state, req.enable_flag.as_deref()).await?,
        GatedOp::GetStatus => ControlReply::Json(json!(status(state)?)),
        GatedOp::GetCheck => ControlReply::Json(json!(check(state)?)),
        GatedOp::GetPosts => get_posts(state, req.post_limit)?,
    };
    Ok(Some(reply))
}

async fn generate_key(state: &AppState, caller_ip: &str) -> PrxResult<ControlReply> {
    let secrets = state.secrets();
    match secrets.generate(state.authenticator.authenticate(caller_ip)).await {
        Ok(key) => Ok(ControlReply::Json(json!({ "Key": key }))),
        Err(PrxError::AlreadyExists) => Ok(ControlReply::Text("FAIL: key already exists".into())),
        Err(PrxError::AuthDenied) => Ok(ControlReply::Text("FAIL: IP authentication error".into())),
        Err(e) => Err(e),
    }
}

async fn enable(state: &AppState, raw_flag: Option<&str>) -> PrxResult<ControlReply> {
    let flag = match parse_enable_flag(raw_flag) {
        Ok(f) => f,
        Err(PrxError::InvalidInput(reason)) => {
            info!(%reason, "audit: plugin.enable.rejected");
            return Ok(ControlReply::Json(json!({ "result": 0 })));
        }
        Err(e) => return Err(e),
    };
    state.activation().set(flag).await?;
    Ok(ControlReply::Json(json!({ "result": 1 })))
}

fn status(state: &AppState) -> PrxResult<StatusReply> {
    let cfg = state.store.load_configuration()?;
    Ok(StatusReply {
        publication_title: state.settings.publication_title(),
        enabled: u8::from(cfg.activated),
        platform_version: state.settings.host_version.clone(),
        plugin_version: PLUGIN_VERSION.into(),
    })
}

fn check(state: &AppState) -> PrxResult<CheckReply> {
    let cfg = state.store.load_configuration()?;
    let settings = &state.settings;
    Ok(CheckReply {
        plugin_activated: u8::from(cfg.activated),
        site_url: settings.site_url.to_string(),
        plugin_version: PLUGIN_VERSION.into(),
        postrelease_server: settings.provider_url.to_string(),
        javascript_url: settings.js_url.clone(),
        db_version: DB_VERSION,
        runtime_version: format!("rust {}", env!("CARGO_PKG_RUST_VERSION")),
        host_version: settings.host_version.clone(),
        blog_title: settings.publication_title(),
        template_post_id: cfg.template_resource_id.map(|id| id as i64).unwrap_or(-1),
        prx_dev: settings.dev_mode,
    })
}

fn get_posts(state: &AppState, requested: Option<i64>) -> PrxResult<ControlReply> {
    let limit = feed::clamp_limit(requested);
    let posts = state.store.recent_published(ARTICLE_POST_TYPE, limit)?;
    info!(limit, count = posts.len(), "audit: feed.getposts");
    Ok(ControlReply::Xml(feed::render(&state.settings, &posts)))
}
