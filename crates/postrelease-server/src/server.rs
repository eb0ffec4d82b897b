use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    auth::require_api_key,
    handlers::{create_post, dashboard, delete_post, health, post_byline, site_request},
    settings::SiteSettings,
    store::{crypto, Store},
    AppState,
};

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub api_key: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub site: SiteSettings,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: std::env::var("PRX_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PRX_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            api_key: std::env::var("PRX_API_KEY").ok(),
            data_dir: std::env::var("PRX_DATA_DIR").ok().map(PathBuf::from),
            site: SiteSettings::from_env()?,
        })
    }
}

/// Explicit directory (created if needed) or the platform default.
pub fn resolve_data_dir(explicit: Option<&PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(d) => {
            std::fs::create_dir_all(d).context("create data dir")?;
            Ok(d.clone())
        }
        None => crate::dirs::data_dir(),
    }
}

/// Open `postrelease.db` under `data_dir`, creating the master key on first use.
pub fn open_store(data_dir: &Path) -> Result<Store> {
    let key = load_or_create_key(data_dir)?;
    Store::open(&data_dir.join("postrelease.db"), key).context("open store")
}

/// The full router: health, host-side admin routes, and the site front door
/// as fallback.
pub fn app(state: AppState) -> Router {
    let admin = Router::new()
        .route("/admin/posts", post(create_post))
        .route("/admin/posts/{id}", delete(delete_post))
        .route("/admin/posts/{id}/byline", get(post_byline))
        .route("/admin/dashboard", get(dashboard))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(admin)
        .fallback(site_request)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn run(cfg: ServerConfig) -> Result<()> {
    let data_dir = resolve_data_dir(cfg.data_dir.as_ref())?;
    info!(data_dir = %data_dir.display(), "using data directory");

    let store = open_store(&data_dir)?;
    let state = AppState::new(store, cfg.site, cfg.api_key)?;

    if state.templates().upgrade()? {
        info!("option layout upgraded");
    }
    if state.settings.dev_mode {
        info!("dev mode on: provider calls skip key validation");
    }

    let app = app(state);

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .context("invalid host/port")?;

    info!(%addr, "postrelease endpoint listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind listener")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")
}

fn load_or_create_key(data_dir: &Path) -> Result<crypto::EncryptionKey> {
    let key_path = data_dir.join("postrelease.key");
    if key_path.exists() {
        let bytes = std::fs::read(&key_path).context("read postrelease.key")?;
        crypto::load_key(&bytes).ok_or_else(|| {
            anyhow::anyhow!(
                "postrelease.key is corrupt (expected 32 bytes, got {})",
                bytes.len()
            )
        })
    } else {
        let key = crypto::generate_key();
        std::fs::write(&key_path, key.as_bytes()).context("write postrelease.key")?;
        info!("generated new encryption key");
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_reopens_with_persisted_key() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = open_store(dir.path()).unwrap();
            store.set_shared_secret("persisted-secret").unwrap();
        }
        let store = open_store(dir.path()).unwrap();
        assert_eq!(
            store.load_configuration().unwrap().shared_secret.as_deref(),
            Some("persisted-secret")
        );
    }

    #[test]
    fn corrupt_key_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("postrelease.key"), b"short").unwrap();
        let err = open_store(dir.path()).err().unwrap();
        assert!(err.to_string().contains("corrupt"), "{err}");
    }
}
