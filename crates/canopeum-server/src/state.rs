use std::sync::Arc;

use canopeum::{Geocoder, WeatherProvider};
use canopeum_config::{Config, ConfigError};
use canopeum_db::Database;

use crate::auth::Tokens;
use crate::media::MediaStore;

/// Shared by every handler. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub tokens: Arc<Tokens>,
    pub geocoder: Arc<dyn Geocoder>,
    pub weather: Arc<dyn WeatherProvider>,
    pub media: MediaStore,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Database,
        geocoder: Arc<dyn Geocoder>,
        weather: Arc<dyn WeatherProvider>,
    ) -> Result<Self, ConfigError> {
        let auth = &config.auth;
        let tokens = Tokens::new(
            auth.jwt_secret()?,
            auth.access_ttl_minutes(),
            auth.refresh_ttl_days(),
        );
        let media = MediaStore::new(config.server.media_root(), config.server.public_url());
        Ok(AppState {
            db,
            config: Arc::new(config),
            tokens: Arc::new(tokens),
            geocoder,
            weather,
            media,
        })
    }

    /// Absolute URL of an API path, for pagination links.
    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}{}",
            self.config.server.public_url().trim_end_matches('/'),
            path
        )
    }
}
