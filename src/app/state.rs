//! Application state shared across routes

use std::sync::Arc;
use std::time::Instant;

use sqlx::PgPool;

use crate::config::Config;
use crate::geocode::GeocoderClient;
use crate::store::StoreRepository;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store_repo: StoreRepository,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config, pool: PgPool) -> Self {
        let config = Arc::new(config);

        // Initialize geocoder client
        let geocoder = GeocoderClient::new(&config);

        // Initialize repository
        let store_repo = StoreRepository::new(pool, geocoder);

        Self {
            config,
            store_repo,
            started_at: Instant::now(),
        }
    }
}
