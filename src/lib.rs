pub mod cli;
pub mod core;
pub mod providers;
pub mod server;
pub mod service;
pub mod store;

use crate::cli::compare::SortKey;
use crate::core::clock::{Clock, SystemClock};
use crate::core::config::AppConfig;
use crate::providers::{AlphaVantageProvider, ApiKeyPool};
use crate::server::AppState;
use crate::service::{QueryService, RefreshService};
use crate::store::CacheStore;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub enum AppCommand {
    Setup,
    Serve,
    Summary { ticker: String },
    Compare { sort: Option<SortKey>, ascending: bool },
    Trends { ticker: String },
    Refresh { ticker: String },
    Init,
}

/// The wired-up services for one process.
pub struct App {
    pub config: AppConfig,
    pub keys: Arc<ApiKeyPool>,
    pub store: Arc<CacheStore>,
    pub refresh: Arc<RefreshService>,
    pub query: Arc<QueryService>,
}

impl App {
    pub fn from_config(config: AppConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let alpha_vantage = &config.providers.alpha_vantage;
        if alpha_vantage.api_keys.is_empty() {
            warn!("No Alpha Vantage API keys configured; refreshes will fail");
        }

        let keys = Arc::new(ApiKeyPool::new(alpha_vantage.api_keys.clone()));
        let provider = Arc::new(AlphaVantageProvider::new(alpha_vantage, keys.clone())?);
        let store = Arc::new(CacheStore::open(&config, clock)?);
        let refresh = RefreshService::new(store.clone(), provider, config.vendors.clone());
        let query = Arc::new(QueryService::new(
            store.clone(),
            refresh.clone(),
            config.vendors.clone(),
        ));

        Ok(Self {
            config,
            keys,
            store,
            refresh,
            query,
        })
    }

    pub fn state(&self) -> AppState {
        AppState {
            query: self.query.clone(),
            refresh: self.refresh.clone(),
            keys: self.keys.clone(),
            started_at: chrono::Utc::now(),
        }
    }
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    if let AppCommand::Setup = command {
        return cli::setup::setup(config_path);
    }

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let app = App::from_config(config)?;
    let result = match command {
        AppCommand::Setup => Ok(()),
        AppCommand::Serve => {
            info!(
                "Tracking {} vendors with {} API keys",
                app.config.vendors.len(),
                app.keys.len()
            );
            server::serve(app.state(), &app.config.server).await
        }
        AppCommand::Summary { ticker } => cli::summary::display_summary(&app.query, &ticker).await,
        AppCommand::Compare { sort, ascending } => {
            cli::compare::display_comparison(&app.query, sort, ascending).await
        }
        AppCommand::Trends { ticker } => cli::trends::display_trends(&app.query, &ticker).await,
        AppCommand::Refresh { ticker } => cli::refresh::refresh_vendor(&app.query, &ticker).await,
        AppCommand::Init => cli::refresh::initialize_vendors(&app.refresh).await,
    };

    // Stale reads refresh in the background; the runtime must not drop them
    app.refresh.wait_idle().await;
    result
}
