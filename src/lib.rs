pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use services::charts::ChartTheme;

/// Shared, read-only state handed to every request.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Config,
    pub theme: ChartTheme,
}

impl AppState {
    pub fn new(config: Config, theme: ChartTheme) -> Self {
        Self { config, theme }
    }
}
