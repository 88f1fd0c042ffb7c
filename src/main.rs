use std::sync::Arc;

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use tower_http::trace::TraceLayer;

use statly::config::Config;
use statly::services::charts::ChartTheme;
use statly::{logging, routes, AppState};

// Room for multipart boundaries and headers around the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging()?;

    let config = Config::from_env()?;

    let theme = match &config.chart_font {
        Some(path) => ChartTheme::default().with_font(path)?,
        None => {
            tracing::warn!("STATLY_CHART_FONT not set, charts will be drawn without text");
            ChartTheme::default()
        }
    };

    let addr = config.bind_addr;
    let body_limit = config.max_file_size + MULTIPART_OVERHEAD;
    let state = Arc::new(AppState::new(config, theme));

    let app = routes::routes()
        .merge(routes::sheets::routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
