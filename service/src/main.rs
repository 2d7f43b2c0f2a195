//! Beverage inventor service.
//!
//! ```bash
//! beverage-inventor --config config/production.yaml
//! ```

use beverage_inventor::config::{self, ServiceConfig};
use beverage_inventor::{app, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let path = config::config_path(std::env::args().skip(1), |key| std::env::var(key).ok());
    let config = ServiceConfig::load(path.as_deref())?;
    telemetry::init(&config.logging)?;

    app::run(config).await
}
