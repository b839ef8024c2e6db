//! Routes command implementation.
//!
//! Runs route discovery exactly as the proxy does at the start of every
//! generation and prints what it found.

use crate::cli::RoutesArgs;
use crate::config::{Overrides, RespawnConfig};
use crate::error::{Result, ResultExt};
use crate::logger::Logging;
use crate::ui;
use respawn::proxy::{RouteDocument, RouteTable, discover_routes};
use tokio_util::sync::CancellationToken;

/// Execute the routes command.
pub async fn execute(args: RoutesArgs, logging: Logging) -> Result<()> {
    let config = RespawnConfig::load(&Overrides::from(&args), args.config.as_deref())?;
    logging.init(config.log_level);

    std::fs::metadata(&config.base_dir)
        .with_path(&config.base_dir)
        .with_hint("--base-dir must name an existing directory")?;

    let token = CancellationToken::new();
    let routes = discover_routes(&config.routes_command, &config.base_dir, &token).await?;

    if args.json {
        let document = RouteDocument { paths: routes };
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    let table = RouteTable::new(&routes);
    if table.len() < routes.len() {
        ui::warning(&format!(
            "{} of {} routes are duplicates or invalid and would not be proxied",
            routes.len() - table.len(),
            routes.len()
        ));
    }
    ui::print_route_table(&routes);
    Ok(())
}
