use std::path::Path;

use culpa_core::config::ConnectorConfig;
use culpa_core::sink::WatchpointSink;
use culpa_core::source::CollectionSource;
use culpa_validator::ValidatorClient;

use super::Context;

pub async fn execute(ctx: &Context, config_path: &Path) -> anyhow::Result<()> {
    println!("Testing {}...", config_path.display());

    let (config, secrets) = ctx.load(config_path)?;
    println!(
        "  Config: OK (database '{}' on {}:{}, {} collection entries)",
        config.db_server.dbname,
        config.db_server.host,
        config.db_server.port,
        config.collections.len()
    );

    let mut errors = Vec::new();

    if secrets.controller_secret.is_none() {
        println!("  Controller secret: WARN - DC_CONTROLLER_SECRET is not set");
    }

    match culpa_mongo::connect(&config.db_server, &secrets).await {
        Ok(source) => {
            println!("  Database: OK");
            match source.list_collections().await {
                Ok(infos) => {
                    let live: Vec<String> = infos.into_iter().map(|i| i.name).collect();
                    println!("  Collections found: {}", live.len());
                    report_entries(&config, &live);
                }
                Err(e) => {
                    println!("  Collections: FAILED - {e}");
                    errors.push(format!("listing collections: {e}"));
                }
            }
        }
        Err(e) => {
            println!("  Database: FAILED - {e}");
            errors.push(format!("database: {e}"));
        }
    }

    let controller = ValidatorClient::new(&config.dataculpa_controller, secrets.controller_secret.clone())?;
    match controller.ping().await {
        Ok(status) => println!(
            "  Controller {}: OK{}",
            controller.base_url(),
            status
                .version
                .map(|v| format!(" (version {v})"))
                .unwrap_or_default()
        ),
        Err(e) => {
            println!("  Controller {}: FAILED - {e}", controller.base_url());
            errors.push(format!("controller: {e}"));
        }
    }

    println!();
    if errors.is_empty() {
        println!("Test PASSED");
        Ok(())
    } else {
        println!("Test FAILED with {} error(s):", errors.len());
        for err in &errors {
            println!("  - {err}");
        }
        std::process::exit(1);
    }
}

fn report_entries(config: &ConnectorConfig, live: &[String]) {
    for entry in &config.collections {
        let present = live.contains(&entry.collection);
        println!(
            "    {} -> {} ({}){}",
            entry.collection,
            entry.dataculpa_watchpoint,
            if entry.enabled { "enabled" } else { "disabled" },
            if present { "" } else { " WARN - not found in database" }
        );
    }
    let unconfigured = live.iter().filter(|name| config.entry(name).is_none()).count();
    if unconfigured > 0 {
        println!(
            "    {unconfigured} unconfigured collection(s), new_collections: {:?}",
            config.behavior.new_collections
        );
    }
}
