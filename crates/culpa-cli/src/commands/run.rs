use std::path::Path;
use std::sync::Arc;

use culpa_core::event::TracingEventSink;
use culpa_core::runner::Scanner;
use culpa_validator::ValidatorClient;

use super::Context;

pub async fn execute(ctx: &Context, config_path: &Path, dry_run: bool) -> anyhow::Result<()> {
    let (config, secrets) = ctx.load(config_path)?;

    tracing::info!(
        database = %config.db_server.identity(),
        entries = config.collections.len(),
        dry_run,
        "Loaded configuration"
    );

    let source = culpa_mongo::connect(&config.db_server, &secrets).await?;
    let sink = ValidatorClient::new(&config.dataculpa_controller, secrets.controller_secret.clone())?;

    let mut scanner = Scanner::new(Arc::new(source), Arc::new(sink)).dry_run(dry_run);
    scanner.add_event_sink(Arc::new(TracingEventSink));

    let report = scanner.run(&config).await?;
    println!("{report}");

    if !report.is_success() {
        let failed: Vec<&str> = report.failures().map(|o| o.collection.as_str()).collect();
        anyhow::bail!("{} collection(s) failed: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}
