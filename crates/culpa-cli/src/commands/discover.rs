use std::fmt::Write;
use std::path::Path;

use culpa_core::collection::{collection_status, CollectionStatus};
use culpa_core::config::{default_watchpoint, ConnectorConfig};
use culpa_core::source::{CollectionInfo, CollectionSource};

use super::Context;

pub async fn execute(ctx: &Context, config_path: &Path) -> anyhow::Result<()> {
    let (config, secrets) = ctx.load(config_path)?;
    let source = culpa_mongo::connect(&config.db_server, &secrets).await?;

    let infos = source.list_collections().await?;
    tracing::info!(collections = infos.len(), "MongoDB discovery complete");

    print!("{}", render(&config, &infos));
    Ok(())
}

/// Table of live collections plus configured collections the database lacks.
pub fn render(config: &ConnectorConfig, infos: &[CollectionInfo]) -> String {
    let identity = config.db_server.identity();
    let mut out = String::new();

    let _ = writeln!(out, "Database '{}' ({} collections)\n", config.db_server.dbname, infos.len());
    let _ = writeln!(out, "{:<30} {:<10} {:>12}  {}", "COLLECTION", "STATUS", "DOCUMENTS", "WATCHPOINT");
    let _ = writeln!(out, "{}", "-".repeat(80));

    for info in infos {
        let status = collection_status(config, &info.name);
        let watchpoint = match (status, config.entry(&info.name)) {
            (_, Some(entry)) => entry.dataculpa_watchpoint.clone(),
            (CollectionStatus::New, None) => default_watchpoint(&identity, &info.name),
            _ => "-".to_string(),
        };
        let _ = writeln!(
            out,
            "{:<30} {:<10} {:>12}  {}",
            info.name, status, info.document_count, watchpoint
        );
    }

    let missing: Vec<_> = config
        .collections
        .iter()
        .filter(|e| !infos.iter().any(|i| i.name == e.collection))
        .collect();
    if !missing.is_empty() {
        let _ = writeln!(out, "\nConfigured but not found in the database:");
        for entry in missing {
            let _ = writeln!(out, "  {} -> {}", entry.collection, entry.dataculpa_watchpoint);
        }
    }

    out
}
