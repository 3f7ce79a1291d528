use std::path::Path;

use culpa_core::collection::{collections_fragment, new_entries};
use culpa_core::source::CollectionSource;

use super::Context;

pub async fn execute(ctx: &Context, config_path: &Path, database: &str) -> anyhow::Result<()> {
    let (config, secrets) = ctx.load(config_path)?;
    let source = culpa_mongo::connect(&config.db_server, &secrets)
        .await?
        .with_database(database);

    let infos = source.list_collections().await?;

    // Entries already in this file only matter when listing its own database.
    let configured: &[_] = if database == config.db_server.dbname {
        config.collections.as_slice()
    } else {
        &[]
    };
    let entries = new_entries(&config.db_server.identity_for(database), &infos, configured);
    tracing::info!(
        %database,
        found = infos.len(),
        new = entries.len(),
        "Generated collection entries"
    );

    print!("{}", collections_fragment(&entries)?);
    Ok(())
}
