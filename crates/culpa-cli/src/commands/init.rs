use std::path::Path;

use culpa_core::config::write_example;

pub fn execute(path: &Path) -> anyhow::Result<()> {
    write_example(path)?;
    tracing::info!(path = %path.display(), "Wrote example config");

    println!("Wrote example config to {}", path.display());
    println!("Next steps:");
    println!("  1. Edit db_server and dataculpa_controller for your environment.");
    println!("  2. Put DC_CONTROLLER_SECRET and DB_PASSWORD in an env file (pass it with -e).");
    println!("  3. Run --discover or --add to list collections, then --test.");
    Ok(())
}
