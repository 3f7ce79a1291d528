use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "mongo-dataculpa",
    about = "MongoDB connector for Data Culpa: samples collections and feeds them to watchpoints",
    version
)]
struct Cli {
    #[command(flatten)]
    action: commands::Action,

    /// Database to list when generating a config fragment with --add
    #[arg(long, requires = "add")]
    database: Option<String>,

    /// Env file holding DC_CONTROLLER_SECRET and DB_PASSWORD
    #[arg(short = 'e', long = "env-file", env = "MONGO_DATACULPA_ENV_FILE")]
    env_file: Option<PathBuf>,

    /// With --run: sample collections but do not send anything
    #[arg(long, requires = "run")]
    dry_run: bool,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Same as -v
    #[arg(long)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let verbose = if cli.debug { cli.verbose.max(1) } else { cli.verbose };
    init_logging(verbose, cli.json_logs);

    let ctx = commands::Context {
        env_file: cli.env_file.as_deref().map(commands::expand_path),
    };

    match cli.action.into_command(cli.database)? {
        commands::Command::Init(path) => commands::init::execute(&path),
        commands::Command::Discover(path) => commands::discover::execute(&ctx, &path).await,
        commands::Command::Add { config, database } => {
            commands::add::execute(&ctx, &config, &database).await
        }
        commands::Command::Test(path) => commands::check::execute(&ctx, &path).await,
        commands::Command::Run(path) => commands::run::execute(&ctx, &path, cli.dry_run).await,
    }
}
