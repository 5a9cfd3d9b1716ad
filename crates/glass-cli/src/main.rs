//! Glass secret store binary
//!
//! Without a subcommand the process runs the HTTP server from environment
//! configuration. `rewrap-kek` runs the operator batch that re-wraps
//! stored data keys under a new KEK.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use glass_crypto::{Envelope, Keyring};
use glass_server::ServerConfig;
use glass_store::{migrate, open, rewrap_kek, RewrapOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "glass")]
#[command(version, about = "Glass secret store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-wrap stored data keys from one KEK to another
    RewrapKek(RewrapKekArgs),
}

#[derive(Args)]
struct RewrapKekArgs {
    /// Path to the sqlite database file
    #[arg(long = "db", env = "SQLITE_PATH", default_value = "./data/glass.db")]
    db: String,

    /// Directory containing KEK files (mounted secret)
    #[arg(long = "kek-dir", env = "KEK_DIR")]
    kek_dir: PathBuf,

    /// Source KEK id (current kek_id on DB rows)
    #[arg(long)]
    from: String,

    /// Target KEK id
    #[arg(long, env = "ACTIVE_KEK_ID", default_value = "default")]
    to: String,

    /// Rows per transaction
    #[arg(long, default_value_t = 500)]
    batch: i64,

    /// Only report how many rows would change
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Some(Commands::RewrapKek(args)) => run_rewrap_kek(args).await,
        None => {
            let config = ServerConfig::from_env().context("loading configuration")?;
            glass_server::serve(config).await?;
            Ok(())
        }
    }
}

async fn run_rewrap_kek(args: RewrapKekArgs) -> anyhow::Result<()> {
    if args.from == args.to {
        bail!("--from and --to are equal ({:?})", args.from);
    }

    let keyring = Keyring::load(&args.kek_dir, &args.to).context("loading keyring")?;
    let envelope = Envelope::new(Arc::new(keyring));

    let pool = open(&args.db).await.context("opening database")?;
    // Ensure the schema carries the envelope columns
    migrate(&pool).await.context("migrating database")?;

    let report = rewrap_kek(
        &pool,
        &envelope,
        RewrapOptions {
            from_kek_id: args.from.clone(),
            to_kek_id: args.to.clone(),
            batch_size: args.batch,
            dry_run: args.dry_run,
        },
    )
    .await?;

    if args.dry_run {
        println!(
            "dry-run: would rewrap {} rows from kek_id={:?} to kek_id={:?}",
            report.matched, args.from, args.to
        );
    } else {
        println!(
            "rewrap complete: matched={} updated={} from={:?} to={:?}",
            report.matched, report.updated, args.from, args.to
        );
    }

    Ok(())
}
