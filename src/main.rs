//! Redis Export
//!
//! Dumps every key of a Redis database (type, value and TTL) into a single
//! JSON array file.
//!
//! # Usage
//!
//! ```bash
//! redis-export -a localhost:6379 -o dump.json -w 16
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use redis_export::cli::CliInterface;
use redis_export::error::Result;
use redis_export::{ExportCoordinator, ExportSummary, FileSink, RedisSource};

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Handle subcommands, or print help when nothing was asked for
/// 4. Run the export
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    if cli.handle_subcommand()? {
        return Ok(());
    }

    if cli.should_show_help() {
        cli.print_help()?;
        return Ok(());
    }

    run_export(&cli).await
}

/// Connect, open the output file and drive one export run
async fn run_export(cli: &CliInterface) -> Result<()> {
    let config = cli.config();
    cli.print_banner();

    info!(target_addr = %cli.sanitized_target(), "Connecting to Redis");
    let source = RedisSource::connect(&config.source, config.pool_size()).await?;
    let reply = source.ping().await?;
    info!(reply = %reply, address = %source.address(), "Connected to Redis");

    let sink = FileSink::create(&config.export.output).await?;

    let cancel_token = CancellationToken::new();
    let ctrl_c_handle = spawn_interrupt_handler(cancel_token.clone());

    let mut coordinator =
        ExportCoordinator::new(Arc::new(source), Box::new(sink), config.export_options())
            .with_cancellation(cancel_token);
    let result = coordinator.execute().await;

    ctrl_c_handle.abort();

    let summary = result?;
    print_summary(&summary, cli);
    Ok(())
}

/// Cancel the run on Ctrl+C
fn spawn_interrupt_handler(cancel_token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                eprintln!("Interrupted, finishing output...");
                cancel_token.cancel();
            }
            Err(err) => {
                eprintln!("Failed to listen for Ctrl+C: {}", err);
            }
        }
    })
}

/// Print the final summary on stdout
fn print_summary(summary: &ExportSummary, cli: &CliInterface) {
    println!(
        "Exported {} keys to {} ({} bytes)",
        summary.keys_exported,
        cli.config().export.output.display(),
        summary.bytes_written
    );
    if summary.keys_failed > 0 {
        println!("Skipped {} keys (see log for details)", summary.keys_failed);
    }
    println!(
        "Started {}, took {:.1}s ({:.0} keys/sec)",
        summary.started_at.format("%Y-%m-%d %H:%M:%S"),
        summary.elapsed.as_secs_f64(),
        summary.keys_per_sec()
    );
}

/// Initialize logging system based on configured level
///
/// `RUST_LOG` takes precedence when set. Logs go to stderr so they never mix
/// with anything printed on stdout.
fn initialize_logging(cli: &CliInterface) {
    let logging = &cli.config().logging;
    let level = LevelFilter::from_level(logging.level.to_tracing_level());

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
