use clap::Parser;
use cm_spins::{CancellationState, ChartmetricClient, RateLimitEvent, RunConfig};

mod commands;

use commands::{execute_command, Commands, RunContext};

/// Chartmetric SiriusXM spin collector
#[derive(Parser)]
#[command(
    name = "cm-spins",
    about = "Collect and reconcile SiriusXM spin counts from Chartmetric",
    long_about = None
)]
struct Cli {
    /// Log progress at info level (RUST_LOG overrides)
    #[arg(long, global = true)]
    verbose: bool,

    /// Print results as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let args = Cli::parse();

    let default_filter = if args.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = match RunConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            eprintln!();
            eprintln!("Set CM_REFRESH_TOKEN (and optionally ARTIST_ID, SINCE, UNTIL, CONCURRENCY)");
            eprintln!("in the environment or in a .env file.");
            std::process::exit(1);
        }
    };

    log::info!(
        "Artist {} from {} to {} (concurrency {})",
        config.artist_id,
        config.since,
        config.until,
        config.concurrency
    );

    let http_client = http_client::native::NativeClient::new();
    let client =
        match ChartmetricClient::login(Box::new(http_client), config.client_config(), &config.credential)
            .await
        {
            Ok(client) => client,
            Err(e) => {
                eprintln!("❌ {e}");
                std::process::exit(1);
            }
        };

    let mut events = client.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                RateLimitEvent::Detected { path, retry_after_ms, .. } => {
                    log::warn!("Rate limited on {path}, server asked for {retry_after_ms}ms");
                }
                RateLimitEvent::RetryStarting {
                    operation,
                    delay_ms,
                    attempt,
                    max_attempts,
                    ..
                } => {
                    log::info!("Retrying {operation} in {delay_ms}ms ({attempt}/{max_attempts})");
                }
            }
        }
    });

    let cancel = CancellationState::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, finishing with the records collected so far (Ctrl-C again to quit)...");
            on_interrupt.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted twice, exiting");
            std::process::exit(130);
        }
    });

    let context = RunContext {
        client,
        config,
        cancel,
        json: args.json,
    };

    if let Err(e) = execute_command(args.command, &context).await {
        eprintln!("❌ Command failed: {e}");
        std::process::exit(1);
    }

    Ok(())
}
