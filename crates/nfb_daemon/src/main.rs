mod config;
mod session;

use clap::{Arg, Command};
use nfb_engine::TickEvent;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nfb_daemon=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("NFB engine daemon starting...");

    let matches = Command::new("nfb_daemon")
        .about("Real-time neurofeedback experiment engine")
        .arg(
            Arg::new("settings")
                .long("settings")
                .default_value("settings.yaml")
                .help("Path to the session settings YAML file"),
        )
        .arg(
            Arg::new("record-to")
                .long("record-to")
                .help("Directory to record the session's grouped persistence store into"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_parser(clap::value_parser!(u64))
                .help("Seed for the session's shared RNG (reproducible block randomization)"),
        )
        .get_matches();

    let settings_path: &String = matches.get_one("settings").expect("has default_value");
    let record_to: Option<&String> = matches.get_one("record-to");
    let seed: Option<u64> = matches.get_one::<u64>("seed").copied();

    let settings = config::load_settings(settings_path)?;
    tracing::info!(
        channels = settings.channels.len(),
        signals = settings.signals.len(),
        protocols = settings.protocols.len(),
        "loaded session settings"
    );

    let session_dir = record_to.map(|base| {
        let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
        format!("{base}/{}_{timestamp}", settings.experiment_name)
    });

    let mut engine = session::build_engine(&settings, session_dir.as_deref(), seed)?;

    let period = std::time::Duration::from_secs_f64(1.0 / settings.acquisition.sample_rate);
    let mut interval = tokio::time::interval(period);

    tracing::info!("NFB engine is running. Press Ctrl+C to exit.");
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match engine.tick() {
                    Ok(TickEvent::SequenceComplete) => {
                        tracing::info!("protocol sequence complete, shutting down");
                        break;
                    }
                    Ok(TickEvent::BlockEnded { finished_index }) => {
                        tracing::info!(finished_index, next = engine.current_block_index(), "block transition");
                    }
                    Ok(TickEvent::NoData | TickEvent::BlockContinuing) => {}
                    Err(err) if err.is_fatal() => {
                        tracing::error!(
                            block = engine.current_block_index(),
                            error = %err,
                            "fatal tick error, shutting down"
                        );
                        return Err(Box::new(err));
                    }
                    Err(err) => {
                        tracing::warn!(
                            block = engine.current_block_index(),
                            error = %err,
                            "tick failed, skipping"
                        );
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }

    tracing::info!("NFB engine daemon stopped gracefully.");
    Ok(())
}
