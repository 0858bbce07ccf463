#[path = "ocr-node/cli.rs"]
mod cli;
#[path = "ocr-node/setup.rs"]
mod setup;

use crate::cli::Cli;
use log::{info, warn};
use ocr_core::application::{CompositeObserver, ProtocolObserver};
use ocr_core::foundation::OcrError;
use ocr_core::infrastructure::config::to_toml;
use ocr_service::service::devnet::{Devnet, DevnetOptions};
use ocr_service::service::metrics::Metrics;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const REPORT_WAIT_PER_ROUND: Duration = Duration::from_secs(20);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse_args();
    args.apply_to_env();
    let settings = setup::load_node_config(Some(args.config_path().as_path()))?;
    if args.dump_config {
        println!("{}", to_toml(&settings)?);
        return Ok(());
    }
    setup::init_logging(settings.logging.log_dir.as_deref(), &args.log_level)?;
    info!("ocr-node starting log_level={} oracles={} threshold={}", args.log_level, args.oracles, args.threshold);

    let metrics = Arc::new(Metrics::new()?);
    let mut composite = CompositeObserver::new();
    composite.add_observer(metrics.clone());
    let observer: Arc<dyn ProtocolObserver> = Arc::new(composite);
    let options = DevnetOptions {
        oracles: args.oracles,
        threshold: args.threshold,
        seed: args.seed,
        data_dir: args.data_dir.is_some().then(|| PathBuf::from(&settings.node.data_dir)),
        ..DevnetOptions::default()
    };
    let devnet = Devnet::build(&options, &settings, observer)?;
    devnet.start()?;
    let reporter = setup::spawn_status_reporter(metrics.clone());

    let outcome = match args.rounds {
        Some(rounds) => {
            let timeout = REPORT_WAIT_PER_ROUND.saturating_mul(u32::try_from(rounds).unwrap_or(u32::MAX));
            devnet.wait_for_reports(rounds, timeout).await.map(|accepted| {
                for entry in &accepted {
                    info!("report accepted key={} median={} signers={} block={}", entry.report.key, entry.report.median, entry.signers.len(), entry.block);
                }
            })
        }
        None => {
            info!("running until ctrl-c");
            tokio::signal::ctrl_c().await.map_err(|err| OcrError::Message(err.to_string()))
        }
    };
    if let Err(err) = &outcome {
        warn!("devnet run ended with error: {}", err);
    }

    reporter.abort();
    devnet.shutdown().await?;
    println!("{}", metrics.encode()?);
    outcome?;
    Ok(())
}
