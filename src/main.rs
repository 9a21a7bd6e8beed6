use anyhow::Context;
use signflow::config::PipelineConfig;
use signflow::kernel::governor;
use signflow::kernel::session::Session;
use signflow::services::keypoints::NullExtractor;
use signflow::services::vocabulary::{StaticVocabulary, VocabularyLookup};
use signflow::services::Services;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_LABELS: [&str; 8] = ["HELLO", "THANK_YOU", "YES", "NO", "PLEASE", "SORRY", "HELP", "LOVE"];

/// Local stand-in transport: one session, inbound JSON lines on stdin,
/// outbound JSON lines on stdout.
///
/// Usage: signflow [config.json] [vocabulary.json]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries protocol lines only.
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let mut args = std::env::args().skip(1);
    let config_path = args.next().map(PathBuf::from);
    let vocabulary_path = args.next().map(PathBuf::from);

    let config = PipelineConfig::load(config_path.as_deref()).context("loading configuration")?;
    let vocabulary: Arc<dyn VocabularyLookup> = match vocabulary_path {
        Some(path) => Arc::new(StaticVocabulary::load(&path).context("loading vocabulary")?),
        None => Arc::new(StaticVocabulary::new(DEFAULT_LABELS)),
    };
    tracing::info!(
        "signflow starting ({:?} scorer, {} labels)",
        config.scorer.backend,
        vocabulary.len()
    );

    let services = Services::from_config(&config.scorer, vocabulary, Arc::new(NullExtractor))?;
    let governor = governor::shared(&config.governor);
    let session = Session::new(&config, services, governor)?;

    let (in_tx, in_rx) = mpsc::channel::<String>(32);
    let (out_tx, mut out_rx) = mpsc::channel(32);
    let shutdown = CancellationToken::new();

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            if in_tx.send(line).await.is_err() {
                break;
            }
        }
    });

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(msg) = out_rx.recv().await {
            let line = match serde_json::to_string(&msg) {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("Failed to encode outbound message: {}", e);
                    continue;
                }
            };
            if stdout.write_all(line.as_bytes()).await.is_err()
                || stdout.write_all(b"\n").await.is_err()
                || stdout.flush().await.is_err()
            {
                break;
            }
        }
    });

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let end = session.run(in_rx, out_tx, shutdown).await;
    let _ = writer.await;
    tracing::info!("signflow exiting: {:?}", end);
    Ok(())
}
