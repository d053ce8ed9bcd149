//! Wires the source, the store and the orchestrator together.

use chunklift_blob::AzureBlockBlob;
use chunklift_pipeline::{HttpSource, TransferEvent, TransferOrchestrator};

use crate::config::Config;

/// Runs one transfer. Ctrl-C cancels it.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let store = AzureBlockBlob::new(
        &config.account_url,
        &config.container,
        &config.blob_name,
        &config.sas_token,
    )?;
    let source = HttpSource::new(&config.download_url)?;

    let mut orchestrator = TransferOrchestrator::new(config.transfer_config());
    let cancel = orchestrator.cancel_token();
    let progress = orchestrator.take_events().map(|mut events| {
        tokio::spawn(async move {
            let mut done: u64 = 0;
            while let Some(event) = events.recv().await {
                log_event(&event, &mut done);
            }
        })
    });

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("SIGINT received, cancelling transfer");
            cancel.cancel();
        }
    });

    let result = orchestrator.run(&source, &store).await;
    interrupt.abort();

    // Closes the event channel so the progress task drains and exits.
    drop(orchestrator);
    if let Some(progress) = progress {
        let _ = progress.await;
    }

    let report = result?;
    println!("{}", report.digest);
    tracing::info!(
        blocks = report.block_count(),
        bytes = report.bytes,
        elapsed_minutes = report.elapsed_minutes(),
        "transfer complete"
    );
    Ok(())
}

fn log_event(event: &TransferEvent, done: &mut u64) {
    match event {
        TransferEvent::BlockRead {
            sequence,
            bytes_read,
            bytes_remaining,
        } => {
            *done += *bytes_read as u64;
            let total = *done + bytes_remaining;
            let percent = if total == 0 {
                100.0
            } else {
                *done as f64 * 100.0 / total as f64
            };
            tracing::debug!(sequence, percent = %format!("{percent:.1}"), "progress");
        }
        TransferEvent::ReadRetry {
            attempt,
            max_retries,
            ..
        } if attempt > max_retries => {
            tracing::debug!(attempt, "read retries exhausted");
        }
        TransferEvent::StateChanged(state) => {
            tracing::debug!(?state, "transfer state");
        }
        _ => {}
    }
}
