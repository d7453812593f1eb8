//! `watch`: sync kinds and stream their deltas until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use towersync_api::TowerClient;
use towersync_core::{
    ConnectionConfig, CoreError, Delta, ObjectKind, Phase, Reflector, SharedInformerFactory,
};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output::Printer;

use super::util;

const EVENT_QUEUE_SIZE: usize = 256;

/// What a forwarding task reports back to the printer.
enum WatchEvent {
    Delta(ObjectKind, Delta),
    Failed(CoreError),
}

pub async fn handle(
    mut config: ConnectionConfig,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Some(secs) = args.resync {
        config.default_resync = Duration::from_secs(secs);
        config.custom_resync.clear();
    }

    let client = util::connect(&config).await?;
    let factory = SharedInformerFactory::from_config(Arc::clone(&client), &config);
    let stop = CancellationToken::new();

    // Subscribing before start also relays the initial list as `added`.
    let (tx, mut rx) = mpsc::channel(EVENT_QUEUE_SIZE);
    let relay = |tx: &mpsc::Sender<WatchEvent>| {
        for &kind in &args.kinds {
            let informer = factory.informer_for(kind);
            tokio::spawn(forward(informer, tx.clone(), stop.clone()));
        }
    };
    if args.initial {
        relay(&tx);
    } else {
        for &kind in &args.kinds {
            factory.informer_for(kind);
        }
    }

    factory.start(&stop);
    if let Err(e) = util::wait_for_sync(&factory, &stop, Duration::from_secs(args.sync_timeout)).await {
        factory.shutdown(&stop).await;
        return Err(e);
    }
    if !args.initial {
        relay(&tx);
    }
    drop(tx);

    if !global.quiet {
        let kinds: Vec<String> = args.kinds.iter().map(ToString::to_string).collect();
        eprintln!("Watching {} (Ctrl-C to stop)", kinds.join(", "));
    }
    let mut printer = Printer::stdout(global);

    let result = loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => break Ok(()),
            event = rx.recv() => match event {
                Some(WatchEvent::Delta(kind, delta)) => {
                    if let Err(e) = printer.delta(chrono::Local::now(), kind, &delta) {
                        break Err(e.into());
                    }
                }
                Some(WatchEvent::Failed(err)) => break Err(err.into()),
                None => break Ok(()),
            },
        }
    };

    factory.shutdown(&stop).await;
    result
}

/// Relay one informer's deltas (and a failure, if any) to the printer.
async fn forward(
    informer: Arc<Reflector<TowerClient>>,
    tx: mpsc::Sender<WatchEvent>,
    stop: CancellationToken,
) {
    let kind = informer.kind();
    let mut deltas = informer.subscribe();
    let mut status = informer.watch_status();

    // The informer may already have failed before we subscribed.
    let mut failed = status.borrow_and_update().phase == Phase::Failed;

    while !failed {
        tokio::select! {
            biased;
            () = stop.cancelled() => return,
            delta = deltas.recv() => match delta {
                Ok(delta) => {
                    if tx.send(WatchEvent::Delta(kind, delta)).await.is_err() {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(%kind, skipped, "watch output fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            },
            changed = status.changed() => {
                if changed.is_err() {
                    return;
                }
                failed = status.borrow_and_update().phase == Phase::Failed;
            }
        }
    }

    let err = informer
        .status()
        .last_error
        .unwrap_or_else(|| CoreError::Internal(format!("{kind} informer failed")));
    let _ = tx.send(WatchEvent::Failed(err)).await;
}
