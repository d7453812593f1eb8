//! `list`: sync one kind into a local cache and print it.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use towersync_core::{ConnectionConfig, SharedInformerFactory};

use crate::cli::{GlobalOpts, ListArgs};
use crate::error::CliError;
use crate::output::Printer;

use super::util;

pub async fn handle(
    config: &ConnectionConfig,
    args: ListArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let client = util::connect(config).await?;
    let factory = SharedInformerFactory::from_config(Arc::clone(&client), config);
    let stop = CancellationToken::new();

    let informer = factory.informer_for(args.kind);
    factory.start(&stop);

    let synced = util::wait_for_sync(&factory, &stop, Duration::from_secs(args.sync_timeout)).await;
    let snapshot = informer.store().list();
    factory.shutdown(&stop).await;
    synced?;

    tracing::debug!(kind = %args.kind, count = snapshot.len(), "listing cached objects");
    util::print_objects(&mut Printer::stdout(global), args.kind, &snapshot)?;
    Ok(())
}
