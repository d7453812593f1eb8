//! Shared helpers for command handlers.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use tabled::Tabled;
use tokio_util::sync::CancellationToken;
use towersync_api::TowerClient;
use towersync_core::{
    ConnectionConfig, CoreError, Label, Object, ObjectKind, SharedInformerFactory, Vm,
    require_synced,
};

use crate::error::CliError;
use crate::output::Printer;

/// Build a client from `config` and log in.
pub async fn connect(config: &ConnectionConfig) -> Result<Arc<TowerClient>, CliError> {
    let client = config.connect().await?;
    tracing::debug!(username = %client.username(), "authenticated");
    Ok(Arc::new(client))
}

/// Wait for every registered informer to sync, giving up after `timeout`.
///
/// The timer raises `stop`, which also shuts the informers down.
pub async fn wait_for_sync(
    factory: &SharedInformerFactory<TowerClient>,
    stop: &CancellationToken,
    timeout: Duration,
) -> Result<(), CliError> {
    let timer = {
        let stop = stop.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(timeout) => stop.cancel(),
                () = stop.cancelled() => {}
            }
        })
    };
    let results = factory.wait_for_cache_sync(stop).await;
    timer.abort();

    require_synced(&results).map_err(|err| match err {
        CoreError::SyncTimeout { kinds } => sync_failure(factory, &kinds, timeout),
        other => other.into(),
    })
}

/// Report the first reflector error if there is one, otherwise a timeout.
fn sync_failure(
    factory: &SharedInformerFactory<TowerClient>,
    kinds: &[ObjectKind],
    timeout: Duration,
) -> CliError {
    if let Some(err) = kinds
        .iter()
        .find_map(|&kind| factory.informer_for(kind).status().last_error)
    {
        return err.into();
    }
    CliError::SyncTimeout {
        kinds: kinds
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", "),
        seconds: timeout.as_secs(),
    }
}

// ── Object rows ─────────────────────────────────────────────────────

#[derive(Tabled)]
struct VmRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "vCPU")]
    vcpu: String,
    #[tabled(rename = "Memory")]
    memory: String,
    #[tabled(rename = "Cluster")]
    cluster: String,
}

impl From<&Vm> for VmRow {
    fn from(vm: &Vm) -> Self {
        Self {
            id: vm.id.clone(),
            name: vm.name.clone(),
            status: vm.status.clone().unwrap_or_default(),
            vcpu: vm.vcpu.map(|c| c.to_string()).unwrap_or_default(),
            memory: vm.memory.map(format_bytes).unwrap_or_default(),
            cluster: vm.cluster.as_ref().map(|c| c.id.clone()).unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct LabelRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "VMs")]
    vms: usize,
}

impl From<&Label> for LabelRow {
    fn from(label: &Label) -> Self {
        Self {
            id: label.id.clone(),
            key: label.key.clone(),
            value: label.value.clone().unwrap_or_default(),
            vms: label.vms.len(),
        }
    }
}

/// Print cached objects of one kind.
pub fn print_objects<W: Write>(
    printer: &mut Printer<W>,
    kind: ObjectKind,
    objects: &[Arc<Object>],
) -> io::Result<()> {
    match kind {
        ObjectKind::Vm => {
            let vms: Vec<&Vm> = objects.iter().filter_map(|o| o.as_vm()).collect();
            printer.listing(&vms, |vm| VmRow::from(*vm), |vm| vm.id.as_str())
        }
        ObjectKind::Label => {
            let labels: Vec<&Label> = objects.iter().filter_map(|o| o.as_label()).collect();
            printer.listing(&labels, |label| LabelRow::from(*label), |label| label.id.as_str())
        }
    }
}

#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn format_bytes(bytes: u64) -> String {
    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;
    let b = bytes as f64;
    if b >= GIB {
        format!("{:.1} GiB", b / GIB)
    } else {
        format!("{:.0} MiB", b / MIB)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;
    use serde_json::json;

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(8 * 1024 * 1024 * 1024), "8.0 GiB");
        assert_eq!(format_bytes(512 * 1024 * 1024), "512 MiB");
    }

    #[test]
    fn objects_render_as_plain_keys() {
        let objects = vec![
            Arc::new(Object::decode(ObjectKind::Vm, json!({ "id": "vm-1", "name": "a" })).unwrap()),
            Arc::new(Object::decode(ObjectKind::Vm, json!({ "id": "vm-2", "name": "b" })).unwrap()),
        ];
        let mut printer = Printer::new(Vec::new(), OutputFormat::Plain, false, false);
        print_objects(&mut printer, ObjectKind::Vm, &objects).unwrap();
        assert_eq!(printer.into_inner(), b"vm-1\nvm-2\n");
    }
}
