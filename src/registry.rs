//! The set of known devices and fan-out operations over it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::runtime::{self, BoxFuture, Mutex};

/// What the outside world gets to see of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub id: String,
    pub name: String,
    pub connected: bool,
}

/// Maps device ids to device handles of any transport.
///
/// The registry owns every handle it holds; entries only leave through
/// [`Registry::remove_and_disconnect`] or [`Registry::disconnect_all`].
/// The map lock is never held across device I/O, so devices can be added or
/// removed while a fan-out or keep-alive sweep is running.
///
/// # Example
///
/// ```ignore
/// let registry = Registry::new();
/// registry.insert(Arc::new(light)).await;
/// let results = registry
///     .apply_to_all(&["lamp-1", "lamp-2"], |device| device.set_power(true))
///     .await;
/// ```
#[derive(Default)]
pub struct Registry {
    devices: Mutex<HashMap<String, Arc<dyn Device>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device.
    ///
    /// Returns `false` and keeps the existing handle when a device with the
    /// same id is already registered, so rediscovery never drops a live
    /// connection.
    pub async fn insert(&self, device: Arc<dyn Device>) -> bool {
        let mut devices = self.devices.lock().await;
        if devices.contains_key(device.id()) {
            debug!("Device {} is already registered", device.id());
            return false;
        }
        devices.insert(device.id().to_string(), device);
        true
    }

    pub async fn get(&self, id: &str) -> Option<Arc<dyn Device>> {
        self.devices.lock().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.devices.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.devices.lock().await.is_empty()
    }

    /// The handles registered right now.
    pub async fn snapshot(&self) -> Vec<Arc<dyn Device>> {
        self.devices.lock().await.values().cloned().collect()
    }

    /// A summary of every device, sorted by id.
    pub async fn summaries(&self) -> Vec<DeviceSummary> {
        let mut summaries: Vec<_> = self
            .snapshot()
            .await
            .iter()
            .map(|device| DeviceSummary {
                id: device.id().to_string(),
                name: device.name().to_string(),
                connected: device.is_connected(),
            })
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    /// Run `op` on each listed device, in the order given.
    ///
    /// Unknown ids are skipped and contribute nothing, so the result can be
    /// shorter than `ids`.
    pub async fn apply_to_all<S, F>(&self, ids: &[S], op: F) -> Vec<bool>
    where
        S: AsRef<str>,
        F: Fn(&dyn Device) -> BoxFuture<'_, bool>,
    {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(device) = self.get(id.as_ref()).await else {
                debug!("Skipping unknown device {}", id.as_ref());
                continue;
            };
            results.push(op(device.as_ref()).await);
        }
        results
    }

    /// Remove the listed devices and disconnect each of them.
    ///
    /// Entries are removed even if their disconnect goes wrong.
    pub async fn remove_and_disconnect<S: AsRef<str>>(&self, ids: &[S]) {
        let removed: Vec<_> = {
            let mut devices = self.devices.lock().await;
            ids.iter()
                .filter_map(|id| devices.remove(id.as_ref()))
                .collect()
        };
        disconnect(removed).await;
    }

    /// Remove and disconnect every device.
    pub async fn disconnect_all(&self) {
        let removed: Vec<_> = self.devices.lock().await.drain().map(|(_, d)| d).collect();
        disconnect(removed).await;
    }

    /// Send a keep-alive to every connected device.
    ///
    /// Devices are probed independently and a probe that has not finished
    /// within `probe_timeout` counts as failed. Returns how many probes failed.
    pub async fn keep_alive_all(&self, probe_timeout: Duration) -> usize {
        let connected: Vec<_> = self
            .snapshot()
            .await
            .into_iter()
            .filter(|device| device.is_connected())
            .collect();

        let results = join_all(connected.iter().map(|device| async move {
            match runtime::timeout(probe_timeout, device.keep_alive()).await {
                Ok(true) => true,
                Ok(false) => {
                    warn!("Keep-alive failed for device {}", device.name());
                    false
                }
                Err(_) => {
                    warn!(
                        "Keep-alive for device {} timed out after {:?}",
                        device.name(),
                        probe_timeout
                    );
                    false
                }
            }
        }))
        .await;

        results.into_iter().filter(|alive| !alive).count()
    }
}

async fn disconnect(devices: Vec<Arc<dyn Device>>) {
    join_all(devices.iter().map(|device| async move {
        device.disconnect().await;
        info!("Removed device {}", device.id());
    }))
    .await;
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::device::testing::FakeDevice;

    async fn registry_with(devices: &[&Arc<FakeDevice>]) -> Registry {
        let registry = Registry::new();
        for device in devices {
            assert!(registry.insert(Arc::clone(device) as Arc<dyn Device>).await);
        }
        registry
    }

    #[tokio::test]
    async fn test_apply_to_all_skips_missing_ids() {
        let a = Arc::new(FakeDevice::connected("a"));
        let b = Arc::new(FakeDevice::connected("b"));
        b.fail_commands.store(true, Ordering::SeqCst);
        let registry = registry_with(&[&a, &b]).await;

        let results = registry
            .apply_to_all(&["a", "missing", "b"], |device| device.set_power(true))
            .await;

        assert_eq!(results, vec![true, false]);
        assert_eq!(a.calls(), ["power true"]);
        assert_eq!(b.calls(), ["power true"]);
    }

    #[tokio::test]
    async fn test_apply_to_all_follows_given_order() {
        let a = Arc::new(FakeDevice::connected("a"));
        let b = Arc::new(FakeDevice::new("b"));
        let registry = registry_with(&[&a, &b]).await;

        let results = registry
            .apply_to_all(&["b", "a", "b"], |device| device.set_brightness(40))
            .await;
        assert_eq!(results, vec![false, true, false]);
    }

    #[tokio::test]
    async fn test_insert_keeps_existing_handle() {
        let first = Arc::new(FakeDevice::connected("a"));
        let registry = registry_with(&[&first]).await;

        let second: Arc<dyn Device> = Arc::new(FakeDevice::new("a"));
        assert!(!registry.insert(second).await);
        assert_eq!(registry.len().await, 1);
        assert!(registry.get("a").await.unwrap().is_connected());
    }

    #[tokio::test]
    async fn test_remove_and_disconnect() {
        let a = Arc::new(FakeDevice::connected("a"));
        let b = Arc::new(FakeDevice::connected("b"));
        let registry = registry_with(&[&a, &b]).await;

        registry.remove_and_disconnect(&["a", "missing"]).await;

        assert!(registry.get("a").await.is_none());
        assert!(registry.get("b").await.is_some());
        assert_eq!(a.calls(), ["disconnect"]);
        assert!(!a.is_connected());
        assert!(b.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_all_empties_registry() {
        let a = Arc::new(FakeDevice::connected("a"));
        let b = Arc::new(FakeDevice::new("b"));
        let registry = registry_with(&[&a, &b]).await;

        registry.disconnect_all().await;

        assert!(registry.is_empty().await);
        assert_eq!(a.calls(), ["disconnect"]);
        assert_eq!(b.calls(), ["disconnect"]);
    }

    #[tokio::test]
    async fn test_keep_alive_all_only_probes_connected_devices() {
        let a = Arc::new(FakeDevice::connected("a"));
        let b = Arc::new(FakeDevice::new("b"));
        let c = Arc::new(FakeDevice::connected("c"));
        c.fail_commands.store(true, Ordering::SeqCst);
        let registry = registry_with(&[&a, &b, &c]).await;

        assert_eq!(registry.keep_alive_all(Duration::from_secs(1)).await, 1);
        assert_eq!(a.keep_alives.load(Ordering::SeqCst), 1);
        assert_eq!(b.keep_alives.load(Ordering::SeqCst), 0);
        assert_eq!(c.keep_alives.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_keep_alive_all_gives_up_on_hung_device() {
        let hung = Arc::new(FakeDevice::connected("hung"));
        hung.hang_keep_alive.store(true, Ordering::SeqCst);
        let healthy = Arc::new(FakeDevice::connected("healthy"));
        let registry = registry_with(&[&hung, &healthy]).await;

        let start = runtime::Instant::now();
        assert_eq!(registry.keep_alive_all(Duration::from_millis(30)).await, 1);
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(healthy.calls(), ["keep_alive"]);
    }

    #[tokio::test]
    async fn test_summaries() {
        let b = Arc::new(FakeDevice::new("b"));
        let a = Arc::new(FakeDevice::connected("a"));
        let registry = registry_with(&[&b, &a]).await;

        let summaries = registry.summaries().await;
        assert_eq!(
            summaries,
            vec![
                DeviceSummary {
                    id: "a".to_string(),
                    name: "fake a".to_string(),
                    connected: true,
                },
                DeviceSummary {
                    id: "b".to_string(),
                    name: "fake b".to_string(),
                    connected: false,
                },
            ]
        );
    }
}
