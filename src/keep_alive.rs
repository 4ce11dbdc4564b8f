//! Periodic keep-alive sweep over a [`Registry`].

use std::sync::Arc;
use std::time::Duration;

use futures::channel::oneshot;
use futures::future::{Either, select};
use log::{debug, info};

use crate::registry::Registry;
use crate::runtime::{self, JoinHandle};

/// A background task that probes every connected device at a fixed interval.
///
/// Each tick works on a fresh snapshot of the registry, so devices added or
/// removed in between are picked up or dropped on the next tick. A failing
/// device is logged and does not affect the others or the timer.
pub struct KeepAlive {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl KeepAlive {
    /// Start sweeping `registry` every `interval`.
    pub fn start(registry: Arc<Registry>, interval: Duration) -> Self {
        let (stop, stopped) = oneshot::channel();
        let task = runtime::spawn(run(registry, interval, stopped));
        info!("Keep-alive started ({:?} interval)", interval);
        KeepAlive {
            stop: Some(stop),
            task: Some(task),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Stop the timer and wait for a sweep in progress to finish.
    /// Later calls do nothing.
    pub async fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            // The task may already be gone; nothing to signal then.
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            task.await;
            info!("Keep-alive stopped");
        }
    }
}

async fn run(registry: Arc<Registry>, interval: Duration, mut stopped: oneshot::Receiver<()>) {
    loop {
        let tick = runtime::sleep(interval);
        futures::pin_mut!(tick);

        match select(stopped, tick).await {
            // Stop requested, or the owner went away.
            Either::Left(_) => return,
            Either::Right((_, pending)) => stopped = pending,
        }

        // Each probe is cut off after one interval.
        let failures = registry.keep_alive_all(interval).await;
        if failures > 0 {
            debug!("Keep-alive sweep finished with {} failure(s)", failures);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::device::Device;
    use crate::device::testing::FakeDevice;

    #[tokio::test]
    async fn test_ticks_until_stopped() {
        let device = Arc::new(FakeDevice::connected("a"));
        let registry = Arc::new(Registry::new());
        registry.insert(Arc::clone(&device) as Arc<dyn Device>).await;

        let mut keep_alive = KeepAlive::start(Arc::clone(&registry), Duration::from_millis(20));
        assert!(keep_alive.is_running());
        runtime::sleep(Duration::from_millis(150)).await;
        keep_alive.stop().await;
        assert!(!keep_alive.is_running());

        let probes = device.keep_alives.load(Ordering::SeqCst);
        assert!(probes >= 2, "only {probes} probes");

        runtime::sleep(Duration::from_millis(60)).await;
        assert_eq!(device.keep_alives.load(Ordering::SeqCst), probes);

        // Stopping twice is harmless.
        keep_alive.stop().await;
    }

    #[tokio::test]
    async fn test_failing_device_does_not_stop_others() {
        let failing = Arc::new(FakeDevice::connected("bad"));
        failing.fail_commands.store(true, Ordering::SeqCst);
        let healthy = Arc::new(FakeDevice::connected("good"));
        let idle = Arc::new(FakeDevice::new("idle"));

        let registry = Arc::new(Registry::new());
        for device in [&failing, &healthy, &idle] {
            registry.insert(Arc::clone(device) as Arc<dyn Device>).await;
        }

        let mut keep_alive = KeepAlive::start(Arc::clone(&registry), Duration::from_millis(20));
        runtime::sleep(Duration::from_millis(150)).await;
        keep_alive.stop().await;

        assert!(failing.keep_alives.load(Ordering::SeqCst) >= 2);
        assert!(healthy.keep_alives.load(Ordering::SeqCst) >= 2);
        assert_eq!(idle.keep_alives.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_hung_device_does_not_starve_others() {
        let hung = Arc::new(FakeDevice::connected("hung"));
        hung.hang_keep_alive.store(true, Ordering::SeqCst);
        let healthy = Arc::new(FakeDevice::connected("healthy"));

        let registry = Arc::new(Registry::new());
        for device in [&hung, &healthy] {
            registry.insert(Arc::clone(device) as Arc<dyn Device>).await;
        }

        let mut keep_alive = KeepAlive::start(Arc::clone(&registry), Duration::from_millis(20));
        runtime::sleep(Duration::from_millis(300)).await;
        keep_alive.stop().await;

        let probes = healthy.keep_alives.load(Ordering::SeqCst);
        assert!(probes >= 4, "only {probes} probes");
        assert!(hung.keep_alives.load(Ordering::SeqCst) >= 4);
    }

    #[tokio::test]
    async fn test_picks_up_registry_changes() {
        let registry = Arc::new(Registry::new());
        let mut keep_alive = KeepAlive::start(Arc::clone(&registry), Duration::from_millis(20));

        let late = Arc::new(FakeDevice::connected("late"));
        runtime::sleep(Duration::from_millis(30)).await;
        registry.insert(Arc::clone(&late) as Arc<dyn Device>).await;
        runtime::sleep(Duration::from_millis(100)).await;
        assert!(late.keep_alives.load(Ordering::SeqCst) >= 1);

        registry.remove_and_disconnect(&["late"]).await;
        let after_removal = late.keep_alives.load(Ordering::SeqCst);
        runtime::sleep(Duration::from_millis(80)).await;
        keep_alive.stop().await;
        assert_eq!(late.keep_alives.load(Ordering::SeqCst), after_removal);
    }
}
