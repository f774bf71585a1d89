//! Refresh moderation for device lists.
//!
//! Some platforms report every device as gone and then back again when a
//! refresh is requested. `ModeratedDeviceList` holds removals reported during
//! a refresh until the network has been quiet for a while, and cancels them if
//! the device re-announces itself in the meantime.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::{Device, DeviceEvent, DeviceList, DeviceSink};

#[derive(Default)]
struct ModeratorState {
    sink: Option<DeviceSink>,
    devices: HashMap<String, Device>,
    pending_remove: HashMap<String, Device>,
    refreshing: bool,
    generation: u64,
}

struct Shared {
    state: Mutex<ModeratorState>,
    // Held while forwarding so events reach the sink in the order they were
    // decided, without holding `state` across the callback.
    delivery: Mutex<()>,
}

enum TimerCommand {
    /// (Re)start the quiet period for this refresh generation
    Arm(u64),
    Stop,
}

/// The one thread that closes refresh windows.
struct RefreshTimer {
    control: Sender<TimerCommand>,
    handle: JoinHandle<()>,
}

/// A [`DeviceList`] wrapper that deduplicates announcements and moderates
/// removals reported during a refresh.
pub struct ModeratedDeviceList {
    inner: Arc<dyn DeviceList>,
    shared: Arc<Shared>,
    quiet_period: Duration,
    timer: Mutex<Option<RefreshTimer>>,
}

impl ModeratedDeviceList {
    /// Wrap `inner`; removals seen during a refresh are held for `quiet_period`
    /// after the most recent refresh request.
    pub fn new(inner: Arc<dyn DeviceList>, quiet_period: Duration) -> Self {
        Self {
            inner,
            shared: Arc::new(Shared {
                state: Mutex::new(ModeratorState::default()),
                delivery: Mutex::new(()),
            }),
            quiet_period,
            timer: Mutex::new(None),
        }
    }

    /// Number of devices currently considered present.
    pub fn device_count(&self) -> usize {
        self.shared.state.lock().devices.len()
    }

    /// Whether a refresh window is open.
    pub fn is_refreshing(&self) -> bool {
        self.shared.state.lock().refreshing
    }

    /// Close the refresh window now and deliver held removals.
    pub fn expire_refresh(&self) {
        Shared::expire(&self.shared, None);
    }

    /// Start (or restart) the quiet period for `generation`, spawning the
    /// timer thread on first use.
    fn arm_timer(&self, generation: u64) {
        let mut timer = self.timer.lock();

        if let Some(running) = timer.as_ref() {
            if running.control.send(TimerCommand::Arm(generation)).is_ok() {
                return;
            }
        }

        let (control, commands) = channel::unbounded();
        let shared = Arc::downgrade(&self.shared);
        let quiet_period = self.quiet_period;
        let spawned = thread::Builder::new()
            .name("ohtopology-refresh-moderator".to_string())
            .spawn(move || run_timer(shared, commands, quiet_period));

        match spawned {
            Ok(handle) => {
                let _ = control.send(TimerCommand::Arm(generation));
                *timer = Some(RefreshTimer { control, handle });
            }
            Err(e) => {
                drop(timer);
                tracing::warn!("Failed to spawn refresh moderator, expiring immediately: {}", e);
                Shared::expire(&self.shared, Some(generation));
            }
        }
    }

    fn stop_timer(&self) {
        let Some(timer) = self.timer.lock().take() else {
            return;
        };
        let _ = timer.control.send(TimerCommand::Stop);
        if timer.handle.thread().id() != thread::current().id() && timer.handle.join().is_err() {
            tracing::warn!("Refresh moderator thread panicked");
        }
    }
}

impl Drop for ModeratedDeviceList {
    fn drop(&mut self) {
        self.stop_timer();
    }
}

fn run_timer(
    shared: Weak<Shared>,
    commands: channel::Receiver<TimerCommand>,
    quiet_period: Duration,
) {
    let mut deadline: Option<(Instant, u64)> = None;

    loop {
        let command = match deadline {
            Some((at, _)) => commands.recv_timeout(at.saturating_duration_since(Instant::now())),
            None => commands.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match command {
            Ok(TimerCommand::Arm(generation)) => {
                deadline = Some((Instant::now() + quiet_period, generation));
            }
            Ok(TimerCommand::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                let Some((_, generation)) = deadline.take() else {
                    continue;
                };
                match shared.upgrade() {
                    Some(shared) => Shared::expire(&shared, Some(generation)),
                    None => break,
                }
            }
        }
    }

    tracing::debug!("Refresh moderator exiting");
}

impl Shared {
    fn handle(&self, event: DeviceEvent) {
        let _order = self.delivery.lock();

        let (sink, forward) = {
            let mut state = self.state.lock();
            let Some(sink) = state.sink.clone() else {
                return;
            };

            let forward = match event {
                DeviceEvent::Appeared(device) => {
                    let udn = device.udn.clone();
                    tracing::debug!(
                        "+device {} {} refreshing={}",
                        udn,
                        device.friendly_name,
                        state.refreshing
                    );
                    if state.pending_remove.remove(&udn).is_some() {
                        tracing::debug!("Cancelled pending removal of {}", udn);
                    }
                    if state.devices.contains_key(&udn) {
                        None
                    } else {
                        state.devices.insert(udn, device.clone());
                        Some(DeviceEvent::Appeared(device))
                    }
                }
                DeviceEvent::Disappeared(device) => {
                    let udn = device.udn.clone();
                    tracing::debug!("-device {} refreshing={}", udn, state.refreshing);
                    if state.refreshing {
                        state.pending_remove.entry(udn).or_insert(device);
                        None
                    } else {
                        state.devices.remove(&udn).map(DeviceEvent::Disappeared)
                    }
                }
            };

            (sink, forward)
        };

        if let Some(event) = forward {
            sink(event);
        }
    }

    /// Close the refresh window. With `Some(generation)` this only happens if
    /// no newer refresh has been requested since.
    fn expire(shared: &Arc<Shared>, generation: Option<u64>) {
        let _order = shared.delivery.lock();

        let (sink, removed) = {
            let mut state = shared.state.lock();
            if let Some(generation) = generation {
                if generation != state.generation || !state.refreshing {
                    return;
                }
            }
            state.refreshing = false;

            let pending: Vec<String> = state.pending_remove.drain().map(|(udn, _)| udn).collect();
            tracing::debug!("Refresh window expired with {} pending removals", pending.len());

            let removed: Vec<Device> = pending
                .iter()
                .filter_map(|udn| state.devices.remove(udn))
                .collect();

            (state.sink.clone(), removed)
        };

        if let Some(sink) = sink {
            for device in removed {
                sink(DeviceEvent::Disappeared(device));
            }
        }
    }
}

impl DeviceList for ModeratedDeviceList {
    fn start(&self, sink: DeviceSink) {
        self.shared.state.lock().sink = Some(sink);

        let weak = Arc::downgrade(&self.shared);
        self.inner.start(Arc::new(move |event| {
            if let Some(shared) = weak.upgrade() {
                shared.handle(event);
            }
        }));
    }

    fn refresh(&self) {
        let generation = {
            let mut state = self.shared.state.lock();
            state.refreshing = true;
            state.generation += 1;
            tracing::debug!("Refresh requested (generation {})", state.generation);
            state.generation
        };

        self.inner.refresh();
        self.arm_timer(generation);
    }

    fn stop(&self) {
        self.inner.stop();
        self.stop_timer();
        let mut state = self.shared.state.lock();
        state.sink = None;
        state.pending_remove.clear();
        state.refreshing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DeviceKind;

    #[derive(Default)]
    struct ManualList {
        sink: Mutex<Option<DeviceSink>>,
        refreshes: Mutex<usize>,
    }

    impl ManualList {
        fn emit(&self, event: DeviceEvent) {
            let sink = self.sink.lock().clone();
            if let Some(sink) = sink {
                sink(event);
            }
        }
    }

    impl DeviceList for ManualList {
        fn start(&self, sink: DeviceSink) {
            *self.sink.lock() = Some(sink);
        }

        fn refresh(&self) {
            *self.refreshes.lock() += 1;
        }
    }

    fn device(udn: &str) -> Device {
        Device::new(udn, "Room:Player", "http://10.0.0.2/desc.xml", DeviceKind::Product)
    }

    fn moderated(quiet: Duration) -> (Arc<ManualList>, ModeratedDeviceList, Arc<Mutex<Vec<DeviceEvent>>>) {
        let inner = Arc::new(ManualList::default());
        let list = ModeratedDeviceList::new(inner.clone(), quiet);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        list.start(Arc::new(move |e| sink_seen.lock().push(e)));
        (inner, list, seen)
    }

    #[test]
    fn test_duplicate_appear_suppressed() {
        let (inner, list, seen) = moderated(Duration::from_secs(60));
        inner.emit(DeviceEvent::Appeared(device("a")));
        inner.emit(DeviceEvent::Appeared(device("a")));
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(list.device_count(), 1);
    }

    #[test]
    fn test_unknown_removal_ignored() {
        let (inner, _list, seen) = moderated(Duration::from_secs(60));
        inner.emit(DeviceEvent::Disappeared(device("ghost")));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_removal_held_during_refresh_and_cancelled_by_reappear() {
        let (inner, list, seen) = moderated(Duration::from_secs(60));
        inner.emit(DeviceEvent::Appeared(device("a")));
        list.refresh();
        assert_eq!(*inner.refreshes.lock(), 1);

        inner.emit(DeviceEvent::Disappeared(device("a")));
        inner.emit(DeviceEvent::Appeared(device("a")));
        list.expire_refresh();

        assert_eq!(seen.lock().as_slice(), &[DeviceEvent::Appeared(device("a"))]);
        assert!(!list.is_refreshing());
    }

    #[test]
    fn test_pending_removal_delivered_on_expiry() {
        let (inner, list, seen) = moderated(Duration::from_secs(60));
        inner.emit(DeviceEvent::Appeared(device("a")));
        inner.emit(DeviceEvent::Appeared(device("b")));
        list.refresh();
        inner.emit(DeviceEvent::Disappeared(device("b")));
        assert_eq!(seen.lock().len(), 2);

        list.expire_refresh();
        assert_eq!(
            seen.lock().last(),
            Some(&DeviceEvent::Disappeared(device("b")))
        );
        assert_eq!(list.device_count(), 1);
    }

    #[test]
    fn test_timer_expires_window() {
        let (inner, list, seen) = moderated(Duration::from_millis(20));
        inner.emit(DeviceEvent::Appeared(device("a")));
        list.refresh();
        inner.emit(DeviceEvent::Disappeared(device("a")));

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while list.is_refreshing() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        // The timer clears the flag and delivers under the same delivery lock.
        drop(list.shared.delivery.lock());
        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn test_repeated_refresh_shares_one_timer() {
        let (inner, list, seen) = moderated(Duration::from_millis(30));
        inner.emit(DeviceEvent::Appeared(device("a")));
        list.refresh();
        let first = list.timer.lock().as_ref().map(|t| t.handle.thread().id());
        list.refresh();
        list.refresh();
        let last = list.timer.lock().as_ref().map(|t| t.handle.thread().id());
        assert!(first.is_some());
        assert_eq!(first, last);

        inner.emit(DeviceEvent::Disappeared(device("a")));
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while list.is_refreshing() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        drop(list.shared.delivery.lock());
        assert_eq!(seen.lock().last(), Some(&DeviceEvent::Disappeared(device("a"))));
    }

    #[test]
    fn test_stop_ends_timer_without_waiting_out_the_window() {
        let (inner, list, seen) = moderated(Duration::from_secs(3600));
        inner.emit(DeviceEvent::Appeared(device("a")));
        list.refresh();
        inner.emit(DeviceEvent::Disappeared(device("a")));

        let started = std::time::Instant::now();
        list.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(list.timer.lock().is_none());
        assert!(!list.is_refreshing());
        // The held removal is discarded, not delivered
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_stop_drops_later_events() {
        let (inner, list, seen) = moderated(Duration::from_secs(60));
        list.stop();
        inner.emit(DeviceEvent::Appeared(device("a")));
        assert!(seen.lock().is_empty());
    }
}
