//! In-process pub/sub for playback lifecycle events.
//!
//! Dispatch is synchronous on the emitter's thread, so subscribers are
//! expected not to block. Shaped after the shared-registry pattern in
//! `modular/src/audio.rs`'s `Arc<Mutex<HashMap<ScopeItem, ScopeBuffer>>>`:
//! a `parking_lot::Mutex`-guarded `Vec`, not a channel, since emission must
//! be synchronous and fan out to every live subscriber immediately.

use crate::sample::PlaybackId;
use engine_core::VoiceData;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// One scheduled voice as reported to the UI in `VoicesScheduled`.
#[derive(Clone, Debug)]
pub struct ScheduledVoiceInfo {
    pub start_time: f64,
    pub end_time: f64,
    pub data: VoiceData,
    /// Source string offsets (start, end) this voice traces back to.
    pub source_locations: Vec<(usize, usize)>,
}

#[derive(Clone, Debug)]
pub enum Signal {
    PlaybackStarted { playback_id: PlaybackId },
    PlaybackStopped { playback_id: PlaybackId },
    PreloadingSamples { playback_id: PlaybackId, count: usize, names: Vec<String> },
    SamplesPreloaded { playback_id: PlaybackId, count: usize, duration_ms: f64 },
    CycleCompleted { playback_id: PlaybackId, cycle_index: i64, at_time_sec: f64 },
    VoicesScheduled { playback_id: PlaybackId, voices: Vec<ScheduledVoiceInfo> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&Signal) + Send + Sync>;

#[derive(Default)]
pub struct SignalBus {
    subscribers: Mutex<Vec<(SubscriptionId, Callback)>>,
    next_id: AtomicU64,
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback; returns an id usable with `unsubscribe`.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().push((id, Arc::new(callback)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.lock().retain(|(sub_id, _)| *sub_id != id);
    }

    /// Dispatch synchronously to every current subscriber, in registration order.
    pub fn emit(&self, signal: Signal) {
        let subs = self.subscribers.lock().clone();
        for (_, callback) in subs {
            callback(&signal);
        }
    }

    /// Remove every subscriber. Called by a controller on stop -- note this
    /// clears the whole bus, so a bus should be scoped to one playback
    /// unless callers coordinate; `PlaybackController` only ever
    /// auto-subscribes its own OneShot watcher, so in the common case this
    /// only removes that.
    pub fn clear(&self) {
        self.subscribers.lock().clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
