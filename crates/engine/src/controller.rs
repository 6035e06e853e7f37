//! Playback controller: the pattern-to-voice scheduling loop.
//!
//! One controller per live playback. It owns the mutable pattern and tempo
//! -- the audio thread only ever sees [`crate::bridge::ControlCommand`]s,
//! never a pattern -- and drives a ~60 Hz cooperative loop modeled on the
//! single-flight `limitedParallelism(1)` scheduler task shape in
//! `modular/src/commands.rs`, expressed here as a single-threaded tokio
//! task on the current-thread-equivalent interval timer.

use crate::bridge::{ControlCommand, FeedbackMessage, FrontBridge};
use crate::clock::now_ms;
use crate::error::ControllerError;
use crate::preloader::SamplePreloader;
use crate::sample::{PlaybackId, SampleRequest, ScheduledVoice};
use crate::signals::{Signal, SignalBus, SubscriptionId};
use engine_core::VoiceData;
use engine_core::pattern_system::{Fraction, Pattern};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::debug;

const TICK_HZ: u64 = 60;

fn f64_to_bits_atomic(v: f64) -> u64 {
    v.to_bits()
}
fn bits_to_f64_atomic(v: u64) -> f64 {
    f64::from_bits(v)
}

/// Clamp applied to measured backend latency.
const BACKEND_LATENCY_CLAMP_MS: (f64, f64) = (0.0, 5000.0);

/// One-shot clamp: emit nothing beyond the target cycle count.
#[derive(Clone, Copy, Debug)]
pub struct OneShotOptions {
    pub cycles_to_play: i64,
}

#[derive(Clone, Debug)]
pub struct PlaybackOptions {
    pub cps: f64,
    pub sample_rate: u32,
    /// Seconds of lead time the scheduler keeps ahead of the playhead.
    pub lookahead_sec: f64,
    pub one_shot: Option<OneShotOptions>,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            cps: 0.5,
            sample_rate: 44_100,
            lookahead_sec: 0.25,
            one_shot: None,
        }
    }
}

impl PlaybackOptions {
    fn lookahead_cycles(&self, sec_per_cycle: f64) -> f64 {
        let base = self.lookahead_sec / sec_per_cycle;
        match self.one_shot {
            Some(OneShotOptions { cycles_to_play }) => base.min(0.9 * cycles_to_play as f64),
            None => base,
        }
    }

    fn prefetch_cycles(&self) -> f64 {
        match self.one_shot {
            Some(OneShotOptions { cycles_to_play }) => cycles_to_play as f64,
            None => 2.0,
        }
    }
}

struct SharedState {
    pattern: Mutex<Pattern<VoiceData>>,
    cps_bits: AtomicU64,
    running: AtomicBool,
    query_cursor_cycles: AtomicI64,
    last_emitted_cycle: AtomicI64,
    backend_latency_ms_bits: AtomicU64,
    start_time_ms_bits: AtomicU64,
    one_shot_sub: Mutex<Option<SubscriptionId>>,
}

impl SharedState {
    fn cps(&self) -> f64 {
        bits_to_f64_atomic(self.cps_bits.load(Ordering::Acquire))
    }
    fn set_cps(&self, v: f64) {
        self.cps_bits.store(f64_to_bits_atomic(v), Ordering::Release);
    }
    fn backend_latency_ms(&self) -> f64 {
        bits_to_f64_atomic(self.backend_latency_ms_bits.load(Ordering::Acquire))
    }
    fn start_time_ms(&self) -> f64 {
        bits_to_f64_atomic(self.start_time_ms_bits.load(Ordering::Acquire))
    }
}

/// Owns the scheduling task and the shared mutable pattern/tempo state for
/// one playback. Cloning a handle is cheap; every clone controls the same
/// underlying playback.
#[derive(Clone)]
pub struct ControllerHandle {
    inner: Arc<SharedState>,
    playback_id: PlaybackId,
    options: PlaybackOptions,
    bridge: Arc<Mutex<FrontBridge>>,
    signals: Arc<SignalBus>,
    preloader: Arc<SamplePreloader>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

pub struct PlaybackController;

impl PlaybackController {
    /// Build a handle for a new, not-yet-started playback.
    pub fn new(
        playback_id: PlaybackId,
        pattern: Pattern<VoiceData>,
        options: PlaybackOptions,
        bridge: Arc<Mutex<FrontBridge>>,
        signals: Arc<SignalBus>,
        preloader: Arc<SamplePreloader>,
    ) -> ControllerHandle {
        let inner = Arc::new(SharedState {
            pattern: Mutex::new(pattern),
            cps_bits: AtomicU64::new(f64_to_bits_atomic(options.cps)),
            running: AtomicBool::new(false),
            query_cursor_cycles: AtomicI64::new(0),
            last_emitted_cycle: AtomicI64::new(-1),
            backend_latency_ms_bits: AtomicU64::new(f64_to_bits_atomic(f64::NAN)),
            start_time_ms_bits: AtomicU64::new(f64_to_bits_atomic(0.0)),
            one_shot_sub: Mutex::new(None),
        });
        ControllerHandle {
            inner,
            playback_id,
            options,
            bridge,
            signals,
            preloader,
            task: Arc::new(Mutex::new(None)),
        }
    }
}

impl ControllerHandle {
    pub fn playback_id(&self) -> &PlaybackId {
        &self.playback_id
    }

    /// Start the playback: preload, emit `PlaybackStarted`, then spawn the
    /// scheduling task. Rejects a double-start.
    pub async fn start(&self) -> Result<(), ControllerError> {
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ControllerError::AlreadyRunning);
        }

        self.preload().await;

        self.inner
            .start_time_ms_bits
            .store(f64_to_bits_atomic(now_ms()), Ordering::Release);
        self.signals.emit(Signal::PlaybackStarted {
            playback_id: self.playback_id.clone(),
        });

        if let Some(OneShotOptions { cycles_to_play }) = self.options.one_shot {
            let me = self.clone();
            let id = self.signals.subscribe(move |signal| {
                if let Signal::CycleCompleted { cycle_index, .. } = signal {
                    if *cycle_index >= cycles_to_play - 1 {
                        let me = me.clone();
                        tokio::spawn(async move {
                            let _ = me.stop().await;
                        });
                    }
                }
            });
            *self.inner.one_shot_sub.lock() = Some(id);
        }

        let me = self.clone();
        let handle = tokio::spawn(async move { me.run_loop().await });
        *self.task.lock() = Some(handle);
        Ok(())
    }

    /// Query `[0, 2)` for distinct sample requests and block until every
    /// one resolves. Emits no signals during the query but
    /// does emit the `PreloadingSamples`/`SamplesPreloaded` bracket via the
    /// preloader.
    async fn preload(&self) {
        let haps = {
            let pattern = self.inner.pattern.lock();
            pattern.query_arc(Fraction::from_integer(0), Fraction::from_integer(2))
        };
        let reqs = distinct_sample_requests(&haps);
        if reqs.is_empty() {
            return;
        }
        self.preloader
            .ensure_loaded(
                self.playback_id.clone(),
                reqs,
                &self.bridge,
                Some(&self.signals),
            )
            .await;
    }

    /// Replace the pattern; tell the back-end to replay the overlapping
    /// window with the new content.
    pub fn update_pattern(&self, pattern: Pattern<VoiceData>) {
        *self.inner.pattern.lock() = pattern;
        self.replace_overlap();
    }

    /// Replace the tempo; same overlap-replay contract as `update_pattern`.
    pub fn update_cycles_per_second(&self, cps: f64) {
        self.inner.set_cps(cps);
        self.replace_overlap();
    }

    fn replace_overlap(&self) {
        let sec_per_cycle = 1.0 / self.inner.cps();
        let elapsed_s = (now_ms() - self.inner.start_time_ms()) / 1000.0;
        let now_cycle = (elapsed_s / sec_per_cycle).floor() as i64;
        let cursor = self.inner.query_cursor_cycles.load(Ordering::Acquire);
        let to_cycle = cursor.max(now_cycle);

        let haps = {
            let pattern = self.inner.pattern.lock();
            pattern.query_arc(Fraction::from_integer(now_cycle), Fraction::from_integer(to_cycle))
        };
        let voices = onset_voices(&haps, self.playback_id.clone(), now_ms(), sec_per_cycle);
        self.bridge.lock().send_control(ControlCommand::ReplaceVoices {
            playback_id: self.playback_id.clone(),
            from_cycle: Fraction::from_integer(now_cycle),
            to_cycle: Fraction::from_integer(to_cycle),
            voices,
        });
    }

    /// Stop the playback: cancel the scheduler task, tell the back-end to
    /// clean up, emit `PlaybackStopped`, clear any self-owned subscriptions
    /// clear any self-owned subscriptions.
    pub async fn stop(&self) -> Result<(), ControllerError> {
        if self
            .inner
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ControllerError::NotRunning);
        }

        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
        self.bridge.lock().send_control(ControlCommand::Cleanup {
            playback_id: self.playback_id.clone(),
        });
        self.signals.emit(Signal::PlaybackStopped {
            playback_id: self.playback_id.clone(),
        });
        if let Some(id) = self.inner.one_shot_sub.lock().take() {
            self.signals.unsubscribe(id);
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    async fn run_loop(&self) {
        let mut ticker = interval(Duration::from_millis(1000 / TICK_HZ));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if !self.is_running() {
                return;
            }
            self.tick().await;
        }
    }

    async fn tick(&self) {
        self.drain_feedback();

        let sec_per_cycle = 1.0 / self.inner.cps();
        let elapsed_s = (now_ms() - self.inner.start_time_ms()) / 1000.0;
        let elapsed_cycles = elapsed_s / sec_per_cycle;

        self.emit_cycle_completions(elapsed_cycles, sec_per_cycle);
        self.run_sample_lookahead(elapsed_cycles).await;
        self.schedule_next_cycles(elapsed_cycles, sec_per_cycle);
    }

    fn drain_feedback(&self) {
        let messages = self.bridge.lock().poll_feedback();
        for msg in messages {
            match msg {
                FeedbackMessage::PlaybackLatency { backend_timestamp_ms, .. } => {
                    let measured = backend_timestamp_ms - self.inner.start_time_ms();
                    let clamped = measured.clamp(BACKEND_LATENCY_CLAMP_MS.0, BACKEND_LATENCY_CLAMP_MS.1);
                    self.inner
                        .backend_latency_ms_bits
                        .store(f64_to_bits_atomic(clamped), Ordering::Release);
                }
                FeedbackMessage::RequestSample { req, .. } => {
                    let preloader = self.preloader.clone();
                    let bridge = self.bridge.clone();
                    let signals = self.signals.clone();
                    let playback_id = self.playback_id.clone();
                    tokio::spawn(async move {
                        preloader
                            .ensure_loaded(playback_id, vec![req], &bridge, Some(&signals))
                            .await;
                    });
                }
                FeedbackMessage::Diagnostics { .. } => {
                    debug!("diagnostics feedback ignored at controller level");
                }
            }
        }
    }

    fn emit_cycle_completions(&self, elapsed_cycles: f64, sec_per_cycle: f64) {
        let target = elapsed_cycles.floor() as i64 - 1;
        let mut last = self.inner.last_emitted_cycle.load(Ordering::Acquire);
        while target > last {
            last += 1;
            self.inner.last_emitted_cycle.store(last, Ordering::Release);
            self.signals.emit(Signal::CycleCompleted {
                playback_id: self.playback_id.clone(),
                cycle_index: last,
                at_time_sec: (last + 1) as f64 * sec_per_cycle,
            });
        }
    }

    async fn run_sample_lookahead(&self, elapsed_cycles: f64) {
        let sec_per_cycle = 1.0 / self.inner.cps();
        let prefetch = self.options.prefetch_cycles();
        let cursor = self.inner.query_cursor_cycles.load(Ordering::Acquire);
        let lookahead_end = (elapsed_cycles + self.options.lookahead_cycles(sec_per_cycle))
            .ceil()
            .min((elapsed_cycles + prefetch).ceil()) as i64;
        if lookahead_end <= cursor {
            return;
        }
        let haps = {
            let pattern = self.inner.pattern.lock();
            pattern.query_arc(Fraction::from_integer(cursor), Fraction::from_integer(lookahead_end))
        };
        let reqs = distinct_sample_requests(&haps);
        if reqs.is_empty() {
            return;
        }
        self.preloader
            .ensure_loaded(self.playback_id.clone(), reqs, &self.bridge, None)
            .await;
    }

    fn schedule_next_cycles(&self, elapsed_cycles: f64, sec_per_cycle: f64) {
        let lookahead = self.options.lookahead_cycles(sec_per_cycle);
        let mut cursor = self.inner.query_cursor_cycles.load(Ordering::Acquire);
        while (cursor as f64) < elapsed_cycles + lookahead {
            let haps = {
                let pattern = self.inner.pattern.lock();
                pattern.query_arc(Fraction::from_integer(cursor), Fraction::from_integer(cursor + 1))
            };
            let latency_ms = self.inner.backend_latency_ms();
            let latency_ms = if latency_ms.is_nan() { 0.0 } else { latency_ms };
            let scheduled_voices = onset_voices(
                &haps,
                self.playback_id.clone(),
                self.inner.start_time_ms(),
                sec_per_cycle,
            );

            if !scheduled_voices.is_empty() {
                let info = scheduled_voices
                    .iter()
                    .map(|v| crate::signals::ScheduledVoiceInfo {
                        start_time: v.start_time_s + latency_ms / 1000.0,
                        end_time: v.gate_end_time_s + latency_ms / 1000.0,
                        data: v.data.clone(),
                        source_locations: v.source_locations.clone(),
                    })
                    .collect();
                self.signals.emit(Signal::VoicesScheduled {
                    playback_id: self.playback_id.clone(),
                    voices: info,
                });
                let mut bridge = self.bridge.lock();
                for voice in scheduled_voices {
                    bridge.send_control(ControlCommand::ScheduleVoice {
                        playback_id: self.playback_id.clone(),
                        voice,
                    });
                }
            }
            cursor += 1;
            self.inner.query_cursor_cycles.store(cursor, Ordering::Release);
        }
    }
}

fn distinct_sample_requests(haps: &[engine_core::pattern_system::Hap<VoiceData>]) -> Vec<SampleRequest> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for hap in haps {
        if hap.value.sound.is_none() {
            continue;
        }
        let req = SampleRequest::from_voice_data(&hap.value);
        if seen.insert(req.clone()) {
            out.push(req);
        }
    }
    out
}

/// Filter to onset haps and translate to relative-seconds `ScheduledVoice`s.
fn onset_voices(
    haps: &[engine_core::pattern_system::Hap<VoiceData>],
    playback_id: PlaybackId,
    playback_start_ms: f64,
    sec_per_cycle: f64,
) -> Vec<ScheduledVoice> {
    haps.iter()
        .filter(|hap| hap.has_onset())
        .filter_map(|hap| {
            let whole = hap.whole.clone()?;
            let start_time_s = whole.begin.to_f64() * sec_per_cycle;
            let gate_end_time_s = whole.end.to_f64() * sec_per_cycle;
            Some(ScheduledVoice {
                playback_id: playback_id.clone(),
                data: hap.value.clone(),
                start_time_s,
                gate_end_time_s,
                playback_start_time_s: playback_start_ms / 1000.0,
                source_locations: hap.context.get_all_span_tuples(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::pattern_system::fastcat;
    use engine_core::VoiceData;

    fn bd_pattern() -> Pattern<VoiceData> {
        fastcat(vec![
            engine_core::pattern_system::pure(VoiceData::with_sound("bd")),
        ])
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let (front, _back) = crate::bridge::channel();
        let bridge = Arc::new(Mutex::new(front));
        let signals = Arc::new(SignalBus::new());
        struct NullLoader;
        impl crate::preloader::SampleLoader for NullLoader {
            fn load(&self, req: &SampleRequest) -> crate::preloader::LoadFuture {
                let name = req.display_name();
                Box::pin(async move { Err(crate::error::LoadError::NotFound(name)) })
            }
        }
        let preloader = Arc::new(SamplePreloader::new(Arc::new(NullLoader)));
        let handle = PlaybackController::new(
            "p1".into(),
            bd_pattern(),
            PlaybackOptions::default(),
            bridge,
            signals,
            preloader,
        );
        handle.start().await.unwrap();
        let err = handle.start().await.unwrap_err();
        assert!(matches!(err, ControllerError::AlreadyRunning));
        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_without_start_errors() {
        let (front, _back) = crate::bridge::channel();
        let bridge = Arc::new(Mutex::new(front));
        let signals = Arc::new(SignalBus::new());
        struct NullLoader;
        impl crate::preloader::SampleLoader for NullLoader {
            fn load(&self, req: &SampleRequest) -> crate::preloader::LoadFuture {
                let name = req.display_name();
                Box::pin(async move { Err(crate::error::LoadError::NotFound(name)) })
            }
        }
        let preloader = Arc::new(SamplePreloader::new(Arc::new(NullLoader)));
        let handle = PlaybackController::new(
            "p1".into(),
            bd_pattern(),
            PlaybackOptions::default(),
            bridge,
            signals,
            preloader,
        );
        let err = handle.stop().await.unwrap_err();
        assert!(matches!(err, ControllerError::NotRunning));
    }
}
