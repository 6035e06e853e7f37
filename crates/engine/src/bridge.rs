//! Lock-free bounded SPSC bridge between the front-end scheduler and the
//! back-end voice scheduler. Built on `rtrb`, the real-time ring buffer
//! `rf-audio`/`rf-bridge` use for exactly this front/back split.
//!
//! Two independent rings: `Control` (front → back) and `Feedback` (back →
//! front). Both directions are strict FIFO, bounded, and never block the
//! audio thread: a full `Control` ring drops the command and records it in
//! the front-end's diagnostics counter; a full `Feedback` ring drops the
//! message rather than stall the audio callback.

use crate::sample::{PlaybackId, SampleRequest, ScheduledVoice};
use engine_core::pattern_system::Fraction;
use rtrb::{Consumer, Producer, RingBuffer};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Sized for >=1s of scheduling ahead at realistic event densities.
pub const CONTROL_QUEUE_CAPACITY: usize = 4096;
pub const FEEDBACK_QUEUE_CAPACITY: usize = 4096;

/// Commands sent from the front-end to the back-end.
pub enum ControlCommand {
    ScheduleVoice {
        playback_id: PlaybackId,
        voice: ScheduledVoice,
    },
    ReplaceVoices {
        playback_id: PlaybackId,
        from_cycle: Fraction,
        to_cycle: Fraction,
        voices: Vec<ScheduledVoice>,
    },
    SampleComplete {
        playback_id: PlaybackId,
        req: SampleRequest,
        note: Option<f64>,
        pitch_hz: f64,
        pcm: Arc<[f32]>,
        pcm_sample_rate: u32,
    },
    SampleNotFound {
        playback_id: PlaybackId,
        req: SampleRequest,
    },
    Cleanup {
        playback_id: PlaybackId,
    },
}

/// Per-orbit activity reported alongside `Diagnostics`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrbitActivity {
    pub id: u32,
    pub active: bool,
}

/// Messages sent from the back-end to the front-end.
pub enum FeedbackMessage {
    RequestSample {
        playback_id: PlaybackId,
        req: SampleRequest,
    },
    Diagnostics {
        render_headroom: f64,
        active_voice_count: u32,
        orbits: Vec<OrbitActivity>,
    },
    PlaybackLatency {
        playback_id: PlaybackId,
        backend_timestamp_ms: f64,
    },
}

/// The front-end's half of the bridge: produces control commands, consumes
/// feedback. Also tracks how many control commands were dropped for
/// overflow, since the back-end never observes (or reports) those drops.
pub struct FrontBridge {
    control_tx: Producer<ControlCommand>,
    feedback_rx: Consumer<FeedbackMessage>,
    dropped_controls: Arc<AtomicU64>,
}

/// The back-end's half of the bridge: consumes control commands, produces
/// feedback. Lives entirely on the audio thread.
pub struct BackBridge {
    control_rx: Consumer<ControlCommand>,
    feedback_tx: Producer<FeedbackMessage>,
}

/// Build a connected front/back pair.
pub fn channel() -> (FrontBridge, BackBridge) {
    let (control_tx, control_rx) = RingBuffer::new(CONTROL_QUEUE_CAPACITY);
    let (feedback_tx, feedback_rx) = RingBuffer::new(FEEDBACK_QUEUE_CAPACITY);
    let dropped_controls = Arc::new(AtomicU64::new(0));

    (
        FrontBridge {
            control_tx,
            feedback_rx,
            dropped_controls: dropped_controls.clone(),
        },
        BackBridge {
            control_rx,
            feedback_tx,
        },
    )
}

impl FrontBridge {
    /// Enqueue a control command. Never blocks; on overflow the command is
    /// dropped and counted rather than stalling the caller (`TransientControlDrop`).
    pub fn send_control(&mut self, cmd: ControlCommand) {
        if self.control_tx.push(cmd).is_err() {
            self.dropped_controls.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Drain all feedback currently available, in FIFO order.
    pub fn poll_feedback(&mut self) -> Vec<FeedbackMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = self.feedback_rx.pop() {
            out.push(msg);
        }
        out
    }

    /// Count of control commands dropped so far for queue overflow.
    pub fn dropped_control_count(&self) -> u64 {
        self.dropped_controls.load(Ordering::Relaxed)
    }
}

impl BackBridge {
    /// Drain all control commands currently available, in FIFO order.
    /// Called once per block from the audio thread; never allocates beyond
    /// the returned `Vec`'s growth (small, bounded by per-block arrivals).
    pub fn drain_control(&mut self) -> Vec<ControlCommand> {
        let mut out = Vec::new();
        while let Ok(cmd) = self.control_rx.pop() {
            out.push(cmd);
        }
        out
    }

    /// Enqueue feedback. Never blocks; drops silently on overflow rather
    /// than stall the audio callback.
    pub fn send_feedback(&mut self, msg: FeedbackMessage) {
        let _ = self.feedback_tx.push(msg);
    }
}
