//! Playback front-end and real-time audio back-end for the pattern engine.
//!
//! `engine_core` is the pure pattern/DSP library; this crate owns the
//! threads, the lock-free bridge between them, and the `cpal` device. The
//! front-end (scheduler/controller/preloader/signal bus) and back-end
//! (voice scheduler/renderer/orbit mixer/audio driver) never share mutable
//! state directly -- they only ever talk across the bridge in `bridge`.

pub mod backend;
pub mod bridge;
pub mod clock;
pub mod controller;
pub mod error;
pub mod orbits;
pub mod preloader;
pub mod sample;
pub mod signals;
pub mod voice;
pub mod voice_scheduler;

pub use bridge::{ControlCommand, FeedbackMessage, OrbitActivity, channel};
pub use controller::{ControllerHandle, PlaybackController, PlaybackOptions};
pub use error::{ControllerError, LoadError};
pub use sample::{Pcm, PlaybackId, SampleRequest, ScheduledVoice};
pub use signals::{Signal, SignalBus, SubscriptionId};
