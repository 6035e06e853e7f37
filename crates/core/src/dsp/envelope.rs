//! Frame-counted ADSR envelope for the VCA stage of the voice pipeline.
//!
//! Adapted from a per-channel ADSR state machine (`EnvelopeStage` +
//! Schmitt-triggered gate), but driven by an absolute frame index instead of
//! a continuously-integrated per-sample ramp: the scheduler already knows
//! `startFrame`, `gateEndFrame`, and `endFrame` for a voice, so the envelope
//! can look up its stage directly from frame arithmetic rather than stepping
//! a running level forward sample by sample.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvelopeStage {
    Attack,
    Decay,
    Sustain,
    Release,
    Dead,
}

#[derive(Clone, Copy, Debug)]
pub struct AdsrFrames {
    pub attack_frames: u64,
    pub decay_frames: u64,
    pub sustain_level: f64,
    pub release_frames: u64,
}

/// Tracks one voice's envelope across blocks. `gate_end_frame` is absolute;
/// release begins there regardless of which stage attack/decay reached.
#[derive(Clone, Copy, Debug)]
pub struct Envelope {
    params: AdsrFrames,
    start_frame: u64,
    gate_end_frame: u64,
    /// Level captured at the instant the gate closes, so release always
    /// ramps from wherever attack/decay/sustain actually were.
    release_start_level: Option<f64>,
    last_stage: EnvelopeStage,
}

impl Envelope {
    pub fn new(params: AdsrFrames, start_frame: u64, gate_end_frame: u64) -> Self {
        Self {
            params,
            start_frame,
            gate_end_frame,
            release_start_level: None,
            last_stage: EnvelopeStage::Attack,
        }
    }

    fn level_before_release(&self, frame: u64) -> f64 {
        let elapsed = frame.saturating_sub(self.start_frame);
        if elapsed < self.params.attack_frames {
            if self.params.attack_frames == 0 {
                1.0
            } else {
                elapsed as f64 / self.params.attack_frames as f64
            }
        } else {
            let decay_elapsed = elapsed - self.params.attack_frames;
            if decay_elapsed < self.params.decay_frames {
                if self.params.decay_frames == 0 {
                    self.params.sustain_level
                } else {
                    let t = decay_elapsed as f64 / self.params.decay_frames as f64;
                    1.0 + t * (self.params.sustain_level - 1.0)
                }
            } else {
                self.params.sustain_level
            }
        }
    }

    /// Envelope value at `frame` in `[0, 1]`, and the stage it's in.
    pub fn value_at(&mut self, frame: u64) -> (f64, EnvelopeStage) {
        if frame < self.gate_end_frame {
            let elapsed = frame.saturating_sub(self.start_frame);
            let stage = if elapsed < self.params.attack_frames {
                EnvelopeStage::Attack
            } else if elapsed < self.params.attack_frames + self.params.decay_frames {
                EnvelopeStage::Decay
            } else {
                EnvelopeStage::Sustain
            };
            self.last_stage = stage;
            return (self.level_before_release(frame), stage);
        }

        let release_start = *self
            .release_start_level
            .get_or_insert_with(|| self.level_before_release(self.gate_end_frame));

        let release_elapsed = frame - self.gate_end_frame;
        if self.params.release_frames == 0 || release_elapsed >= self.params.release_frames {
            self.last_stage = EnvelopeStage::Dead;
            return (0.0, EnvelopeStage::Dead);
        }

        let t = release_elapsed as f64 / self.params.release_frames as f64;
        self.last_stage = EnvelopeStage::Release;
        (release_start * (1.0 - t), EnvelopeStage::Release)
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.last_stage
    }

    /// Whether the voice is fully finished: release elapsed AND (checked by
    /// the caller) the rendered block's magnitude is below the silence floor.
    pub fn release_complete(&self, frame: u64) -> bool {
        frame >= self.gate_end_frame + self.params.release_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> AdsrFrames {
        AdsrFrames {
            attack_frames: 100,
            decay_frames: 100,
            sustain_level: 0.5,
            release_frames: 200,
        }
    }

    #[test]
    fn test_attack_ramps_zero_to_one() {
        let mut env = Envelope::new(params(), 0, 1000);
        let (v0, s0) = env.value_at(0);
        assert_eq!(v0, 0.0);
        assert_eq!(s0, EnvelopeStage::Attack);

        let (v50, _) = env.value_at(50);
        assert!((v50 - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_decay_reaches_sustain() {
        let mut env = Envelope::new(params(), 0, 1000);
        let (v, s) = env.value_at(200);
        assert_eq!(s, EnvelopeStage::Sustain);
        assert!((v - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_release_ramps_from_gate_close_level_to_zero() {
        let mut env = Envelope::new(params(), 0, 150);
        // At gate close (frame 150) we're mid-decay.
        let (_, stage_before) = env.value_at(149);
        assert_eq!(stage_before, EnvelopeStage::Decay);

        let (v_at_release_start, stage) = env.value_at(150);
        assert_eq!(stage, EnvelopeStage::Release);
        assert!(v_at_release_start > 0.0);

        let (v_mid, _) = env.value_at(250);
        assert!(v_mid < v_at_release_start);

        let (v_end, stage_end) = env.value_at(350);
        assert_eq!(stage_end, EnvelopeStage::Dead);
        assert_eq!(v_end, 0.0);
    }

    #[test]
    fn test_release_complete_detection() {
        let env = Envelope::new(params(), 0, 150);
        assert!(!env.release_complete(300));
        assert!(env.release_complete(350));
    }

    #[test]
    fn test_zero_attack_jumps_to_full() {
        let mut p = params();
        p.attack_frames = 0;
        let mut env = Envelope::new(p, 0, 1000);
        let (v, stage) = env.value_at(0);
        assert_eq!(v, 1.0);
        assert_eq!(stage, EnvelopeStage::Decay);
    }
}
