//! Per-voice rendering pipeline: modulation, source, pre-filters,
//! main filter, VCA envelope, post-effects, pan/mix to an orbit bus.
//!
//! Follows the oscillator block render -> filter -> envelope -> mix shape
//! of `modular/src/audio.rs`, entirely delegating the actual DSP math to
//! `engine_core::dsp`, which already carries the oscillator/filter/envelope/
//! effects primitives.

use engine_core::VoiceData;
use engine_core::dsp::effects::{Phaser, SampleRateReducer, Tremolo, bitcrush, distortion};
use engine_core::dsp::envelope::{AdsrFrames, Envelope, EnvelopeStage};
use engine_core::dsp::filter::FilterChain;
use engine_core::dsp::oscillator::{get_oscillator, note_to_freq, phase_inc_for_freq};
use engine_core::dsp::utils::{equal_power_pan, flush_denormal};
use std::sync::Arc;

use crate::orbits::Orbit;
use crate::sample::{PlaybackId, Pcm};

const SILENCE_FLOOR: f64 = 1e-4;

enum Source {
    Synth {
        oscillator: engine_core::dsp::oscillator::OscillatorFn,
        phase: f64,
        freq_hz: f64,
        fm_oscillator: Option<engine_core::dsp::oscillator::OscillatorFn>,
        fm_phase: f64,
    },
    Sample {
        pcm: Arc<[f32]>,
        pcm_sample_rate: f64,
        playhead: f64,
        rate: f64,
    },
}

/// One currently-rendering voice. Constructed at promotion time by the
/// voice scheduler once a sample voice's PCM (if any) has resolved.
pub struct Voice {
    pub playback_id: PlaybackId,
    data: VoiceData,
    source: Source,
    envelope: Envelope,
    filters: FilterChain,
    crusher: SampleRateReducer,
    phaser: Phaser,
    tremolo: Tremolo,
    start_frame: u64,
    gate_end_frame: u64,
    vibrato_phase: f64,
    pitch_env: Envelope,
}

/// Why a voice couldn't be constructed at promotion time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceBuildError {
    UnknownOscillator,
    SampleNotLoaded,
}

fn adsr_frames(data: &VoiceData, sample_rate: f64) -> AdsrFrames {
    let to_frames = |secs: Option<f64>, default: f64| -> u64 {
        (secs.unwrap_or(default) * sample_rate).max(0.0) as u64
    };
    AdsrFrames {
        attack_frames: to_frames(data.attack, 0.01),
        decay_frames: to_frames(data.decay, 0.05),
        sustain_level: data.sustain.unwrap_or(1.0).clamp(0.0, 1.0),
        release_frames: to_frames(data.release, 0.05),
    }
}

impl Voice {
    /// Build a voice for a just-promoted scheduled entry.
    ///
    /// `sample`: resolved PCM for a sample voice, looked up by the scheduler
    /// from its sample registry; `None` for a synth voice, or `Some` for a
    /// sample voice whose sample hasn't resolved (caller should not call
    /// this until it has -- see [`VoiceBuildError::SampleNotLoaded`]).
    pub fn new(
        playback_id: PlaybackId,
        data: VoiceData,
        start_frame: u64,
        gate_end_frame: u64,
        sample_rate: f64,
        sample: Option<&Pcm>,
    ) -> Result<Self, VoiceBuildError> {
        let envelope = Envelope::new(adsr_frames(&data, sample_rate), start_frame, gate_end_frame);
        let pitch_env_frames = AdsrFrames {
            attack_frames: (data.attack.unwrap_or(0.01) * sample_rate) as u64,
            decay_frames: (data.decay.unwrap_or(0.05) * sample_rate) as u64,
            sustain_level: 0.0,
            release_frames: (data.release.unwrap_or(0.05) * sample_rate) as u64,
        };
        let pitch_env = Envelope::new(pitch_env_frames, start_frame, gate_end_frame);

        let source = if let Some(sound) = data.sound.as_deref() {
            if let Some(pcm) = sample {
                let target_hz = note_to_freq(data.note.unwrap_or(60.0));
                let pitch_ratio = (target_hz / pcm.pitch_hz.max(1e-6)).clamp(0.125, 8.0);
                let rate = (pcm.sample_rate as f64 / sample_rate) * pitch_ratio;
                Source::Sample {
                    pcm: pcm.samples.clone(),
                    pcm_sample_rate: pcm.sample_rate as f64,
                    playhead: 0.0,
                    rate,
                }
            } else if let Some(oscillator) = get_oscillator(sound, data.unison.unwrap_or(1), data.detune.unwrap_or(10.0)) {
                let freq_hz = note_to_freq(data.note.unwrap_or(60.0));
                let fm_oscillator = if data.fm_h.is_some() {
                    get_oscillator("sine", 1, 0.0)
                } else {
                    None
                };
                Source::Synth {
                    oscillator,
                    phase: 0.0,
                    freq_hz,
                    fm_oscillator,
                    fm_phase: 0.0,
                }
            } else {
                return Err(VoiceBuildError::SampleNotLoaded);
            }
        } else {
            return Err(VoiceBuildError::UnknownOscillator);
        };

        Ok(Self {
            playback_id,
            filters: FilterChain::new(&data.filters),
            data,
            source,
            envelope,
            crusher: SampleRateReducer::default(),
            phaser: Phaser::default(),
            tremolo: Tremolo::default(),
            start_frame,
            gate_end_frame,
            vibrato_phase: 0.0,
            pitch_env,
        })
    }

    pub fn orbit_id(&self) -> u32 {
        self.data.orbit.unwrap_or(0)
    }

    /// Render `block_frames` samples starting at `cursor_frame`, mixing the
    /// result into `orbit`'s buses. Returns `true` once the voice is fully
    /// finished (release complete AND the rendered block was silent).
    pub fn render(&mut self, cursor_frame: u64, block_frames: usize, sample_rate: f64, orbit: &mut Orbit) -> bool {
        let mut modulation = vec![0.0f64; block_frames];
        self.compute_modulation(cursor_frame, block_frames, sample_rate, &mut modulation);

        let mut source_buf = vec![0.0f64; block_frames];
        self.generate_source(cursor_frame, block_frames, sample_rate, &modulation, &mut source_buf);

        let gain = self.data.gain.unwrap_or(1.0);
        let (pan_l, pan_r) = equal_power_pan(self.data.pan.unwrap_or(0.5) * 0.5 + 0.5);
        let delay_send = self.data.delay.unwrap_or(0.0);
        let reverb_send = self.data.room.unwrap_or(0.0);
        let cutoff_hz = self.data.cutoff.unwrap_or(sample_rate / 2.0 - 1.0);
        let hcutoff_hz = self.data.hcutoff.unwrap_or(20.0);
        let resonance = self.data.resonance.unwrap_or(0.707);

        let mut max_abs = 0.0f64;
        for i in 0..block_frames {
            let frame = cursor_frame + i as u64;
            let mut x = source_buf[i];

            if let Some(bits) = self.data.crush {
                x = bitcrush(x, bits);
            }
            if let Some(coarse) = self.data.coarse {
                x = self.crusher.process(x, coarse.max(1.0) as u32);
            }

            x = self.filters.process_sample(x, cutoff_hz, hcutoff_hz, resonance, sample_rate);

            let (env_level, _stage) = self.envelope.value_at(frame);
            x *= env_level;

            if let Some(amount) = self.data.distort {
                x = distortion(x, amount);
            }
            x = self.phaser.process(x, self.data.detune.unwrap_or(0.0).clamp(-0.9, 0.9).abs().min(0.9));
            if self.data.vibrato_mod.is_some() {
                x = self.tremolo.process(x, self.data.vibrato.unwrap_or(5.0), 0.1, sample_rate);
            }

            x = flush_denormal(x) * gain;
            max_abs = max_abs.max(x.abs());

            orbit.mix_buffer.0[i] += x * pan_l;
            orbit.mix_buffer.1[i] += x * pan_r;
            if delay_send > 0.0 {
                orbit.delay_send[i] += x * delay_send;
            }
            if reverb_send > 0.0 {
                orbit.reverb_send[i] += x * reverb_send;
            }
        }

        if delay_send > 0.0 {
            if let Some(delay_time_sec) = self.data.delay_time {
                let feedback = self.data.delay_feedback.unwrap_or(0.35);
                orbit.set_delay_config((delay_time_sec * sample_rate) as usize, feedback);
            }
        }

        if let Some(source_orbit) = self.data.duck_orbit {
            orbit.set_duck(crate::orbits::DuckConfig {
                source_orbit: Some(source_orbit),
                attack_sec: self.data.duck_attack.unwrap_or(0.1),
                depth: self.data.duck_depth.unwrap_or(0.5),
            });
        }

        let last_frame = cursor_frame + block_frames as u64;
        self.envelope.release_complete(last_frame) && max_abs < SILENCE_FLOOR
    }

    fn compute_modulation(&mut self, cursor_frame: u64, block_frames: usize, sample_rate: f64, out: &mut [f64]) {
        let vibrato_rate = self.data.vibrato.unwrap_or(0.0);
        let vibrato_depth_semitones = self.data.vibrato_mod.unwrap_or(0.0) / 12.0;
        let accelerate = self.data.accelerate.unwrap_or(0.0);
        let pitch_env_amount = self.data.pitch_env.unwrap_or(0.0);

        for i in 0..block_frames {
            let frame = cursor_frame + i as u64;
            let elapsed_s = frame.saturating_sub(self.start_frame) as f64 / sample_rate;

            let vibrato = if vibrato_rate > 0.0 {
                let lfo = (std::f64::consts::TAU * self.vibrato_phase).sin();
                self.vibrato_phase += vibrato_rate / sample_rate;
                if self.vibrato_phase >= 1.0 {
                    self.vibrato_phase -= 1.0;
                }
                lfo * vibrato_depth_semitones / 12.0
            } else {
                0.0
            };

            let accel = accelerate * elapsed_s;

            let (env_level, _) = self.pitch_env.value_at(frame);
            let pitch_env = env_level * pitch_env_amount;

            out[i] = vibrato + accel + pitch_env;
        }
    }

    fn generate_source(&mut self, cursor_frame: u64, block_frames: usize, sample_rate: f64, modulation: &[f64], out: &mut [f64]) {
        match &mut self.source {
            Source::Synth { oscillator, phase, freq_hz, fm_oscillator, fm_phase } => {
                let mut combined_mod = modulation.to_vec();
                if let Some(fm_osc) = fm_oscillator {
                    let fm_h = self.data.fm_h.unwrap_or(1.0);
                    let fm_depth = self.data.fm_env.unwrap_or(0.0);
                    if fm_depth > 0.0 {
                        let mut fm_buf = vec![0.0; block_frames];
                        let fm_phase_inc = phase_inc_for_freq(*freq_hz * fm_h, sample_rate);
                        *fm_phase = fm_osc(&mut fm_buf, 0, block_frames, *fm_phase, fm_phase_inc, &[]);
                        for (m, fm) in combined_mod.iter_mut().zip(fm_buf.iter()) {
                            *m += fm * fm_depth;
                        }
                    }
                }
                let phase_inc = phase_inc_for_freq(*freq_hz, sample_rate);
                *phase = oscillator(out, 0, block_frames, *phase, phase_inc, &combined_mod);
            }
            Source::Sample { pcm, pcm_sample_rate, playhead, rate } => {
                let _ = (cursor_frame, pcm_sample_rate);
                for (i, slot) in out.iter_mut().enumerate() {
                    let mod_scale = 1.0 + modulation.get(i).copied().unwrap_or(0.0);
                    let idx = *playhead;
                    let i0 = idx.floor() as isize;
                    let frac = idx - i0 as f64;
                    let sample_at = |idx: isize| -> f64 {
                        if idx < 0 || idx as usize >= pcm.len() {
                            0.0
                        } else {
                            pcm[idx as usize] as f64
                        }
                    };
                    let s0 = sample_at(i0);
                    let s1 = sample_at(i0 + 1);
                    *slot = s0 + (s1 - s0) * frac;
                    *playhead += *rate * mod_scale;
                }
            }
        }
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.envelope.stage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orbits::Orbit;

    fn synth_voice(sample_rate: f64) -> Voice {
        let data = VoiceData {
            sound: Some("sine".into()),
            note: Some(69.0),
            attack: Some(0.0),
            decay: Some(0.0),
            sustain: Some(1.0),
            release: Some(0.01),
            gain: Some(1.0),
            ..Default::default()
        };
        Voice::new("p1".into(), data, 0, 4410, sample_rate, None).unwrap()
    }

    #[test]
    fn test_synth_voice_renders_nonzero_audio() {
        let sample_rate = 44100.0;
        let mut voice = synth_voice(sample_rate);
        let mut orbit = Orbit::new(0, 64, sample_rate);
        voice.render(0, 64, sample_rate, &mut orbit);
        let energy: f64 = orbit.mix_buffer.0.iter().map(|s| s.abs()).sum();
        assert!(energy > 0.0);
    }

    #[test]
    fn test_voice_dies_after_release_and_silence() {
        let sample_rate = 100.0;
        let data = VoiceData {
            sound: Some("sine".into()),
            note: Some(69.0),
            attack: Some(0.0),
            decay: Some(0.0),
            sustain: Some(0.0),
            release: Some(0.01),
            gain: Some(1.0),
            ..Default::default()
        };
        let mut voice = Voice::new("p1".into(), data, 0, 5, sample_rate, None).unwrap();
        let mut orbit = Orbit::new(0, 16, sample_rate);
        let mut dead = false;
        for block in 0..10 {
            dead = voice.render(block * 16, 16, sample_rate, &mut orbit);
        }
        assert!(dead);
    }

    #[test]
    fn test_unknown_oscillator_fails_to_build() {
        let data = VoiceData {
            sound: Some("not-a-real-sound".into()),
            ..Default::default()
        };
        let result = Voice::new("p1".into(), data, 0, 100, 44100.0, None);
        assert!(matches!(result, Err(VoiceBuildError::SampleNotLoaded)));
    }
}
