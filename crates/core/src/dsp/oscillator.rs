//! Block-rendering oscillators and the name → oscillator factory.
//!
//! Each oscillator is a plain function `(buf, offset, length, phase, phaseInc,
//! phaseMod) -> newPhase`: it fills `length` samples of `buf` starting at
//! `offset`, advancing a running phase accumulator by `phaseInc` each sample
//! (plus the corresponding entry of `phaseMod`, a per-sample phase offset
//! computed upstream from vibrato/FM/pitch-envelope), and returns the phase
//! to resume from on the next block. This mirrors the phase-accumulator
//! shape of a classic analog-modeled oscillator, just without a wavetable:
//! no lookup-table data is carried here, so these compute their waveforms
//! directly.

use std::sync::Arc;

/// `(buf, offset, length, phase, phase_inc, phase_mod) -> new_phase`
pub type OscillatorFn =
    Arc<dyn Fn(&mut [f64], usize, usize, f64, f64, &[f64]) -> f64 + Send + Sync>;

const TWO_PI: f64 = std::f64::consts::TAU;

fn wrap_phase(p: f64) -> f64 {
    let w = p % 1.0;
    if w < 0.0 { w + 1.0 } else { w }
}

pub fn sine(buf: &mut [f64], offset: usize, length: usize, phase: f64, phase_inc: f64, phase_mod: &[f64]) -> f64 {
    let mut p = phase;
    for i in 0..length {
        let m = phase_mod.get(i).copied().unwrap_or(0.0);
        buf[offset + i] = (TWO_PI * wrap_phase(p + m)).sin();
        p = wrap_phase(p + phase_inc);
    }
    p
}

pub fn saw(buf: &mut [f64], offset: usize, length: usize, phase: f64, phase_inc: f64, phase_mod: &[f64]) -> f64 {
    let mut p = phase;
    for i in 0..length {
        let m = phase_mod.get(i).copied().unwrap_or(0.0);
        buf[offset + i] = 2.0 * wrap_phase(p + m) - 1.0;
        p = wrap_phase(p + phase_inc);
    }
    p
}

pub fn square(buf: &mut [f64], offset: usize, length: usize, phase: f64, phase_inc: f64, phase_mod: &[f64]) -> f64 {
    let mut p = phase;
    for i in 0..length {
        let m = phase_mod.get(i).copied().unwrap_or(0.0);
        buf[offset + i] = if wrap_phase(p + m) < 0.5 { 1.0 } else { -1.0 };
        p = wrap_phase(p + phase_inc);
    }
    p
}

pub fn triangle(buf: &mut [f64], offset: usize, length: usize, phase: f64, phase_inc: f64, phase_mod: &[f64]) -> f64 {
    let mut p = phase;
    for i in 0..length {
        let m = phase_mod.get(i).copied().unwrap_or(0.0);
        let x = wrap_phase(p + m);
        buf[offset + i] = 4.0 * (x - 0.5).abs() - 1.0;
        p = wrap_phase(p + phase_inc);
    }
    p
}

/// Detuned unison saw stack, spread across the stereo-adjacent-ish detune range.
/// `unison` voices spaced by `detune` cents, weighted down as `unison` grows so
/// overall level stays roughly constant.
pub fn supersaw(
    buf: &mut [f64],
    offset: usize,
    length: usize,
    phase: f64,
    phase_inc: f64,
    phase_mod: &[f64],
    unison: u32,
    detune_cents: f64,
) -> f64 {
    let voices = unison.max(1);
    let gain = 1.0 / (voices as f64).sqrt();
    let mut phases: Vec<f64> = (0..voices)
        .map(|v| {
            let spread = if voices > 1 {
                (v as f64 / (voices as f64 - 1.0)) * 2.0 - 1.0
            } else {
                0.0
            };
            wrap_phase(phase + spread * 0.137 * (v as f64 + 1.0).fract())
        })
        .collect();

    for i in 0..length {
        let m = phase_mod.get(i).copied().unwrap_or(0.0);
        let mut sample = 0.0;
        for (v, p) in phases.iter_mut().enumerate() {
            let spread = if voices > 1 {
                (v as f64 / (voices as f64 - 1.0)) * 2.0 - 1.0
            } else {
                0.0
            };
            let detune_ratio = 2f64.powf(spread * detune_cents / 1200.0);
            sample += 2.0 * wrap_phase(*p + m) - 1.0;
            *p = wrap_phase(*p + phase_inc * detune_ratio);
        }
        buf[offset + i] = sample * gain;
    }

    phases[0]
}

/// Deterministic per-sample white noise, seeded from the running phase bits
/// rather than a process-global RNG so rendering stays reproducible block to
/// block for a given starting phase.
pub fn noise(buf: &mut [f64], offset: usize, length: usize, phase: f64, phase_inc: f64, _phase_mod: &[f64]) -> f64 {
    let mut state = (phase.to_bits()) ^ 0x9E3779B97F4A7C15;
    for i in 0..length {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let unit = (state >> 11) as f64 / (1u64 << 53) as f64;
        buf[offset + i] = unit * 2.0 - 1.0;
    }
    wrap_phase(phase + phase_inc * length as f64)
}

/// Randomly re-triggered impulses ("dust"): each sample has a small chance of
/// firing a unit impulse, with expected density following `phase_inc`.
pub fn dust(buf: &mut [f64], offset: usize, length: usize, phase: f64, phase_inc: f64, _phase_mod: &[f64]) -> f64 {
    let mut state = (phase.to_bits()) ^ 0xD1B54A32D192ED03;
    for i in 0..length {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let unit = (state >> 11) as f64 / (1u64 << 53) as f64;
        buf[offset + i] = if unit < phase_inc { 1.0 } else { 0.0 };
    }
    phase
}

/// Resolve an oscillator by the name used in `VoiceData.sound`. `unison`,
/// `detune`, `spread` only affect `supersaw`; other oscillators ignore them.
pub fn get_oscillator(
    name: &str,
    unison: u32,
    detune_cents: f64,
) -> Option<OscillatorFn> {
    match name {
        "sine" => Some(Arc::new(sine)),
        "saw" => Some(Arc::new(saw)),
        "square" => Some(Arc::new(square)),
        "triangle" => Some(Arc::new(triangle)),
        "noise" => Some(Arc::new(noise)),
        "dust" => Some(Arc::new(dust)),
        "supersaw" => Some(Arc::new(move |buf, off, len, phase, inc, pm| {
            supersaw(buf, off, len, phase, inc, pm, unison, detune_cents)
        })),
        _ => None,
    }
}

/// Names recognized by [`get_oscillator`], for validation/diagnostics.
pub fn oscillator_names() -> &'static [&'static str] {
    &["sine", "saw", "square", "triangle", "supersaw", "noise", "dust"]
}

/// Compute the phase increment for a given output frequency.
pub fn phase_inc_for_freq(freq_hz: f64, sample_rate: f64) -> f64 {
    freq_hz / sample_rate
}

/// Map a note number (semitones from a reference) plus an optional scale
/// degree table into a frequency in Hz, A440 12-TET.
pub fn note_to_freq(note: f64) -> f64 {
    440.0 * 2f64.powf((note - 69.0) / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_phase_continuity() {
        let mut buf = vec![0.0; 8];
        let phase_mod = vec![0.0; 8];
        let new_phase = sine(&mut buf, 0, 8, 0.0, 0.125, &phase_mod);
        assert!((new_phase - 0.0).abs() < 1e-9 || (new_phase - 1.0).abs() < 1e-9);
        assert!((buf[0]).abs() < 1e-9);
    }

    #[test]
    fn test_saw_ramps_from_minus_one_to_one() {
        let mut buf = vec![0.0; 4];
        let phase_mod = vec![0.0; 4];
        saw(&mut buf, 0, 4, 0.0, 0.25, &phase_mod);
        assert!((buf[0] - (-1.0)).abs() < 1e-9);
        assert!(buf[3] > buf[0]);
    }

    #[test]
    fn test_square_duty_cycle() {
        let mut buf = vec![0.0; 4];
        let phase_mod = vec![0.0; 4];
        square(&mut buf, 0, 4, 0.0, 0.25, &phase_mod);
        assert_eq!(buf[0], 1.0);
        assert_eq!(buf[2], -1.0);
    }

    #[test]
    fn test_get_oscillator_known_and_unknown() {
        assert!(get_oscillator("sine", 1, 0.0).is_some());
        assert!(get_oscillator("unknown-sound", 1, 0.0).is_none());
    }

    #[test]
    fn test_noise_is_bounded() {
        let mut buf = vec![0.0; 256];
        let phase_mod = vec![0.0; 256];
        noise(&mut buf, 0, 256, 0.42, 0.01, &phase_mod);
        assert!(buf.iter().all(|&s| s >= -1.0 && s <= 1.0));
    }

    #[test]
    fn test_note_to_freq_a440() {
        assert!((note_to_freq(69.0) - 440.0).abs() < 1e-6);
    }
}
