//! Per-voice pre/post effects: bit-crush, sample-rate reduction, distortion,
//! phaser, tremolo.
//!
//! Floating-point implementations of amplitude quantization and tanh
//! saturation; no fixed-point lookup tables involved.

/// Quantize amplitude to `bits` of resolution, `bits` in (0, 16].
pub fn bitcrush(input: f64, bits: f64) -> f64 {
    let bits = bits.clamp(1.0, 16.0);
    let levels = 2f64.powf(bits);
    (input * levels).round() / levels
}

/// Hold each input sample for `factor` consecutive output samples
/// (sample-and-hold style sample-rate reduction).
#[derive(Clone, Copy, Debug, Default)]
pub struct SampleRateReducer {
    held: f64,
    counter: u32,
}

impl SampleRateReducer {
    pub fn process(&mut self, input: f64, hold_frames: u32) -> f64 {
        let hold_frames = hold_frames.max(1);
        if self.counter == 0 {
            self.held = input;
        }
        self.counter = (self.counter + 1) % hold_frames;
        self.held
    }
}

/// Tanh saturation with pre-gain; `amount` in `[0, 1]` maps to pre-gain `[1, 20]`.
pub fn distortion(input: f64, amount: f64) -> f64 {
    let pre_gain = 1.0 + amount.clamp(0.0, 1.0) * 19.0;
    (input * pre_gain).tanh()
}

/// A simple 4-stage allpass phaser.
#[derive(Clone, Copy, Debug, Default)]
pub struct Phaser {
    stages: [f64; 4],
}

impl Phaser {
    pub fn process(&mut self, input: f64, coefficient: f64) -> f64 {
        let mut x = input;
        for stage in self.stages.iter_mut() {
            let y = -coefficient * x + *stage;
            *stage = x + coefficient * y;
            x = y;
        }
        (input + x) * 0.5
    }
}

/// Amplitude tremolo: sine LFO modulating gain around unity.
#[derive(Clone, Copy, Debug, Default)]
pub struct Tremolo {
    phase: f64,
}

impl Tremolo {
    pub fn process(&mut self, input: f64, rate_hz: f64, depth: f64, sample_rate: f64) -> f64 {
        let depth = depth.clamp(0.0, 1.0);
        let lfo = (std::f64::consts::TAU * self.phase).sin();
        self.phase += rate_hz / sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        let gain = 1.0 - depth * 0.5 * (1.0 - lfo);
        input * gain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitcrush_snaps_to_grid() {
        let a = bitcrush(0.501, 1.0);
        let b = bitcrush(0.499, 1.0);
        // 1-bit crush: only two levels (-1 and ~1), values on either side of
        // 0.5 should land on the same level above the midpoint.
        assert_eq!(a, b);
    }

    #[test]
    fn test_sample_rate_reducer_holds_value() {
        let mut reducer = SampleRateReducer::default();
        let a = reducer.process(1.0, 4);
        let b = reducer.process(2.0, 4);
        let c = reducer.process(3.0, 4);
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_distortion_is_bounded() {
        let out = distortion(10.0, 1.0);
        assert!(out <= 1.0 && out >= -1.0);
    }

    #[test]
    fn test_distortion_zero_amount_near_identity() {
        let out = distortion(0.1, 0.0);
        assert!((out - 0.1.tanh()).abs() < 1e-9);
    }

    #[test]
    fn test_tremolo_modulates_gain() {
        let mut trem = Tremolo::default();
        let mut outputs = Vec::new();
        for _ in 0..200 {
            outputs.push(trem.process(1.0, 5.0, 1.0, 48000.0));
        }
        let max = outputs.iter().cloned().fold(f64::MIN, f64::max);
        let min = outputs.iter().cloned().fold(f64::MAX, f64::min);
        assert!(max > min);
    }

    #[test]
    fn test_phaser_is_stable() {
        let mut phaser = Phaser::default();
        for i in 0..1000 {
            let input = if i % 2 == 0 { 1.0 } else { -1.0 };
            let out = phaser.process(input, 0.5);
            assert!(out.is_finite());
        }
    }
}
