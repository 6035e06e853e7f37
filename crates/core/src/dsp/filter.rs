//! Biquad filters, RBJ cookbook coefficients, direct-Hz cutoff.
//!
//! An earlier filter stage derived cutoff from a 1V/octave control
//! (`55.0 * 2^cutoff`); voice data here carries cutoff directly in Hz, so
//! the coefficient math is adapted to take `cutoff_hz` straight through.

use crate::voice_data::FilterDef;

#[derive(Clone, Copy, Debug, Default)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    pub fn process(&mut self, coeffs: &BiquadCoeffs, input: f64) -> f64 {
        let y = coeffs.b0 * input + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
            - coeffs.a1 * self.y1
            - coeffs.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = y;
        crate::dsp::utils::flush_denormal(y)
    }
}

/// RBJ cookbook biquad coefficients for a lowpass/highpass/bandpass filter.
pub fn compute_biquad(kind: &FilterDef, cutoff_hz: f64, resonance: f64, sample_rate: f64) -> BiquadCoeffs {
    let cutoff_hz = cutoff_hz.clamp(20.0, sample_rate * 0.49);
    let q = resonance.max(0.1);
    let omega = std::f64::consts::TAU * cutoff_hz / sample_rate;
    let sin_w = omega.sin();
    let cos_w = omega.cos();
    let alpha = sin_w / (2.0 * q);

    let (b0, b1, b2, a0, a1, a2) = match kind {
        FilterDef::Lowpass => {
            let b1 = 1.0 - cos_w;
            let b0 = b1 / 2.0;
            let b2 = b0;
            (b0, b1, b2, 1.0 + alpha, -2.0 * cos_w, 1.0 - alpha)
        }
        FilterDef::Highpass => {
            let b0 = (1.0 + cos_w) / 2.0;
            let b1 = -(1.0 + cos_w);
            let b2 = b0;
            (b0, b1, b2, 1.0 + alpha, -2.0 * cos_w, 1.0 - alpha)
        }
        FilterDef::Bandpass => {
            let b0 = alpha;
            let b1 = 0.0;
            let b2 = -alpha;
            (b0, b1, b2, 1.0 + alpha, -2.0 * cos_w, 1.0 - alpha)
        }
    };

    BiquadCoeffs {
        b0: b0 / a0,
        b1: b1 / a0,
        b2: b2 / a0,
        a1: a1 / a0,
        a2: a2 / a0,
    }
}

/// A voice's ordered filter chain: one state + coefficient pair per stage.
#[derive(Clone, Debug, Default)]
pub struct FilterChain {
    stages: Vec<(FilterDef, BiquadState)>,
}

impl FilterChain {
    pub fn new(defs: &[FilterDef]) -> Self {
        Self {
            stages: defs.iter().map(|d| (d.clone(), BiquadState::default())).collect(),
        }
    }

    pub fn process_sample(&mut self, input: f64, cutoff_hz: f64, hcutoff_hz: f64, resonance: f64, sample_rate: f64) -> f64 {
        let mut x = input;
        for (kind, state) in self.stages.iter_mut() {
            let cutoff = match kind {
                FilterDef::Highpass => hcutoff_hz,
                _ => cutoff_hz,
            };
            let coeffs = compute_biquad(kind, cutoff, resonance, sample_rate);
            x = state.process(&coeffs, x);
        }
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowpass_attenuates_high_frequency() {
        let sample_rate = 48000.0;
        let coeffs = compute_biquad(&FilterDef::Lowpass, 200.0, 0.707, sample_rate);
        let mut state = BiquadState::default();

        // Feed a high frequency sine (10 kHz) and measure settled amplitude.
        let freq = 10_000.0;
        let mut max_amp: f64 = 0.0;
        for i in 0..2000 {
            let t = i as f64 / sample_rate;
            let input = (std::f64::consts::TAU * freq * t).sin();
            let out = state.process(&coeffs, input);
            if i > 1000 {
                max_amp = max_amp.max(out.abs());
            }
        }
        assert!(max_amp < 0.3, "expected strong attenuation, got {max_amp}");
    }

    #[test]
    fn test_lowpass_passes_low_frequency() {
        let sample_rate = 48000.0;
        let coeffs = compute_biquad(&FilterDef::Lowpass, 5000.0, 0.707, sample_rate);
        let mut state = BiquadState::default();

        let freq = 100.0;
        let mut max_amp: f64 = 0.0;
        for i in 0..2000 {
            let t = i as f64 / sample_rate;
            let input = (std::f64::consts::TAU * freq * t).sin();
            let out = state.process(&coeffs, input);
            if i > 1000 {
                max_amp = max_amp.max(out.abs());
            }
        }
        assert!(max_amp > 0.7, "expected low frequency to pass, got {max_amp}");
    }

    #[test]
    fn test_filter_chain_empty_is_passthrough() {
        let mut chain = FilterChain::new(&[]);
        let out = chain.process_sample(0.42, 1000.0, 1000.0, 0.7, 48000.0);
        assert_eq!(out, 0.42);
    }
}
