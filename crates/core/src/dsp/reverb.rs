//! Small Schroeder-style reverb tail for an orbit's room send.
//!
//! Parallel comb filters feeding series allpass stages, sized for a send
//! effect rather than a mastering-grade reverb.

struct Comb {
    buffer: Vec<f64>,
    pos: usize,
    feedback: f64,
}

impl Comb {
    fn new(delay_frames: usize, feedback: f64) -> Self {
        Self {
            buffer: vec![0.0; delay_frames.max(1)],
            pos: 0,
            feedback,
        }
    }

    fn process(&mut self, input: f64) -> f64 {
        let out = self.buffer[self.pos];
        self.buffer[self.pos] = input + out * self.feedback;
        self.pos = (self.pos + 1) % self.buffer.len();
        out
    }
}

struct Allpass {
    buffer: Vec<f64>,
    pos: usize,
    feedback: f64,
}

impl Allpass {
    fn new(delay_frames: usize, feedback: f64) -> Self {
        Self {
            buffer: vec![0.0; delay_frames.max(1)],
            pos: 0,
            feedback,
        }
    }

    fn process(&mut self, input: f64) -> f64 {
        let buffered = self.buffer[self.pos];
        let out = -input * self.feedback + buffered;
        self.buffer[self.pos] = input + buffered * self.feedback;
        self.pos = (self.pos + 1) % self.buffer.len();
        out
    }
}

pub struct Reverb {
    combs: Vec<Comb>,
    allpasses: Vec<Allpass>,
}

impl Reverb {
    /// `roomsize` scales comb delay lengths in `[0.5, 2.0]`-ish; `sample_rate`
    /// is used to size the delay lines in frames.
    pub fn new(sample_rate: f64, roomsize: f64) -> Self {
        let scale = roomsize.clamp(0.1, 4.0);
        let comb_delays_ms = [29.7, 37.1, 41.1, 43.7];
        let combs = comb_delays_ms
            .iter()
            .map(|ms| {
                let frames = ((ms * scale / 1000.0) * sample_rate) as usize;
                Comb::new(frames, 0.84)
            })
            .collect();

        let allpass_delays_ms = [5.0, 1.7];
        let allpasses = allpass_delays_ms
            .iter()
            .map(|ms| Allpass::new(((ms / 1000.0) * sample_rate) as usize, 0.5))
            .collect();

        Self { combs, allpasses }
    }

    pub fn process(&mut self, input: f64) -> f64 {
        let comb_sum: f64 = self.combs.iter_mut().map(|c| c.process(input)).sum();
        let mut x = comb_sum / self.combs.len().max(1) as f64;
        for ap in self.allpasses.iter_mut() {
            x = ap.process(x);
        }
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverb_produces_finite_tail() {
        let mut reverb = Reverb::new(48000.0, 1.0);
        let mut tail_energy = 0.0;
        for i in 0..2000 {
            let input = if i == 0 { 1.0 } else { 0.0 };
            let out = reverb.process(input);
            assert!(out.is_finite());
            if i > 100 {
                tail_energy += out.abs();
            }
        }
        assert!(tail_energy > 0.0);
    }

    #[test]
    fn test_reverb_silence_in_silence_out_eventually_decays() {
        let mut reverb = Reverb::new(48000.0, 1.0);
        reverb.process(1.0);
        let mut last = 1.0f64;
        for _ in 0..10000 {
            last = reverb.process(0.0);
        }
        assert!(last.abs() < 0.1);
    }
}
