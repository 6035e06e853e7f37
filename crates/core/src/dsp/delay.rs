//! Feedback delay line used for each orbit's delay send.

pub struct DelayLine {
    buffer: Vec<f64>,
    write_pos: usize,
}

impl DelayLine {
    pub fn new(max_delay_frames: usize) -> Self {
        Self {
            buffer: vec![0.0; max_delay_frames.max(1)],
            write_pos: 0,
        }
    }

    /// Read-then-write one sample through the line, feeding `feedback` of the
    /// delayed output back into the write, and returning the wet sample.
    pub fn process(&mut self, input: f64, delay_frames: usize, feedback: f64) -> f64 {
        let len = self.buffer.len();
        let delay_frames = delay_frames.min(len.saturating_sub(1)).max(1);
        let read_pos = (self.write_pos + len - delay_frames) % len;
        let delayed = self.buffer[read_pos];

        let feedback = feedback.clamp(0.0, 0.98);
        self.buffer[self.write_pos] = input + delayed * feedback;
        self.write_pos = (self.write_pos + 1) % len;

        delayed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_returns_input_after_n_frames() {
        let mut line = DelayLine::new(8);
        let out0 = line.process(1.0, 4, 0.0);
        assert_eq!(out0, 0.0);

        for _ in 0..3 {
            line.process(0.0, 4, 0.0);
        }
        let out4 = line.process(0.0, 4, 0.0);
        assert_eq!(out4, 1.0);
    }

    #[test]
    fn test_feedback_sustains_echoes() {
        let mut line = DelayLine::new(4);
        line.process(1.0, 4, 0.5);
        for _ in 0..3 {
            line.process(0.0, 4, 0.5);
        }
        let echo = line.process(0.0, 4, 0.5);
        assert!(echo > 0.0 && echo < 1.0);
    }
}
