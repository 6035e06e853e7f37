//! Orbit mixer: per-group buses with delay/reverb sends, cross-orbit
//! ducking, master mix, and round-robin silence GC.

use engine_core::dsp::delay::DelayLine;
use engine_core::dsp::reverb::Reverb;

pub const DEFAULT_MAX_ORBITS: usize = 16;
pub const HARD_CAP_ORBITS: usize = 32;
const SILENCE_FLOOR: f64 = 1e-4;

/// Default delay send timing, used until a voice addressing the orbit
/// specifies `delayTime`/`delayFeedback` explicitly.
const DEFAULT_DELAY_SEC: f64 = 0.375;
const DEFAULT_DELAY_FEEDBACK: f64 = 0.35;

/// One orbit's duck-source configuration, set by whichever voice last
/// addressed it (mirrors `VoiceData.duck_*`).
#[derive(Clone, Copy, Debug, Default)]
pub struct DuckConfig {
    pub source_orbit: Option<u32>,
    pub attack_sec: f64,
    pub depth: f64,
}

pub struct Orbit {
    pub id: u32,
    pub active: bool,
    pub mix_buffer: (Vec<f64>, Vec<f64>),
    pub delay_send: Vec<f64>,
    pub reverb_send: Vec<f64>,
    delay_line_l: DelayLine,
    delay_line_r: DelayLine,
    reverb_l: Reverb,
    reverb_r: Reverb,
    duck: DuckConfig,
    duck_gain: f64,
    sample_rate: f64,
    delay_time_frames: usize,
    delay_feedback: f64,
}

impl Orbit {
    pub fn new(id: u32, block_frames: usize, sample_rate: f64) -> Self {
        let max_delay_frames = (sample_rate * 2.0) as usize;
        Self {
            id,
            active: false,
            mix_buffer: (vec![0.0; block_frames], vec![0.0; block_frames]),
            delay_send: vec![0.0; block_frames],
            reverb_send: vec![0.0; block_frames],
            delay_line_l: DelayLine::new(max_delay_frames),
            delay_line_r: DelayLine::new(max_delay_frames),
            reverb_l: Reverb::new(sample_rate, 1.0),
            reverb_r: Reverb::new(sample_rate, 1.0),
            duck: DuckConfig::default(),
            duck_gain: 1.0,
            sample_rate,
            delay_time_frames: (DEFAULT_DELAY_SEC * sample_rate) as usize,
            delay_feedback: DEFAULT_DELAY_FEEDBACK,
        }
    }

    /// Set the delay send's time/feedback, as last specified by a voice
    /// addressing this orbit with explicit `delayTime`/`delayFeedback`
    /// (`VoiceData::delay_time`/`delay_feedback`). Persists until another
    /// voice overrides it, mirroring `duck`'s last-writer-wins config.
    pub fn set_delay_config(&mut self, time_frames: usize, feedback: f64) {
        self.delay_time_frames = time_frames.max(1);
        self.delay_feedback = feedback.clamp(0.0, 0.98);
    }

    fn clear(&mut self) {
        for s in self.mix_buffer.0.iter_mut() { *s = 0.0; }
        for s in self.mix_buffer.1.iter_mut() { *s = 0.0; }
        for s in self.delay_send.iter_mut() { *s = 0.0; }
        for s in self.reverb_send.iter_mut() { *s = 0.0; }
    }

    pub fn set_duck(&mut self, duck: DuckConfig) {
        self.duck = duck;
    }

    /// Process delay/reverb sends back into the orbit's mix buffer. Called
    /// once per block, before ducking.
    fn process_inserts(&mut self) {
        for i in 0..self.mix_buffer.0.len() {
            if self.delay_send[i] != 0.0 {
                let wet_l = self.delay_line_l.process(self.delay_send[i], self.delay_time_frames, self.delay_feedback);
                let wet_r = self.delay_line_r.process(self.delay_send[i], self.delay_time_frames, self.delay_feedback);
                self.mix_buffer.0[i] += wet_l;
                self.mix_buffer.1[i] += wet_r;
            }
            if self.reverb_send[i] != 0.0 {
                self.mix_buffer.0[i] += self.reverb_l.process(self.reverb_send[i]);
                self.mix_buffer.1[i] += self.reverb_r.process(self.reverb_send[i]);
            }
        }
    }

    fn is_silent(&self) -> bool {
        self.mix_buffer.0.iter().chain(self.mix_buffer.1.iter()).all(|s| s.abs() < SILENCE_FLOOR)
    }
}

/// Owns every allocated orbit and the master mix/silence-GC bookkeeping.
pub struct OrbitMixer {
    orbits: Vec<Option<Orbit>>,
    max_orbits: usize,
    block_frames: usize,
    sample_rate: f64,
    cleanup_index: usize,
}

impl OrbitMixer {
    pub fn new(block_frames: usize, sample_rate: f64, max_orbits: usize) -> Self {
        let max_orbits = max_orbits.min(HARD_CAP_ORBITS).max(1);
        Self {
            orbits: (0..max_orbits).map(|_| None).collect(),
            max_orbits,
            block_frames,
            sample_rate,
            cleanup_index: 0,
        }
    }

    /// Get (allocating on first use) the orbit for `id`, activating it.
    /// Ids beyond `max_orbits` are clamped into range via modulo so a
    /// misconfigured voice still lands somewhere rather than panicking.
    pub fn orbit_mut(&mut self, id: u32) -> &mut Orbit {
        let idx = (id as usize) % self.max_orbits;
        if self.orbits[idx].is_none() {
            self.orbits[idx] = Some(Orbit::new(id, self.block_frames, self.sample_rate));
        }
        let orbit = self.orbits[idx].as_mut().unwrap();
        orbit.active = true;
        orbit
    }

    /// Clear every orbit's per-block scratch buffers; called at the start
    /// of each `process_and_mix`.
    pub fn begin_block(&mut self) {
        for orbit in self.orbits.iter_mut().flatten() {
            orbit.clear();
        }
    }

    /// Run inserts, ducking, and master mix for the block; returns the
    /// interleaved stereo sum. Each orbit's delay time/feedback come from
    /// whichever voice most recently addressed it with explicit
    /// `delayTime`/`delayFeedback` (see [`Orbit::set_delay_config`]).
    pub fn process_and_mix(&mut self) -> (Vec<f64>, Vec<f64>) {
        let mut master = (vec![0.0; self.block_frames], vec![0.0; self.block_frames]);

        for orbit in self.orbits.iter_mut().flatten() {
            if !orbit.active {
                continue;
            }
            orbit.process_inserts();
        }

        self.apply_ducking();

        for orbit in self.orbits.iter().flatten() {
            if !orbit.active {
                continue;
            }
            for i in 0..self.block_frames {
                master.0[i] += orbit.mix_buffer.0[i];
                master.1[i] += orbit.mix_buffer.1[i];
            }
        }

        self.run_silence_gc();
        master
    }

    fn apply_ducking(&mut self) {
        let snapshot: Vec<(usize, DuckConfig)> = self
            .orbits
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.as_ref().map(|o| (i, o.duck)))
            .collect();

        for (idx, duck) in snapshot {
            let Some(source_id) = duck.source_orbit else { continue };
            let source_idx = (source_id as usize) % self.max_orbits;
            let source_active = self.orbits[source_idx].as_ref().map(|o| o.active).unwrap_or(false);
            if !source_active || source_idx == idx {
                continue;
            }

            let sidechain: Vec<f64> = {
                let source = self.orbits[source_idx].as_ref().unwrap();
                (0..self.block_frames)
                    .map(|i| (source.mix_buffer.0[i].abs() + source.mix_buffer.1[i].abs()) * 0.5)
                    .collect()
            };

            let release_coeff = if duck.attack_sec > 0.0 {
                (-1.0 / (duck.attack_sec * self.sample_rate)).exp()
            } else {
                0.0
            };

            let orbit = self.orbits[idx].as_mut().unwrap();
            for i in 0..self.block_frames {
                let target = 1.0 - duck.depth.clamp(0.0, 1.0) * (2.0 * sidechain[i]).min(1.0);
                if target < orbit.duck_gain {
                    orbit.duck_gain = target;
                } else {
                    orbit.duck_gain = target + (orbit.duck_gain - target) * release_coeff;
                }
                orbit.mix_buffer.0[i] *= orbit.duck_gain;
                orbit.mix_buffer.1[i] *= orbit.duck_gain;
            }
        }
    }

    fn run_silence_gc(&mut self) {
        self.cleanup_index = (self.cleanup_index + 1) % self.max_orbits;
        if let Some(orbit) = self.orbits[self.cleanup_index].as_mut() {
            if orbit.active && orbit.is_silent() {
                orbit.active = false;
            }
        }
    }

    /// Ids of orbits that have ever been allocated, for diagnostics.
    pub fn allocated_ids(&self) -> Vec<u32> {
        self.orbits.iter().flatten().map(|o| o.id).collect()
    }

    pub fn orbit_activity(&self) -> Vec<(u32, bool)> {
        self.orbits.iter().flatten().map(|o| (o.id, o.active)).collect()
    }
}
