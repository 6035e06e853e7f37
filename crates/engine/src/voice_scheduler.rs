//! Voice scheduler: ingests control commands, promotes scheduled
//! voices at sample-accurate frame boundaries via a min-heap, renders the
//! active list each block, and reports diagnostics.

use crate::bridge::{BackBridge, ControlCommand, FeedbackMessage, OrbitActivity};
use crate::clock::now_ms;
use crate::orbits::OrbitMixer;
use crate::sample::{Pcm, PlaybackId, SampleRequest, ScheduledVoice};
use crate::voice::Voice;
use engine_core::pattern_system::Fraction;
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

struct HeapEntry {
    start_frame: u64,
    end_frame: u64,
    sequence: u64,
    playback_id: PlaybackId,
    voice: ScheduledVoice,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.start_frame == other.start_frame && self.sequence == other.sequence
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    /// Min-heap by `start_frame`, stable tie-break by insertion order, via
    /// `std::cmp::Reverse` at the call site.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.start_frame
            .cmp(&other.start_frame)
            .then(self.sequence.cmp(&other.sequence))
    }
}

#[derive(Default)]
struct SampleRegistry {
    resolved: HashMap<SampleRequest, Option<Pcm>>,
}

impl SampleRegistry {
    fn complete(&mut self, req: SampleRequest, pcm: Pcm) {
        self.resolved.insert(req, Some(pcm));
    }
    fn not_found(&mut self, req: SampleRequest) {
        self.resolved.insert(req, None);
    }
    fn lookup(&self, req: &SampleRequest) -> Option<&Pcm> {
        self.resolved.get(req).and_then(|o| o.as_ref())
    }
    fn is_known(&self, req: &SampleRequest) -> bool {
        self.resolved.contains_key(req)
    }
}

const DIAGNOSTICS_INTERVAL_MS: f64 = 50.0;

pub struct VoiceScheduler {
    scheduled: BinaryHeap<std::cmp::Reverse<HeapEntry>>,
    active: Vec<Voice>,
    playback_epochs: HashMap<PlaybackId, u64>,
    samples: SampleRegistry,
    sequence_counter: u64,
    sample_rate: f64,
    block_frames: usize,
    last_diagnostics_ms: f64,
    headroom_min: f64,
}

impl VoiceScheduler {
    pub fn new(sample_rate: f64, block_frames: usize) -> Self {
        Self {
            scheduled: BinaryHeap::new(),
            active: Vec::new(),
            playback_epochs: HashMap::new(),
            samples: SampleRegistry::default(),
            sequence_counter: 0,
            sample_rate,
            block_frames,
            last_diagnostics_ms: 0.0,
            headroom_min: 1.0,
        }
    }

    /// Process one block at `cursor_frame`. Drains commands, promotes due
    /// voices, renders the active list into `orbits`, and periodically
    /// emits `Diagnostics` through `bridge`.
    pub fn process(&mut self, cursor_frame: u64, bridge: &mut BackBridge, orbits: &mut OrbitMixer) {
        let wall_start = std::time::Instant::now();

        self.drain_commands(cursor_frame, bridge);
        self.promote_due(cursor_frame);

        orbits.begin_block();
        self.active.retain_mut(|voice| {
            let orbit = orbits.orbit_mut(voice.orbit_id());
            !voice.render(cursor_frame, self.block_frames, self.sample_rate, orbit)
        });

        let elapsed = wall_start.elapsed();
        let block_duration = Duration::from_secs_f64(self.block_frames as f64 / self.sample_rate);
        let headroom = 1.0 - elapsed.as_secs_f64() / block_duration.as_secs_f64().max(1e-9);
        self.headroom_min = self.headroom_min.min(headroom);

        let now = now_ms();
        if now - self.last_diagnostics_ms >= DIAGNOSTICS_INTERVAL_MS {
            let orbits_activity = orbits
                .orbit_activity()
                .into_iter()
                .map(|(id, active)| OrbitActivity { id, active })
                .collect();
            bridge.send_feedback(FeedbackMessage::Diagnostics {
                render_headroom: self.headroom_min,
                active_voice_count: self.active.len() as u32,
                orbits: orbits_activity,
            });
            self.headroom_min = 1.0;
            self.last_diagnostics_ms = now;
        }
    }

    fn drain_commands(&mut self, cursor_frame: u64, bridge: &mut BackBridge) {
        for cmd in bridge.drain_control() {
            match cmd {
                ControlCommand::ScheduleVoice { playback_id, voice } => {
                    self.schedule_voice(playback_id, voice, cursor_frame, bridge);
                }
                ControlCommand::ReplaceVoices { playback_id, from_cycle, to_cycle, voices } => {
                    self.replace_voices(&playback_id, from_cycle, to_cycle, cursor_frame);
                    for voice in voices {
                        self.schedule_voice(playback_id.clone(), voice, cursor_frame, bridge);
                    }
                }
                ControlCommand::SampleComplete { req, pcm, pcm_sample_rate, pitch_hz, .. } => {
                    self.samples.complete(
                        req,
                        Pcm { samples: pcm, sample_rate: pcm_sample_rate, pitch_hz },
                    );
                }
                ControlCommand::SampleNotFound { req, .. } => {
                    self.samples.not_found(req);
                }
                ControlCommand::Cleanup { playback_id } => {
                    self.playback_epochs.remove(&playback_id);
                    self.scheduled.retain(|std::cmp::Reverse(entry)| entry.playback_id != playback_id);
                }
            }
        }
    }

    fn schedule_voice(&mut self, playback_id: PlaybackId, voice: ScheduledVoice, cursor_frame: u64, bridge: &mut BackBridge) {
        let epoch_frame = *self.playback_epochs.entry(playback_id.clone()).or_insert_with(|| {
            bridge.send_feedback(FeedbackMessage::PlaybackLatency {
                playback_id: playback_id.clone(),
                backend_timestamp_ms: now_ms(),
            });
            cursor_frame
        });

        let start_frame = epoch_frame + (voice.start_time_s * self.sample_rate) as u64;
        let end_frame = epoch_frame + (voice.gate_end_time_s * self.sample_rate) as u64;
        let sequence = self.sequence_counter;
        self.sequence_counter += 1;

        self.scheduled.push(std::cmp::Reverse(HeapEntry {
            start_frame,
            end_frame,
            sequence,
            playback_id,
            voice,
        }));
    }

    fn replace_voices(&mut self, playback_id: &PlaybackId, from_cycle: Fraction, to_cycle: Fraction, cursor_frame: u64) {
        let _ = (from_cycle, to_cycle);
        self.scheduled.retain(|std::cmp::Reverse(entry)| {
            entry.playback_id != *playback_id || entry.start_frame < cursor_frame
        });
    }

    fn promote_due(&mut self, cursor_frame: u64) {
        let horizon = cursor_frame + self.block_frames as u64;
        while let Some(std::cmp::Reverse(entry)) = self.scheduled.peek() {
            if entry.start_frame >= horizon {
                break;
            }
            let std::cmp::Reverse(entry) = self.scheduled.pop().unwrap();

            if entry.end_frame <= cursor_frame {
                continue; // missed its window entirely
            }

            let req = SampleRequest::from_voice_data(&entry.voice.data);
            let pcm = self.samples.lookup(&req);

            match Voice::new(
                entry.playback_id.clone(),
                entry.voice.data.clone(),
                entry.start_frame,
                entry.end_frame,
                self.sample_rate,
                pcm,
            ) {
                Ok(voice) => self.active.push(voice),
                Err(_) => continue,
            }
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::channel;
    use engine_core::VoiceData;

    fn voice(sound: &str, start: f64, end: f64) -> ScheduledVoice {
        ScheduledVoice {
            playback_id: "p1".into(),
            data: VoiceData::with_sound(sound),
            start_time_s: start,
            gate_end_time_s: end,
            playback_start_time_s: 0.0,
            source_locations: Vec::new(),
        }
    }

    #[test]
    fn test_synth_voice_promotes_and_renders() {
        let mut scheduler = VoiceScheduler::new(44100.0, 64);
        let mut orbits = OrbitMixer::new(64, 44100.0, 4);
        let (mut front, mut back) = channel();
        let id: PlaybackId = "p1".into();
        front.send_control(ControlCommand::ScheduleVoice {
            playback_id: id.clone(),
            voice: voice("sine", 0.0, 0.05),
        });
        scheduler.process(0, &mut back, &mut orbits);
        assert_eq!(scheduler.active_count(), 1);
    }

    #[test]
    fn test_missed_window_voice_is_discarded() {
        let mut scheduler = VoiceScheduler::new(44100.0, 64);
        let mut orbits = OrbitMixer::new(64, 44100.0, 4);
        let (mut front, mut back) = channel();
        let id: PlaybackId = "p1".into();
        front.send_control(ControlCommand::ScheduleVoice {
            playback_id: id.clone(),
            voice: voice("sine", -10.0, -9.9),
        });
        scheduler.process(0, &mut back, &mut orbits);
        assert_eq!(scheduler.active_count(), 0);
    }

    #[test]
    fn test_unresolved_sample_voice_is_skipped() {
        let mut scheduler = VoiceScheduler::new(44100.0, 64);
        let mut orbits = OrbitMixer::new(64, 44100.0, 4);
        let (mut front, mut back) = channel();
        let id: PlaybackId = "p1".into();
        front.send_control(ControlCommand::ScheduleVoice {
            playback_id: id.clone(),
            voice: voice("bd", 0.0, 0.1),
        });
        scheduler.process(0, &mut back, &mut orbits);
        assert_eq!(scheduler.active_count(), 0);
    }
}
