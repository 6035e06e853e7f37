//! Shared value types that cross the front/back bridge: sample requests,
//! resolved PCM payloads, and scheduled-voice commands.

use engine_core::VoiceData;
use std::sync::Arc;

/// A playback's identity, threaded through every control/feedback message
/// and signal so a process hosting more than one concurrent playback can
/// tell them apart. Cheap to clone (an `Arc<str>`, not an owned `String`).
pub type PlaybackId = Arc<str>;

/// A content-addressed key for a sample, derived from a voice's identity
/// fields. `note` is compared by bit pattern (not by value) so the type can
/// derive `Eq`/`Hash` without pulling in an ordered-float wrapper; two
/// requests are equal iff every field, including the exact `f64` bits of
/// `note`, matches.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SampleRequest {
    pub bank: Option<String>,
    pub sound: Option<String>,
    pub index: Option<i64>,
    note_bits: Option<u64>,
}

impl SampleRequest {
    pub fn new(bank: Option<String>, sound: Option<String>, index: Option<i64>, note: Option<f64>) -> Self {
        Self {
            bank,
            sound,
            index,
            note_bits: note.map(f64::to_bits),
        }
    }

    pub fn note(&self) -> Option<f64> {
        self.note_bits.map(f64::from_bits)
    }

    /// Build the request implied by a voice's identity fields, for the
    /// preloader and for `RequestSample`/`Sample.Complete` routing.
    pub fn from_voice_data(data: &VoiceData) -> Self {
        Self::new(data.bank.clone(), data.sound.clone(), data.sound_index, data.note)
    }

    /// A label usable for `PreloadingSamples { names }`.
    pub fn display_name(&self) -> String {
        match (&self.bank, &self.sound, self.index) {
            (Some(bank), Some(sound), Some(idx)) => format!("{bank}/{sound}:{idx}"),
            (Some(bank), Some(sound), None) => format!("{bank}/{sound}"),
            (None, Some(sound), Some(idx)) => format!("{sound}:{idx}"),
            (None, Some(sound), None) => sound.clone(),
            _ => "<unknown>".to_string(),
        }
    }
}

/// Resolved sample payload, as delivered by `Sample.Complete`.
#[derive(Clone, Debug)]
pub struct Pcm {
    pub samples: Arc<[f32]>,
    pub sample_rate: u32,
    pub pitch_hz: f64,
}

/// A single voice handed from the front-end scheduler to the back-end
/// voice scheduler. Times are relative seconds from the playback's epoch;
/// the back-end converts to absolute frames once it knows that epoch.
#[derive(Clone, Debug)]
pub struct ScheduledVoice {
    pub playback_id: PlaybackId,
    pub data: VoiceData,
    pub start_time_s: f64,
    pub gate_end_time_s: f64,
    pub playback_start_time_s: f64,
    /// Source string offsets (start, end) this voice's value and any
    /// modifiers applying to it trace back to, for editor highlighting.
    pub source_locations: Vec<(usize, usize)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_request_equality_ignores_nan_identity() {
        let a = SampleRequest::new(None, Some("bd".into()), Some(0), Some(60.0));
        let b = SampleRequest::new(None, Some("bd".into()), Some(0), Some(60.0));
        assert_eq!(a, b);

        let c = SampleRequest::new(None, Some("bd".into()), Some(0), Some(61.0));
        assert_ne!(a, c);
    }

    #[test]
    fn test_display_name_variants() {
        let full = SampleRequest::new(Some("tr808".into()), Some("bd".into()), Some(2), None);
        assert_eq!(full.display_name(), "tr808/bd:2");

        let bare = SampleRequest::new(None, Some("sd".into()), None, None);
        assert_eq!(bare.display_name(), "sd");
    }
}
