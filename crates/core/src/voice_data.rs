//! Voice data: the open, mergeable parameter bundle carried by every pattern event.
//!
//! `VoiceData` is the `T` in `Pattern<T>` once a pattern has been lifted out of
//! plain scalars (numbers, strings, bools used by the combinator layer) into the
//! domain of playable events. Every field is optional; control application and
//! sequence accumulation both reduce to [`VoiceData::merge`].

use crate::pattern_system::{Fraction, Pattern, State};
use std::sync::Arc;

/// A single filter stage in a voice's filter chain.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterDef {
    Lowpass,
    Highpass,
    Bandpass,
}

/// Immutable, fully-optional per-event parameter bundle.
///
/// `merge(a, b)` overlays `b`'s populated fields onto `a` (right wins) for
/// scalar fields, and concatenates the `filters` list. Combinators never
/// mutate a `VoiceData` in place; they always produce a new record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VoiceData {
    // identity
    pub sound: Option<String>,
    pub bank: Option<String>,
    pub sound_index: Option<i64>,
    pub note: Option<f64>,
    pub scale: Option<String>,
    pub orbit: Option<u32>,

    // dynamics
    pub gain: Option<f64>,
    pub pan: Option<f64>,
    pub attack: Option<f64>,
    pub decay: Option<f64>,
    pub sustain: Option<f64>,
    pub release: Option<f64>,

    // synthesis
    pub density: Option<f64>,
    pub unison: Option<u32>,
    pub detune: Option<f64>,
    pub spread: Option<f64>,

    // modulation
    pub vibrato: Option<f64>,
    pub vibrato_mod: Option<f64>,
    pub fm_h: Option<f64>,
    pub fm_env: Option<f64>,
    pub accelerate: Option<f64>,
    pub pitch_env: Option<f64>,

    // filters
    pub filters: Vec<FilterDef>,
    pub cutoff: Option<f64>,
    pub hcutoff: Option<f64>,
    pub resonance: Option<f64>,

    // effects
    pub distort: Option<f64>,
    pub crush: Option<f64>,
    pub coarse: Option<f64>,

    // sends
    pub delay: Option<f64>,
    pub delay_time: Option<f64>,
    pub delay_feedback: Option<f64>,
    pub room: Option<f64>,
    pub roomsize: Option<f64>,

    // ducking
    pub duck_orbit: Option<u32>,
    pub duck_attack: Option<f64>,
    pub duck_depth: Option<f64>,

    /// The "free slot" used by arithmetic combinators (`add`, `mul`, ...) that
    /// don't know which named field they're modulating yet.
    pub value: Option<f64>,
}

macro_rules! overlay {
    ($out:expr, $a:expr, $b:expr, $($field:ident),+ $(,)?) => {
        $(
            $out.$field = $b.$field.clone().or_else(|| $a.$field.clone());
        )+
    };
}

impl VoiceData {
    /// A record with only `sound` set; the common case for pattern literals.
    pub fn with_sound(sound: impl Into<String>) -> Self {
        Self {
            sound: Some(sound.into()),
            ..Self::default()
        }
    }

    /// A record with only the free `value` slot set.
    pub fn with_value(value: f64) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    /// Overlay `b`'s populated fields onto `a`. Scalars: right wins. Filters:
    /// concatenated (`a`'s chain, then `b`'s).
    pub fn merge(a: &VoiceData, b: &VoiceData) -> VoiceData {
        let mut out = VoiceData::default();
        overlay!(
            out, a, b,
            sound, bank, sound_index, note, scale, orbit,
            gain, pan, attack, decay, sustain, release,
            density, unison, detune, spread,
            vibrato, vibrato_mod, fm_h, fm_env, accelerate, pitch_env,
            cutoff, hcutoff, resonance,
            distort, crush, coarse,
            delay, delay_time, delay_feedback, room, roomsize,
            duck_orbit, duck_attack, duck_depth,
            value,
        );
        out.filters = a.filters.iter().chain(b.filters.iter()).cloned().collect();
        out
    }
}

impl Pattern<VoiceData> {
    /// Control application (outer join): preserve the outer pattern's
    /// structure, sample `control` at each outer event's onset with a tiny
    /// window, and merge the sampled data into the outer event (right wins).
    ///
    /// This is the semantics behind `pat # control` — continuous controls
    /// (sine, saw, ...) are sampled once per onset rather than averaged over
    /// the event's span.
    pub fn apply_control(&self, control: &Pattern<VoiceData>) -> Pattern<VoiceData> {
        let outer = self.clone();
        let control = control.clone();

        Pattern::new(move |state: &State| {
            outer
                .query(state)
                .into_iter()
                .map(|hap| {
                    let sample_point = hap.part.begin.clone();
                    let epsilon = Fraction::new(1, 1_000_000);
                    let sample_span = crate::pattern_system::TimeSpan::new(
                        sample_point.clone(),
                        &sample_point + &epsilon,
                    );
                    let sampled = control
                        .query(&state.set_span(sample_span))
                        .into_iter()
                        .next();

                    match sampled {
                        Some(ctrl_hap) => {
                            let merged = VoiceData::merge(&hap.value, &ctrl_hap.value);
                            hap.with_value(&move |_| merged.clone())
                        }
                        None => hap,
                    }
                })
                .collect()
        })
    }

    /// `hurry(factor)`: speed up the pattern *and* its tempo-sensitive fields.
    ///
    /// Distinguished from plain `fast` per the open question over `hurry` vs
    /// `fast` (see DESIGN.md): `fast` only rescales event timing, while
    /// `hurry` additionally scales fields whose perceived rate depends on
    /// playback speed (currently just `density`, the only tempo-coupled
    /// synthesis field `VoiceData` carries).
    pub fn hurry(&self, factor: Fraction) -> Pattern<VoiceData> {
        let factor_f64 = factor.to_f64();
        self.fast(factor).fmap(move |data| {
            let mut data = data.clone();
            data.density = Some(data.density.unwrap_or(1.0) * factor_f64);
            data
        })
    }
}

/// Lift a plain-number pattern into the `value` slot of a `VoiceData` pattern.
///
/// Grounds the "value lift" combinator: scalar arithmetic patterns (`add`,
/// `mul`, ...) operate on bare `f64`s and get promoted into the free slot
/// before being merged into a voice pattern via [`Pattern::apply_control`].
pub fn value_pattern(source: &Pattern<f64>) -> Pattern<VoiceData> {
    source.fmap(|v| VoiceData::with_value(*v))
}

/// Build a named-field control pattern, e.g. `gain_pattern(sine(), |g| g.clamp(0.2, 1.0))`,
/// suitable for use on the right-hand side of [`Pattern::apply_control`].
pub fn field_pattern<F>(source: &Pattern<f64>, set: F) -> Pattern<VoiceData>
where
    F: Fn(&mut VoiceData, f64) + Send + Sync + 'static,
{
    let set = Arc::new(set);
    source.fmap(move |v| {
        let mut data = VoiceData::default();
        set(&mut data, *v);
        data
    })
}
