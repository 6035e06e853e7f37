//! Strudel-compatible pattern operations.
//!
//! This module provides pattern operations that match Strudel's API
//! for feature parity with the JavaScript implementation.

use super::{Fraction, Hap, HapContext, Pattern, State, TimeSpan};
use super::combinators::{fastcat, slowcat, stack, timecat};
use super::constructors::{pure, silence};
use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// TIER 1: Critical Operations
// ============================================================================

impl<T: Clone + Send + Sync + 'static> Pattern<T> {
    /// Apply boolean pattern structure to this pattern.
    ///
    /// Events from `self` are restructured to match the timing of `true` events
    /// in the boolean pattern. This is fundamental for Tidal-style patterning.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // sequence('a', 'b').struct(sequence(true, true, true))
    /// let pat = fastcat(vec![pure("a"), pure("b")]);
    /// let bool_pat = fastcat(vec![pure(true), pure(true), pure(true)]);
    /// let result = pat.struct_pat(&bool_pat);
    /// ```
    pub fn struct_pat(&self, bool_pat: &Pattern<bool>) -> Pattern<T> {
        let value_pat = self.clone();
        let bool_pat = bool_pat.clone();

        Pattern::new(move |state: &State| {
            let bool_haps: Vec<_> = bool_pat
                .query(state)
                .into_iter()
                .filter(|h| h.value && h.has_onset())
                .collect();

            let mut result = Vec::new();

            for bool_hap in bool_haps {
                // Query value pattern at the boolean hap's timespan
                let query_span = bool_hap.whole_or_part().clone();
                let value_haps = value_pat.query(&state.set_span(query_span));

                for value_hap in value_haps {
                    // Intersect parts
                    if let Some(part) = bool_hap.part.intersection(&value_hap.part) {
                        let context = HapContext::merge(&bool_hap.context, &value_hap.context);
                        result.push(Hap::with_context(
                            bool_hap.whole.clone(),
                            part,
                            value_hap.value.clone(),
                            context,
                        ));
                    }
                }
            }

            result
        })
    }

    /// Mask this pattern with a boolean pattern.
    ///
    /// Unlike `struct_pat`, this keeps the original pattern's structure
    /// but filters out events where the boolean pattern is false.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // sequence('a', 'b').mask(sequence(true, false))
    /// ```
    pub fn mask(&self, bool_pat: &Pattern<bool>) -> Pattern<T> {
        let value_pat = self.clone();
        let bool_pat = bool_pat.clone();

        Pattern::new(move |state: &State| {
            let value_haps = value_pat.query(state);
            let bool_haps = bool_pat.query(state);

            let mut result = Vec::new();

            for value_hap in value_haps {
                for bool_hap in &bool_haps {
                    if !bool_hap.value {
                        continue;
                    }

                    if let Some(part) = value_hap.part.intersection(&bool_hap.part) {
                        let context = HapContext::merge(&value_hap.context, &bool_hap.context);
                        result.push(Hap::with_context(
                            value_hap.whole.clone(),
                            part,
                            value_hap.value.clone(),
                            context,
                        ));
                    }
                }
            }

            result
        })
    }

    /// Apply a function conditionally based on a boolean pattern.
    ///
    /// When the boolean pattern is true, apply the function; otherwise keep original.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // pure('a').when(pure(true), (x) => x._fast(2))
    /// ```
    pub fn when<F>(&self, bool_pat: &Pattern<bool>, f: F) -> Pattern<T>
    where
        F: Fn(&Pattern<T>) -> Pattern<T> + Send + Sync + Clone + 'static,
    {
        let pat = self.clone();
        let bool_pat = bool_pat.clone();
        let transformed = f(&pat);

        Pattern::new(move |state: &State| {
            let bool_haps = bool_pat.query(state);
            let mut result = Vec::new();

            for bool_hap in bool_haps {
                let query_state = state.set_span(bool_hap.part.clone());
                let source_pat = if bool_hap.value {
                    &transformed
                } else {
                    &pat
                };

                for hap in source_pat.query(&query_state) {
                    if let Some(part) = hap.part.intersection(&bool_hap.part) {
                        result.push(Hap::with_context(
                            hap.whole.clone(),
                            part,
                            hap.value.clone(),
                            hap.context.clone(),
                        ));
                    }
                }
            }

            result
        })
    }

    /// Apply a function every nth cycle.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // pure('a').firstOf(3, (x) => x._fast(2))._fast(3)
    /// ```
    pub fn first_of<F>(&self, n: i64, f: F) -> Pattern<T>
    where
        F: Fn(&Pattern<T>) -> Pattern<T> + Send + Sync + Clone + 'static,
    {
        let pat = self.clone();
        let transformed = f(&pat);

        Pattern::new(move |state: &State| {
            state
                .span
                .span_cycles()
                .into_iter()
                .flat_map(|cycle_span| {
                    let cycle_num = cycle_span.begin.sam().to_f64() as i64;
                    let use_transformed = cycle_num % n == 0;

                    let source_pat = if use_transformed {
                        &transformed
                    } else {
                        &pat
                    };

                    source_pat.query(&state.set_span(cycle_span))
                })
                .collect()
        })
    }

    /// Alias for first_of (Tidal naming).
    pub fn every<F>(&self, n: i64, f: F) -> Pattern<T>
    where
        F: Fn(&Pattern<T>) -> Pattern<T> + Send + Sync + Clone + 'static,
    {
        self.first_of(n, f)
    }
}

impl Pattern<bool> {
    /// Invert a boolean pattern.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // sequence(true, false, [true, false]).invert()
    /// ```
    pub fn invert(&self) -> Pattern<bool> {
        self.fmap(|b| !b)
    }
}

// ============================================================================
// Numeric Pattern Operations
// ============================================================================

impl Pattern<f64> {
    /// Map values from 0-1 range to min-max range.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // sequence(0, 0).range(sequence(0, 0.5), 1)
    /// ```
    pub fn range(&self, min: f64, max: f64) -> Pattern<f64> {
        self.fmap(move |v| min + v * (max - min))
    }

    /// Map values from -1 to 1 range (bipolar) to min-max range.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // sequence(-1, -0.5, 0, 0.5).range2(1000, 1100)
    /// ```
    pub fn range2(&self, min: f64, max: f64) -> Pattern<f64> {
        self.fmap(move |v| {
            let normalized = (v + 1.0) / 2.0; // -1..1 -> 0..1
            min + normalized * (max - min)
        })
    }
}

/// Generate a sequence from 0 to n-1.
///
/// # Example (Strudel equivalent)
/// ```ignore
/// // run(4) -> sequence(0, 1, 2, 3)
/// ```
pub fn run(n: i64) -> Pattern<i64> {
    if n <= 0 {
        return silence();
    }
    fastcat((0..n).map(pure).collect())
}

/// Generate a sequence from 0.0 to n-1 as f64.
pub fn run_f64(n: i64) -> Pattern<f64> {
    if n <= 0 {
        return silence();
    }
    fastcat((0..n).map(|i| pure(i as f64)).collect())
}

/// Generate a binary pattern from a decimal number.
///
/// # Example (Strudel equivalent)
/// ```ignore
/// // binaryN(55532) -> sequence(1, 1, 0, 1, 1, 0, 0, 0, 1, 1, 1, 0, 1, 1, 0, 0)
/// ```
pub fn binary_n(num: u64, bits: Option<usize>) -> Pattern<i64> {
    let bits = bits.unwrap_or(16);
    let mut pattern_bits = Vec::with_capacity(bits);

    for i in (0..bits).rev() {
        let bit = if (num >> i) & 1 == 1 { 1i64 } else { 0i64 };
        pattern_bits.push(pure(bit));
    }

    fastcat(pattern_bits)
}

// ============================================================================
// TIER 2: Important Operations
// ============================================================================

impl<T: Clone + Send + Sync + 'static> Pattern<T> {
    /// Multiply each event by repeating it n times within its timespan.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // sequence('a', ['b', 'c']).ply(3)
    /// ```
    pub fn ply(&self, n: i64) -> Pattern<T> {
        if n <= 0 {
            return silence();
        }

        let pat = self.clone();
        let n_frac = Fraction::from_integer(n);
        let steps = self.steps().cloned();

        let mut result = Pattern::new(move |state: &State| {
            let haps = pat.query(state);
            let mut result = Vec::new();

            for hap in haps {
                if let Some(whole) = &hap.whole {
                    let duration = whole.duration();
                    let sub_duration = &duration / &n_frac;

                    for i in 0..n {
                        let i_frac = Fraction::from_integer(i);
                        let sub_begin = &whole.begin + &(&i_frac * &sub_duration);
                        let sub_end = &sub_begin + &sub_duration;
                        let sub_whole = TimeSpan::new(sub_begin.clone(), sub_end.clone());

                        if let Some(part) = sub_whole.intersection(&hap.part) {
                            if let Some(query_part) = part.intersection(&state.span) {
                                result.push(Hap::with_context(
                                    Some(sub_whole),
                                    query_part,
                                    hap.value.clone(),
                                    hap.context.clone(),
                                ));
                            }
                        }
                    }
                } else {
                    result.push(hap.clone());
                }
            }

            result
        });

        if let Some(s) = steps {
            result.set_steps(&s * &Fraction::from_integer(n));
        }
        result
    }

    /// Overlay a time-shifted and transformed copy of the pattern.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // pure(30).off(0.25, add(2))
    /// ```
    pub fn off<F>(&self, offset: Fraction, f: F) -> Pattern<T>
    where
        F: Fn(&Pattern<T>) -> Pattern<T> + Send + Sync + 'static,
    {
        let original = self.clone();
        let transformed = f(&self.clone())._late(offset);
        stack(vec![original, transformed])
    }

    /// Stack multiple transformations of this pattern.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // sequence(1, 2, 3).layer(fast(2), (pat) => pat.add(3, 4))
    /// ```
    pub fn layer<F>(&self, funcs: Vec<F>) -> Pattern<T>
    where
        F: Fn(&Pattern<T>) -> Pattern<T> + Send + Sync + 'static,
    {
        let layers: Vec<Pattern<T>> = funcs.iter().map(|f| f(self)).collect();
        stack(layers)
    }

    /// Create a palindrome by playing the pattern forward then backward.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // fastcat('a', 'b', 'c').palindrome()
    /// ```
    pub fn palindrome(&self) -> Pattern<T> {
        slowcat(vec![self.clone(), self.rev()])
    }

    /// Keep the left value but use the right pattern's structure.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // pure(3).keep(pure(4))
    /// ```
    pub fn keep<U: Clone + Send + Sync + 'static>(&self, other: &Pattern<U>) -> Pattern<T> {
        self.app_left(other, |a, _b| a.clone())
    }

    /// Filter events based on a boolean pattern.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // sequence(3, 4).keepif(true, false)
    /// ```
    pub fn keepif(&self, bool_pat: &Pattern<bool>) -> Pattern<T> {
        self.mask(bool_pat)
    }

    /// Breakbeat-style transformation.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // sequence('a', 'b').brak()
    /// ```
    pub fn brak(&self) -> Pattern<T> {
        let pat = self.clone();
        let half = Fraction::new(1, 2);

        // Create the "broken" version: silence in first half, pattern in second half
        let broken = silence::<T>().compress(&Fraction::from_integer(0), &half);
        let second_half = pat.clone().compress(&half, &Fraction::from_integer(1));

        // Alternate: normal, broken
        slowcat(vec![pat, stack(vec![broken, second_half])])
    }

    /// Syncopate events by shifting them by half their duration.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // sequence('a', 'b', 'c', 'd').press()
    /// ```
    pub fn press(&self) -> Pattern<T> {
        let pat = self.clone();
        let half = Fraction::new(1, 2);

        Pattern::new(move |state: &State| {
            let haps = pat.query(state);
            let mut result = Vec::new();

            for hap in haps {
                if let Some(whole) = &hap.whole {
                    let duration = whole.duration();
                    let offset = &duration * &half;

                    let new_whole = TimeSpan::new(
                        &whole.begin + &offset,
                        &whole.end + &offset,
                    );

                    if let Some(part) = new_whole.intersection(&state.span) {
                        result.push(Hap::with_context(
                            Some(new_whole),
                            part,
                            hap.value.clone(),
                            hap.context.clone(),
                        ));
                    }
                }
            }

            result
        })
    }

    /// Linger on the first part of the pattern.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // sequence(0, 1, 2, 3, 4, 5, 6, 7).linger(0.25)
    /// ```
    pub fn linger(&self, fraction: Fraction) -> Pattern<T> {
        if fraction <= Fraction::from_integer(0) {
            return silence();
        }

        self.compress(&Fraction::from_integer(0), &fraction)
            ._fast(Fraction::from_integer(1) / fraction)
    }

    /// Extract a ribbon (portion) of the pattern.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // cat(0, 1, 2, 3, 4, 5, 6, 7).ribbon(2, 4).fast(4)
    /// ```
    pub fn ribbon(&self, start_cycle: i64, end_cycle: i64) -> Pattern<T> {
        let pat = self.clone();
        let start = Fraction::from_integer(start_cycle);
        let end = Fraction::from_integer(end_cycle);
        let len = &end - &start;

        Pattern::new(move |state: &State| {
            // Query the source pattern at the offset cycles
            let query_span = state.span.with_time(|t| t + &start);
            pat.query(&state.set_span(query_span))
                .into_iter()
                .map(|hap| hap.with_span_transform(|span| span.with_time(|t| t - &start)))
                .collect()
        })
        ._slow(len)
    }

    /// Repeat each cycle n times.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // slowcat(0, 1).repeatCycles(2).fast(6)
    /// ```
    pub fn repeat_cycles(&self, n: i64) -> Pattern<T> {
        if n <= 0 {
            return silence();
        }

        let pat = self.clone();
        let n_frac = Fraction::from_integer(n);

        Pattern::new(move |state: &State| {
            state
                .span
                .span_cycles()
                .into_iter()
                .flat_map(|cycle_span| {
                    let cycle = cycle_span.begin.floor().to_f64() as i64;
                    let source_cycle = cycle / n;
                    let offset = Fraction::from_integer(cycle - source_cycle * n);

                    let query_span = cycle_span.with_time(|t| {
                        let cycle_pos = t.cycle_pos();
                        Fraction::from_integer(source_cycle) + cycle_pos
                    });

                    pat.query(&state.set_span(query_span))
                        .into_iter()
                        .map(|hap| {
                            hap.with_span_transform(|span| {
                                let duration = span.duration();
                                let base_cycle = span.begin.floor();
                                let pos = span.begin.cycle_pos();
                                let new_begin = Fraction::from_integer(cycle) + pos;
                                TimeSpan::new(new_begin.clone(), new_begin + duration)
                            })
                        })
                        .collect::<Vec<_>>()
                })
                .collect()
        })
    }

    /// Speed up the pattern with a gap of silence.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // sequence('a', 'b', 'c')._fastGap(2)
    /// ```
    pub fn fast_gap(&self, factor: Fraction) -> Pattern<T> {
        if factor <= Fraction::from_integer(1) {
            return self.clone();
        }

        let compressed = self.compress(
            &Fraction::from_integer(0),
            &(Fraction::from_integer(1) / &factor),
        );

        compressed
    }

    /// Apply transformation at a faster rate.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // sequence('a', 'b', 'c', 'd').inside(2, rev)
    /// ```
    pub fn inside<F>(&self, factor: Fraction, f: F) -> Pattern<T>
    where
        F: Fn(&Pattern<T>) -> Pattern<T> + Send + Sync + 'static,
    {
        f(&self._fast(factor.clone()))._slow(factor)
    }

    /// Apply transformation at a slower rate.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // sequence('a', 'b', 'c', 'd')._slow(2).outside(2, rev)
    /// ```
    pub fn outside<F>(&self, factor: Fraction, f: F) -> Pattern<T>
    where
        F: Fn(&Pattern<T>) -> Pattern<T> + Send + Sync + 'static,
    {
        f(&self._slow(factor.clone()))._fast(factor)
    }

    /// Reverse the order of cycles (not just within cycles).
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // fastcat('a', 'b', 'c', 'd').slow(2).revv().fast(2)
    /// ```
    pub fn revv(&self) -> Pattern<T> {
        let pat = self.clone();

        Pattern::new(move |state: &State| {
            // Reflect query around t=0
            let reflected_span = state.span.with_time(|t| -t);
            // Swap begin and end since they got reversed
            let query_span = TimeSpan::new(
                reflected_span.end.clone(),
                reflected_span.begin.clone(),
            );

            pat.query(&state.set_span(query_span))
                .into_iter()
                .map(|hap| {
                    hap.with_span_transform(|span| {
                        TimeSpan::new(-span.end.clone(), -span.begin.clone())
                    })
                })
                .collect()
        })
    }

    /// Process pattern in chunks, applying transformation to each chunk in turn.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // sequence(0, 1, 2, 3).slow(2).chunk(2, add(10)).fast(4)
    /// ```
    pub fn chunk<F>(&self, n: i64, f: F) -> Pattern<T>
    where
        F: Fn(&Pattern<T>) -> Pattern<T> + Send + Sync + Clone + 'static,
    {
        let pat = self.clone();
        let f = Arc::new(f);

        Pattern::new(move |state: &State| {
            let f = f.clone();
            state
                .span
                .span_cycles()
                .into_iter()
                .flat_map(|cycle_span| {
                    let cycle = cycle_span.begin.floor().to_f64() as i64;
                    let chunk_idx = cycle % n;
                    let f = f.clone();

                    // Apply inside transformation for this chunk
                    let early_offset = Fraction::from_integer(chunk_idx);
                    let late_offset = Fraction::from_integer(chunk_idx);
                    let transformed = pat.inside(Fraction::from_integer(n), move |p| {
                        let p = p.clone();
                        let f = f.clone();
                        let early_offset = early_offset.clone();
                        let late_offset = late_offset.clone();
                        p.first_of(n, move |inner| {
                            // Rotate so the current chunk is first
                            let f = f.clone();
                            inner._early(early_offset.clone()).first_of(n, move |x| f(x))._late(late_offset.clone())
                        })
                    });

                    transformed.query(&state.set_span(cycle_span))
                })
                .collect()
        })
    }

    /// Fast chunk - unlike chunk, cycles proceed cycle-by-cycle.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // sequence(0, 1, 2, 3).slow(2).fastChunk(2, add(10)).fast(4)
    /// ```
    pub fn fast_chunk<F>(&self, n: i64, f: F) -> Pattern<T>
    where
        F: Fn(&Pattern<T>) -> Pattern<T> + Send + Sync + Clone + 'static,
    {
        let f = Arc::new(f);
        self.inside(Fraction::from_integer(n), move |p| {
            let f = f.clone();
            p.first_of(n, move |x| f(x))
        })
    }
}

// ============================================================================
// Polyrhythm and Polymeter
// ============================================================================

/// Layer multiple patterns at different speeds (polyrhythm).
///
/// # Example (Strudel equivalent)
/// ```ignore
/// // polyrhythm(['a', 'b'], ['c'])
/// ```
pub fn polyrhythm<T: Clone + Send + Sync + 'static>(patterns: Vec<Vec<Pattern<T>>>) -> Pattern<T> {
    let layer_patterns: Vec<Pattern<T>> = patterns
        .into_iter()
        .map(fastcat)
        .collect();
    stack(layer_patterns)
}

/// Layer multiple patterns stepwise (polymeter).
///
/// # Example (Strudel equivalent)
/// ```ignore
/// // polymeter(['a', 'b', 'c'], ['d', 'e']).fast(2)
/// ```
pub fn polymeter<T: Clone + Send + Sync + 'static>(patterns: Vec<Vec<Pattern<T>>>) -> Pattern<T> {
    if patterns.is_empty() {
        return silence();
    }

    // Find LCM of pattern lengths for proper alignment
    let lengths: Vec<usize> = patterns.iter().map(|p| p.len()).collect();
    let target_len = lengths.iter().max().copied().unwrap_or(1);

    let layer_patterns: Vec<Pattern<T>> = patterns
        .into_iter()
        .map(|pats| {
            if pats.is_empty() {
                silence()
            } else {
                let len = pats.len();
                slowcat(pats)._fast(Fraction::new(target_len as i64, len as i64))
            }
        })
        .collect();

    stack(layer_patterns)
}

// ============================================================================
// TIER 3: Nice to Have Operations
// ============================================================================

impl<T: Clone + Send + Sync + 'static> Pattern<T> {
    /// Take the first n steps from the pattern.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // sequence(0, 1, 2, 3, 4).take(2)
    /// ```
    pub fn take(&self, n: i64) -> Pattern<T> {
        if n == 0 {
            return silence();
        }

        let steps = self.steps().cloned().unwrap_or(Fraction::from_integer(1));
        let n_frac = Fraction::from_integer(n.abs());

        if n > 0 {
            // Take from left
            self.compress(&Fraction::from_integer(0), &(&n_frac / &steps))
        } else {
            // Take from right
            let start = &(Fraction::from_integer(1) - &n_frac / &steps);
            self.compress(start, &Fraction::from_integer(1))
        }
    }

    /// Drop the first n steps from the pattern.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // sequence(0, 1, 2, 3, 4).drop(2)
    /// ```
    pub fn drop_steps(&self, n: i64) -> Pattern<T> {
        if n == 0 {
            return self.clone();
        }

        let steps = self.steps().cloned().unwrap_or(Fraction::from_integer(1));
        let n_frac = Fraction::from_integer(n.abs());

        if n > 0 {
            // Drop from left
            let start = &n_frac / &steps;
            self.compress(&start, &Fraction::from_integer(1))
        } else {
            // Drop from right
            let end = Fraction::from_integer(1) - &n_frac / &steps;
            self.compress(&Fraction::from_integer(0), &end)
        }
    }

    /// Progressively shrink the pattern.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // sequence(0, 1, 2, 3, 4).shrink(1)
    /// ```
    pub fn shrink(&self, direction: i64) -> Pattern<T> {
        let steps = self.steps().cloned().unwrap_or(Fraction::from_integer(1));
        let n = steps.to_f64() as i64;

        if n <= 0 {
            return silence();
        }

        let mut patterns = Vec::new();
        for i in 0..n {
            let drop_count = if direction >= 0 { i } else { n - 1 - i };
            if direction >= 0 {
                patterns.push(self.drop_steps(drop_count));
            } else {
                patterns.push(self.drop_steps(-drop_count));
            }
        }

        fastcat(patterns)
    }

    /// Progressively grow the pattern.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // sequence(0, 1, 2, 3, 4).grow(1)
    /// ```
    pub fn grow(&self, direction: i64) -> Pattern<T> {
        let steps = self.steps().cloned().unwrap_or(Fraction::from_integer(1));
        let n = steps.to_f64() as i64;

        if n <= 0 {
            return silence();
        }

        let mut patterns = Vec::new();
        for i in 0..n {
            let take_count = i + 1;
            if direction >= 0 {
                patterns.push(self.take(take_count));
            } else {
                patterns.push(self.take(-take_count));
            }
        }

        fastcat(patterns)
    }

    /// Defragment touching haps with the same value.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // stack(pure('a').mask(1, 0), pure('a').mask(0, 1)).defragmentHaps()
    /// ```
    pub fn defragment_haps(&self) -> Pattern<T>
    where
        T: PartialEq,
    {
        let pat = self.clone();

        Pattern::new(move |state: &State| {
            let mut haps = pat.query(state);

            if haps.len() <= 1 {
                return haps;
            }

            // Sort by part begin
            haps.sort_by(|a, b| a.part.begin.cmp(&b.part.begin));

            let mut result = Vec::new();
            let mut current = haps.remove(0);

            for hap in haps {
                // Check if can merge: same whole, same value, touching parts
                let can_merge = current.whole == hap.whole
                    && current.value == hap.value
                    && current.part.end == hap.part.begin;

                if can_merge {
                    // Extend current
                    current = Hap::with_context(
                        current.whole,
                        TimeSpan::new(current.part.begin, hap.part.end),
                        current.value,
                        current.context,
                    );
                } else {
                    result.push(current);
                    current = hap;
                }
            }

            result.push(current);
            result
        })
    }
}

// ============================================================================
// Jux Operations (Tier 3)
// ============================================================================

/// Value type for stereo panning.
#[derive(Clone, Debug, PartialEq)]
pub struct PannedValue<T> {
    pub value: T,
    pub pan: f64,
}

impl<T: Clone + Send + Sync + 'static> Pattern<T> {
    /// Juxtapose - apply transformation and pan left/right.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // pure({ a: 1 }).jux(fast(2))
    /// ```
    pub fn jux<F>(&self, f: F) -> Pattern<PannedValue<T>>
    where
        F: Fn(&Pattern<T>) -> Pattern<T> + Send + Sync + 'static,
    {
        self.jux_by(1.0, f)
    }

    /// Juxtapose with custom pan amount.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // pure({ a: 1 }).juxBy(0.5, fast(2))
    /// ```
    pub fn jux_by<F>(&self, amount: f64, f: F) -> Pattern<PannedValue<T>>
    where
        F: Fn(&Pattern<T>) -> Pattern<T> + Send + Sync + 'static,
    {
        let left_pan = 0.5 - amount / 2.0;
        let right_pan = 0.5 + amount / 2.0;

        let left = self.fmap(move |v| PannedValue {
            value: v.clone(),
            pan: left_pan,
        });

        let right = f(self).fmap(move |v| PannedValue {
            value: v.clone(),
            pan: right_pan,
        });

        stack(vec![left, right])
    }
}

// ============================================================================
// Pick/Inhabit Operations (Tier 3)
// ============================================================================

impl Pattern<String> {
    /// Inhabit - replace string values with patterns from a map.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // sequence('a', 'b', stack('a', 'b')).inhabit({ a: sequence(1, 2), b: sequence(10, 20, 30) })
    /// ```
    pub fn inhabit<T: Clone + Send + Sync + 'static>(&self, patterns: HashMap<String, Pattern<T>>) -> Pattern<T> {
        let name_pat = self.clone();
        let patterns = Arc::new(patterns);

        name_pat.squeeze_join(move |name| {
            patterns.get(name).cloned().unwrap_or_else(silence)
        })
    }
}

impl Pattern<i64> {
    /// Pick - select patterns by index.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // sequence(0, 1, 0, stack(0, 1)).pick([sequence(1, 2, 3, 4), sequence(10, 20, 30, 40)])
    /// ```
    pub fn pick<T: Clone + Send + Sync + 'static>(&self, patterns: Vec<Pattern<T>>) -> Pattern<T> {
        if patterns.is_empty() {
            return silence();
        }

        let idx_pat = self.clone();
        let patterns = Arc::new(patterns);
        let len = patterns.len() as i64;

        idx_pat.squeeze_join(move |idx| {
            let clamped_idx = (*idx).max(0).min(len - 1) as usize;
            patterns.get(clamped_idx).cloned().unwrap_or_else(silence)
        })
    }

    /// Pickmod - select patterns by index with modulo wrapping.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // sequence(0, 1, 2, 3).pickmod([sequence(1, 2, 3, 4), sequence(10, 20, 30, 40)])
    /// ```
    pub fn pickmod<T: Clone + Send + Sync + 'static>(&self, patterns: Vec<Pattern<T>>) -> Pattern<T> {
        if patterns.is_empty() {
            return silence();
        }

        let idx_pat = self.clone();
        let patterns = Arc::new(patterns);
        let len = patterns.len() as i64;

        idx_pat.squeeze_join(move |idx| {
            let wrapped_idx = ((*idx % len + len) % len) as usize;
            patterns.get(wrapped_idx).cloned().unwrap_or_else(silence)
        })
    }
}

// ============================================================================
// Bite/Unjoin/Into Operations (Tier 3)
// ============================================================================

impl<T: Clone + Send + Sync + 'static> Pattern<T> {
    /// Bite into the pattern - slice and rearrange.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // fastcat(slowcat('a', 'b'), slowcat(1, 2)).bite(2, sequence(0, 1))
    /// ```
    pub fn bite(&self, n: i64, index_pat: &Pattern<i64>) -> Pattern<T> {
        let pat = self.clone();
        let index_pat = index_pat.clone();
        let n_frac = Fraction::from_integer(n);

        index_pat.squeeze_join(move |idx| {
            let idx_frac = Fraction::from_integer(*idx);
            let start = &idx_frac / &n_frac;
            let end = (&idx_frac + Fraction::from_integer(1)) / &n_frac;
            pat.compress(&start, &end)
        })
    }

    /// Apply function to subcycles of the pattern.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // fastcat('a', 'b', 'c', 'd').into(fastcat(fastcat(true, true), true), fast(2))
    /// ```
    pub fn into_subcycles<F>(&self, struct_pat: &Pattern<bool>, f: F) -> Pattern<T>
    where
        F: Fn(&Pattern<T>) -> Pattern<T> + Send + Sync + Clone + 'static,
    {
        let pat = self.clone();
        let struct_pat = struct_pat.clone();

        Pattern::new(move |state: &State| {
            let struct_haps: Vec<_> = struct_pat
                .query(state)
                .into_iter()
                .filter(|h| h.has_onset())
                .collect();

            let mut result = Vec::new();

            for struct_hap in struct_haps {
                let span = struct_hap.whole_or_part();
                let sub_pat = pat.focus_span(span);
                let transformed = f(&sub_pat);
                let focused_back = transformed.focus_span(span);

                for hap in focused_back.query(state) {
                    if let Some(part) = hap.part.intersection(&struct_hap.part) {
                        result.push(Hap::with_context(
                            hap.whole,
                            part,
                            hap.value.clone(),
                            hap.context,
                        ));
                    }
                }
            }

            result
        })
    }

    /// Chunk into subcycles.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // fastcat('a', 'b', 'c').chunkInto(3, fast(2)).fast(3)
    /// ```
    pub fn chunk_into<F>(&self, n: i64, f: F) -> Pattern<T>
    where
        F: Fn(&Pattern<T>) -> Pattern<T> + Send + Sync + Clone + 'static,
    {
        let pat = self.clone();
        let f = Arc::new(f);

        Pattern::new(move |state: &State| {
            let f = f.clone();
            state
                .span
                .span_cycles()
                .into_iter()
                .flat_map(|cycle_span| {
                    let cycle = cycle_span.begin.floor().to_f64() as i64;
                    let chunk_idx = cycle % n;
                    let f = f.clone();

                    // Create boolean pattern for this chunk
                    let mut bools = vec![pure(false); n as usize];
                    bools[chunk_idx as usize] = pure(true);
                    let struct_pat = fastcat(bools);

                    pat.into_subcycles(&struct_pat, move |p| f(p))
                        .query(&state.set_span(cycle_span))
                })
                .collect()
        })
    }

    /// Chunk into subcycles backwards.
    ///
    /// # Example (Strudel equivalent)
    /// ```ignore
    /// // fastcat('a', 'b', 'c').chunkBackInto(3, fast(2)).fast(3)
    /// ```
    pub fn chunk_back_into<F>(&self, n: i64, f: F) -> Pattern<T>
    where
        F: Fn(&Pattern<T>) -> Pattern<T> + Send + Sync + Clone + 'static,
    {
        let pat = self.clone();
        let f = Arc::new(f);

        Pattern::new(move |state: &State| {
            let f = f.clone();
            state
                .span
                .span_cycles()
                .into_iter()
                .flat_map(|cycle_span| {
                    let cycle = cycle_span.begin.floor().to_f64() as i64;
                    let chunk_idx = (n - 1 - (cycle % n)).max(0) as usize;
                    let f = f.clone();

                    // Create boolean pattern for this chunk
                    let mut bools = vec![pure(false); n as usize];
                    bools[chunk_idx] = pure(true);
                    let struct_pat = fastcat(bools);

                    pat.into_subcycles(&struct_pat, move |p| f(p))
                        .query(&state.set_span(cycle_span))
                })
                .collect()
        })
    }
}


// ============================================================================
// Additional Helper Methods
// ============================================================================

impl<T: Clone + Send + Sync + 'static> Pattern<T> {
    /// Sort haps by their part begin time.
    pub fn sort_haps_by_part(&self) -> Pattern<T> {
        let pat = self.clone();

        Pattern::new(move |state: &State| {
            let mut haps = pat.query(state);
            haps.sort_by(|a, b| a.part.begin.cmp(&b.part.begin));
            haps
        })
    }

    /// Get values from first cycle as a simple vec (for testing).
    pub fn first_cycle_values(&self) -> Vec<T> {
        self.query_arc(Fraction::from_integer(0), Fraction::from_integer(1))
            .into_iter()
            .map(|h| h.value)
            .collect()
    }
}
