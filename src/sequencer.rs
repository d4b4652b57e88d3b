//! Per-instance job scheduling: a bounded, track-and-time-ordered list of
//! playing clips, mixed with fade envelopes at query time.

use smallvec::SmallVec;

use crate::pools::{Arena, FixedPool};
use crate::setup::AnimJob;
use crate::slice::Slice;
use crate::types::{Clip, Curve};

/// Fixed capacity of a single instance's item list.
pub const MAX_ITEMS: usize = 16;

/// Handle returned by [`crate::facade::AnimSystem::play`]; `INVALID` signals
/// the sequencer was full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnimJobId(u64);

impl AnimJobId {
    pub const INVALID: AnimJobId = AnimJobId(0);

    #[must_use]
    pub(crate) fn from_raw(v: u64) -> Self {
        AnimJobId(v)
    }
}

/// One scheduled or running job.
#[derive(Debug, Clone, Copy)]
struct SequencerItem {
    id: AnimJobId,
    valid: bool,
    clip_index: usize,
    track_index: i32,
    mix_weight: f32,
    abs_start: f64,
    abs_fade_in: f64,
    abs_fade_out: f64,
    abs_end: f64,
}

fn check_validate(item: &mut SequencerItem) {
    if item.abs_start >= item.abs_end {
        item.valid = false;
    }
}

fn check_stop_item(current_time: f64, allow_fade_out: bool, item: &mut SequencerItem) {
    if current_time < item.abs_start {
        item.valid = false;
    } else if current_time < item.abs_end {
        if allow_fade_out {
            let fade_duration = item.abs_end - item.abs_fade_out;
            item.abs_fade_out = current_time;
            item.abs_end = current_time + fade_duration;
        } else {
            item.abs_fade_out = current_time;
            item.abs_end = current_time;
        }
        check_validate(item);
    }
}

/// Mixing weight for a fade-in or fade-out window; falls back to the start
/// weight when the window is degenerate (near-zero length).
fn fade_weight(w0: f32, w1: f32, t: f64, t0: f64, t1: f64) -> f32 {
    let dt = t1 - t0;
    if dt > -0.000_001 && dt < 0.000_001 {
        return w0;
    }
    let rt = ((t - t0) / (t1 - t0)) as f32;
    w0 + rt.clamp(0.0, 1.0) * (w1 - w0)
}

fn clamp_key_index(key_index: i64, clip_len: usize) -> usize {
    debug_assert!(clip_len > 0);
    let len = clip_len as i64;
    let mut k = key_index % len;
    if k < 0 {
        k += len;
    }
    k as usize
}

/// Read-only view of a library's clip/curve/key storage used by
/// [`Sequencer::eval`], scoped to a single `eval` call by the manager.
pub struct LibrarySampler<'a> {
    /// The library's own clips, i.e. `clip_pool.slice(library.clips)`.
    pub clips: &'a [Clip],
    pub curve_pool: &'a FixedPool<Curve>,
    pub key_arena: &'a Arena<i16>,
}

impl<'a> LibrarySampler<'a> {
    fn clip(&self, index: usize) -> &Clip {
        &self.clips[index]
    }

    fn curves(&self, clip: &Clip) -> &[Curve] {
        self.curve_pool.slice(clip.curves)
    }

    fn key_row(&self, clip: &Clip, key_index: usize) -> &[i16] {
        let start = clip.keys.start + key_index * clip.key_stride;
        self.key_arena.read(Slice::new(start, clip.key_stride))
    }
}

/// Bounded, per-instance list of scheduled jobs.
#[derive(Default)]
pub struct Sequencer {
    items: SmallVec<[SequencerItem; MAX_ITEMS]>,
}

impl Sequencer {
    #[must_use]
    pub fn new() -> Self {
        Sequencer { items: SmallVec::new() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Inserts a new job in `(track, abs_start)` order, clipping whichever
    /// same-track neighbors it overlaps. Returns `false` without effect if
    /// the list is already full.
    pub fn add(&mut self, current_time: f64, job_id: AnimJobId, job: &AnimJob, clip_duration: f64) -> bool {
        if self.items.len() >= MAX_ITEMS {
            return false;
        }

        let abs_start = current_time + job.start_time;
        let mut insert_index = self.items.len();
        for (i, cur) in self.items.iter().enumerate() {
            if !cur.valid {
                continue;
            }
            if job.track_index > cur.track_index {
                continue;
            }
            if job.track_index == cur.track_index && abs_start > cur.abs_start {
                continue;
            }
            insert_index = i;
            break;
        }

        let abs_fade_in = abs_start + job.fade_in;
        let (abs_end, abs_fade_out) = if job.duration > 0.0 {
            let end = if job.duration_is_loop_count {
                abs_start + job.duration * clip_duration
            } else {
                abs_start + job.duration
            };
            (end, end - job.fade_out)
        } else {
            (f64::INFINITY, f64::INFINITY)
        };

        let new_item = SequencerItem {
            id: job_id,
            valid: true,
            clip_index: job.clip_index,
            track_index: job.track_index,
            mix_weight: job.mix_weight,
            abs_start,
            abs_fade_in,
            abs_fade_out,
            abs_end,
        };
        self.items.insert(insert_index, new_item);

        for i in 0..self.items.len() {
            if i == insert_index || !self.items[i].valid || self.items[i].track_index != new_item.track_index {
                continue;
            }
            if i < insert_index && self.items[i].abs_end >= new_item.abs_fade_in {
                self.items[i].abs_end = new_item.abs_fade_in;
                self.items[i].abs_fade_out = new_item.abs_start;
            }
            if i > insert_index && self.items[i].abs_start <= new_item.abs_fade_out {
                self.items[i].abs_start = new_item.abs_fade_out;
                self.items[i].abs_fade_in = new_item.abs_end;
            }
            check_validate(&mut self.items[i]);
        }
        true
    }

    pub fn stop(&mut self, current_time: f64, job_id: AnimJobId, allow_fade_out: bool) {
        if let Some(item) = self.items.iter_mut().find(|item| item.id == job_id) {
            check_stop_item(current_time, allow_fade_out, item);
        }
    }

    pub fn stop_track(&mut self, current_time: f64, track_index: i32, allow_fade_out: bool) {
        for item in self.items.iter_mut().filter(|item| item.track_index == track_index) {
            check_stop_item(current_time, allow_fade_out, item);
        }
    }

    pub fn stop_all(&mut self, current_time: f64, allow_fade_out: bool) {
        for item in &mut self.items {
            check_stop_item(current_time, allow_fade_out, item);
        }
    }

    /// Removes every invalid or expired (`abs_end < current_time`) item.
    pub fn garbage_collect(&mut self, current_time: f64) {
        for i in (0..self.items.len()).rev() {
            if !self.items[i].valid || self.items[i].abs_end < current_time {
                self.items.remove(i);
            }
        }
    }

    /// Samples and mixes every active item into `out_samples`, which must be
    /// exactly `library.sample_stride` long. Returns `true` if at least one
    /// item contributed.
    pub fn eval(&self, library: &LibrarySampler, current_time: f64, out_samples: &mut [f32]) -> bool {
        let mut num_processed = 0usize;
        for item in &self.items {
            if !item.valid || item.abs_start > current_time || item.abs_end <= current_time {
                continue;
            }
            let clip = library.clip(item.clip_index);
            let curves = library.curves(clip);

            let (key0, key1, key_pos) = if clip.length > 0 {
                let clip_time = current_time - item.abs_start;
                let raw_key0 = (clip_time / clip.key_duration).floor() as i64;
                let key_pos = ((clip_time - raw_key0 as f64 * clip.key_duration) / clip.key_duration) as f32;
                (clamp_key_index(raw_key0, clip.length), clamp_key_index(raw_key0 + 1, clip.length), key_pos)
            } else {
                (0, 0, 0.0)
            };

            let (row0, row1) = if clip.keys.is_empty() {
                (None, None)
            } else {
                (Some(library.key_row(clip, key0)), Some(library.key_row(clip, key1)))
            };

            let mut dst = 0usize;
            if num_processed == 0 {
                for curve in curves {
                    if curve.is_static {
                        for c in 0..curve.num_values {
                            out_samples[dst] = curve.static_value[c];
                            dst += 1;
                        }
                    } else {
                        let r0 = row0.expect("non-static curve needs key rows");
                        let r1 = row1.expect("non-static curve needs key rows");
                        for c in 0..curve.num_values {
                            let v0 = f32::from(r0[curve.key_index + c]) * curve.magnitude[c];
                            let v1 = f32::from(r1[curve.key_index + c]) * curve.magnitude[c];
                            out_samples[dst] = v0 + (v1 - v0) * key_pos;
                            dst += 1;
                        }
                    }
                }
            } else {
                let mut weight = item.mix_weight;
                if current_time < item.abs_fade_in {
                    weight = fade_weight(0.0, weight, current_time, item.abs_start, item.abs_fade_in);
                } else if current_time > item.abs_fade_out {
                    weight = fade_weight(weight, 0.0, current_time, item.abs_fade_out, item.abs_end);
                }
                for curve in curves {
                    if curve.is_static {
                        for c in 0..curve.num_values {
                            let s0 = out_samples[dst];
                            let s1 = curve.static_value[c];
                            out_samples[dst] = s0 + (s1 - s0) * weight;
                            dst += 1;
                        }
                    } else {
                        let r0 = row0.expect("non-static curve needs key rows");
                        let r1 = row1.expect("non-static curve needs key rows");
                        for c in 0..curve.num_values {
                            let v0 = f32::from(r0[curve.key_index + c]) * curve.magnitude[c];
                            let v1 = f32::from(r1[curve.key_index + c]) * curve.magnitude[c];
                            let s0 = out_samples[dst];
                            let s1 = v0 + (v1 - v0) * key_pos;
                            out_samples[dst] = s0 + (s1 - s0) * weight;
                            dst += 1;
                        }
                    }
                }
            }
            num_processed += 1;
        }
        num_processed > 0
    }
}
