//! The public entry sequence `new_frame -> add_active_instance* -> evaluate`.
//!
//! Owns the current time, the per-frame sample arena, the list of active
//! instances, and the skin-matrix table that instances with a skeleton are
//! assigned a slice of.

use smallvec::SmallVec;

use crate::id::AnimId;
use crate::manager::CompactingPoolManager;
use crate::pools::Arena;
use crate::sequencer::{AnimJobId, LibrarySampler};
use crate::setup::{AnimJob, AnimSetup};
use crate::skin;
use crate::slice::Slice;
use crate::types::Clip;

/// Shader-sampling hint for one active instance's skin matrices: texel
/// coordinates into the skin-matrix table, plus the table width (`z`) a
/// shader needs to turn a bone index into a texel offset.
#[derive(Debug, Clone, Copy)]
pub struct SkinMatrixInfo {
    pub instance: AnimId,
    pub u: f32,
    pub v: f32,
    pub z: f32,
}

/// Owns the per-frame allocations: the sample arena, the active-instance
/// list, and the skin-matrix table.
pub struct FrameOrchestrator {
    max_active_instances: usize,
    current_time: f64,
    in_frame: bool,
    active_instances: SmallVec<[AnimId; 32]>,
    samples: Arena<f32>,
    skin_table: Vec<f32>,
    /// Vec4-columns per row of the skin-matrix table.
    table_width: usize,
    table_height: usize,
    /// Floats per row, i.e. `table_width * 4`.
    row_stride: usize,
    cursor_row: usize,
    /// Cursor column, in "pixels" (groups of 4 floats).
    cursor_col: usize,
    table_byte_size: usize,
    infos: Vec<SkinMatrixInfo>,
    next_job_id: u64,
}

impl FrameOrchestrator {
    #[must_use]
    pub fn new(setup: &AnimSetup) -> Self {
        let table_width = setup.skin_matrix_table_width;
        let table_height = setup.skin_matrix_table_height;
        let row_stride = table_width * 4;
        FrameOrchestrator {
            max_active_instances: setup.max_num_active_instances,
            current_time: 0.0,
            in_frame: false,
            active_instances: SmallVec::new(),
            samples: Arena::new(setup.sample_pool_capacity),
            skin_table: vec![0.0; row_stride * table_height],
            table_width,
            table_height,
            row_stride,
            cursor_row: 0,
            cursor_col: 0,
            table_byte_size: 0,
            infos: Vec::with_capacity(setup.max_num_active_instances),
            next_job_id: 1,
        }
    }

    #[must_use]
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    #[must_use]
    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    #[must_use]
    pub fn skin_matrix_table(&self) -> &[f32] {
        &self.skin_table
    }

    #[must_use]
    pub fn skin_matrix_table_byte_size(&self) -> usize {
        self.table_byte_size
    }

    #[must_use]
    pub fn skin_matrix_infos(&self) -> &[SkinMatrixInfo] {
        &self.infos
    }

    #[must_use]
    pub fn samples(&self) -> &[f32] {
        self.samples.read(Slice::new(0, self.samples.used()))
    }

    #[must_use]
    pub fn instance_samples(&self, manager: &CompactingPoolManager, id: AnimId) -> &[f32] {
        match manager.instance(id) {
            Some(instance) => self.samples.read(instance.samples),
            None => &[],
        }
    }

    /// Resets every per-frame allocation: the active-instance list, the
    /// sample-arena used counter, the skin-matrix cursor, and the
    /// skin-matrix info list. Sets `in_frame`.
    pub fn new_frame(&mut self) {
        self.active_instances.clear();
        self.samples.reset();
        self.cursor_row = 0;
        self.cursor_col = 0;
        self.table_byte_size = 0;
        self.infos.clear();
        self.in_frame = true;
    }

    /// Admits `id` as active for this frame: reserves its sample slice and,
    /// if it has a skeleton, a run of skin-matrix table "pixels". Fails
    /// without partial effect if the active-instance list, sample arena, or
    /// skin-matrix table has no room.
    pub fn add_active_instance(&mut self, manager: &mut CompactingPoolManager, id: AnimId) -> bool {
        debug_assert!(self.in_frame, "add_active_instance called outside a frame");

        if self.active_instances.len() >= self.max_active_instances {
            return false;
        }
        let Some(instance) = manager.instance(id) else {
            return false;
        };
        let library = manager.library(instance.library);
        let sample_stride = library.sample_stride;
        if self.samples.remaining() < sample_stride {
            return false;
        }

        let bone_pixels = instance.skeleton.map(|skel_id| manager.skeleton(skel_id).num_bones * 3);
        if let Some(pixels) = bone_pixels {
            let fits_current_row = self.cursor_col + pixels <= self.table_width;
            if !fits_current_row && self.cursor_row + 1 >= self.table_height {
                return false;
            }
        }

        self.active_instances.push(id);
        let samples_slice = self.samples.reserve(sample_stride);

        let mut skin_slice = Slice::empty();
        if let Some(pixels) = bone_pixels {
            if self.cursor_col + pixels > self.table_width {
                self.cursor_col = 0;
                self.cursor_row += 1;
            }
            let offset = self.cursor_row * self.row_stride + self.cursor_col * 4;
            skin_slice = Slice::new(offset, pixels * 4);

            let half_u = 0.5 / self.table_width as f32;
            let half_v = 0.5 / self.table_height as f32;
            self.infos.push(SkinMatrixInfo {
                instance: id,
                u: (self.cursor_col as f32 / self.table_width as f32) + half_u,
                v: (self.cursor_row as f32 / self.table_height as f32) + half_v,
                z: self.table_width as f32,
            });

            self.cursor_col += pixels;
            self.table_byte_size = (self.cursor_row + 1) * self.row_stride * 4;
        }

        let instance_mut = manager.instance_mut(id).expect("looked up above");
        instance_mut.samples = samples_slice;
        instance_mut.skin_matrices = skin_slice;
        true
    }

    /// Garbage-collects, samples and mixes, then builds skin matrices for
    /// every active instance, in that order, then advances `current_time` by
    /// `frame_duration` and clears `in_frame`.
    pub fn evaluate(&mut self, manager: &mut CompactingPoolManager, frame_duration: f64) {
        debug_assert!(self.in_frame, "evaluate called outside a frame");
        let current_time = self.current_time;

        for &id in &self.active_instances {
            if let Some(instance) = manager.instance_mut(id) {
                instance.sequencer.garbage_collect(current_time);
            }
        }
        for i in 0..self.active_instances.len() {
            let id = self.active_instances[i];
            self.eval_instance(manager, id, current_time);
        }
        for i in 0..self.active_instances.len() {
            let id = self.active_instances[i];
            self.build_skin_for_instance(manager, id);
        }

        self.current_time += frame_duration;
        self.in_frame = false;
    }

    fn eval_instance(&mut self, manager: &CompactingPoolManager, id: AnimId, current_time: f64) {
        let Some(instance) = manager.instance(id) else { return };
        let library = manager.library(instance.library);
        let sampler = LibrarySampler {
            clips: manager.clip_pool().slice(library.clips),
            curve_pool: manager.curve_pool(),
            key_arena: manager.key_arena(),
        };
        let mut buf = vec![0.0f32; library.sample_stride];
        instance.sequencer.eval(&sampler, current_time, &mut buf);
        self.samples.write(instance.samples, &buf);
    }

    fn build_skin_for_instance(&mut self, manager: &CompactingPoolManager, id: AnimId) {
        let Some(instance) = manager.instance(id) else { return };
        let Some(skel_id) = instance.skeleton else { return };
        if instance.skin_matrices.is_empty() {
            return;
        }
        let samples = self.samples.read(instance.samples);
        let skeleton = manager.skeleton(skel_id);
        let mut out = vec![0.0f32; instance.skin_matrices.len];
        skin::build_skin_matrices(skeleton, manager.matrix_pool(), samples, &mut out);
        let dest = instance.skin_matrices;
        self.skin_table[dest.start..dest.end()].copy_from_slice(&out);
    }

    /// Garbage-collects the instance's sequencer, allocates a job id, and
    /// schedules `job` on it. Returns `AnimJobId::INVALID` if the instance
    /// doesn't resolve or its sequencer is full.
    pub fn play(&mut self, manager: &mut CompactingPoolManager, instance_id: AnimId, job: &AnimJob) -> AnimJobId {
        let Some(instance) = manager.instance_mut(instance_id) else {
            return AnimJobId::INVALID;
        };
        instance.sequencer.garbage_collect(self.current_time);
        let library_id = instance.library;

        let library = manager.library(library_id);
        let clip_duration = manager
            .clip_pool()
            .slice(library.clips)
            .get(job.clip_index)
            .map(Clip::duration)
            .unwrap_or(0.0);

        let job_id = AnimJobId::from_raw(self.next_job_id);
        self.next_job_id += 1;

        let instance = manager.instance_mut(instance_id).expect("looked up above");
        if instance.sequencer.add(self.current_time, job_id, job, clip_duration) {
            job_id
        } else {
            AnimJobId::INVALID
        }
    }

    pub fn stop(&mut self, manager: &mut CompactingPoolManager, instance_id: AnimId, job_id: AnimJobId, allow_fade_out: bool) {
        let Some(instance) = manager.instance_mut(instance_id) else { return };
        instance.sequencer.stop(self.current_time, job_id, allow_fade_out);
        instance.sequencer.garbage_collect(self.current_time);
    }

    pub fn stop_track(&mut self, manager: &mut CompactingPoolManager, instance_id: AnimId, track_index: i32, allow_fade_out: bool) {
        let Some(instance) = manager.instance_mut(instance_id) else { return };
        instance.sequencer.stop_track(self.current_time, track_index, allow_fade_out);
        instance.sequencer.garbage_collect(self.current_time);
    }

    pub fn stop_all(&mut self, manager: &mut CompactingPoolManager, instance_id: AnimId, allow_fade_out: bool) {
        let Some(instance) = manager.instance_mut(instance_id) else { return };
        instance.sequencer.stop_all(self.current_time, allow_fade_out);
        instance.sequencer.garbage_collect(self.current_time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::{AnimBoneSetup, AnimSkeletonSetup};

    fn setup() -> AnimSetup {
        AnimSetup {
            max_num_libs: 2,
            max_num_skeletons: 2,
            max_num_instances: 8,
            max_num_active_instances: 4,
            clip_pool_capacity: 8,
            curve_pool_capacity: 32,
            key_pool_capacity: 1024,
            sample_pool_capacity: 4096,
            matrix_pool_capacity: 1024,
            skin_matrix_table_width: 1024,
            skin_matrix_table_height: 64,
            ..AnimSetup::default()
        }
    }

    fn bone(parent: i32) -> AnimBoneSetup {
        AnimBoneSetup {
            parent_index: parent,
            bind_pose: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
            inv_bind_pose: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
        }
    }

    fn skeleton_setup(name: &str, num_bones: usize) -> AnimSkeletonSetup {
        AnimSkeletonSetup {
            locator: name.to_string(),
            bones: (0..num_bones).map(|_| bone(-1)).collect(),
        }
    }

    #[test]
    fn skin_matrix_table_wraps_to_next_row_when_full() {
        let mut mgr = CompactingPoolManager::new(&setup());
        let mut frame = FrameOrchestrator::new(&setup());
        let skel = mgr.create_skeleton(&skeleton_setup("skel", 100)).unwrap();
        let lib = mgr
            .create_library(&crate::setup::AnimLibrarySetup {
                locator: "lib".to_string(),
                curve_layout: vec![],
                clips: vec![crate::setup::AnimClipSetup {
                    name: "c".to_string(),
                    length: 1,
                    key_duration: 1.0,
                    curves: vec![],
                }],
            })
            .unwrap();

        frame.new_frame();
        let mut last = true;
        for _ in 0..4 {
            let inst = mgr.create_instance(lib, Some(skel)).unwrap();
            last = frame.add_active_instance(&mut mgr, inst);
        }
        assert!(last);
        // 4th instance (300 cols each) can't fit at col 900 in a 1024-wide
        // row, so it wraps to row 1.
        assert_eq!(frame.skin_matrix_table_byte_size(), 2 * frame.row_stride * 4);
    }

    #[test]
    fn evaluate_advances_time_and_clears_in_frame_flag() {
        let mut mgr = CompactingPoolManager::new(&setup());
        let mut frame = FrameOrchestrator::new(&setup());
        frame.new_frame();
        assert!(frame.in_frame());
        frame.evaluate(&mut mgr, 1.0 / 60.0);
        assert!(!frame.in_frame());
        assert!((frame.current_time() - 1.0 / 60.0).abs() < 1e-9);
    }
}
