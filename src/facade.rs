//! [`AnimSystem`]: a thin facade wrapping [`CompactingPoolManager`] and
//! [`FrameOrchestrator`] behind the ownership/lifecycle API described in
//! spec §6 — setup/discard, label-scoped creation, and the per-frame
//! `new_frame -> add_active_instance* -> evaluate` sequence.
//!
//! The original engine exposes this as a set of static methods over a
//! process-wide singleton (`Anim::Setup` / `Anim::Discard`); the idiomatic
//! Rust shape is an owned struct the host constructs and holds, with
//! `discard` consuming its internal state rather than freeing a global.

use crate::errors::Result;
use crate::frame::{FrameOrchestrator, SkinMatrixInfo};
use crate::id::AnimId;
use crate::manager::CompactingPoolManager;
use crate::registry::{Label, Locator};
use crate::sequencer::AnimJobId;
use crate::setup::{AnimInstanceSetup, AnimJob, AnimLibrarySetup, AnimSetup, AnimSkeletonSetup};
use crate::types::{AnimLibrary, AnimSkeleton};

struct State {
    manager: CompactingPoolManager,
    frame: FrameOrchestrator,
}

/// The animation runtime: pools, registry, sequencers and the per-frame
/// skin-matrix table, behind a single owned handle.
///
/// `AnimSystem` has no `Default`: it only exists once [`AnimSystem::setup`]
/// has run, mirroring the teacher's explicit `setup`/`discard` pair instead
/// of treating an unconfigured instance as a usable-but-empty one.
#[derive(Default)]
pub struct AnimSystem {
    state: Option<State>,
}

impl AnimSystem {
    /// Builds a fresh runtime from `setup`. Calling this again on an
    /// already-set-up system replaces its state (dropping everything the
    /// old one owned); callers that want explicit teardown should call
    /// [`AnimSystem::discard`] first.
    #[must_use]
    pub fn setup(setup: &AnimSetup) -> Self {
        AnimSystem {
            state: Some(State {
                manager: CompactingPoolManager::new(setup),
                frame: FrameOrchestrator::new(setup),
            }),
        }
    }

    /// Tears down the runtime, dropping every pool and resource it owned.
    pub fn discard(&mut self) {
        self.state = None;
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.state.is_some()
    }

    fn state(&self) -> &State {
        self.state.as_ref().expect("AnimSystem used before setup or after discard")
    }

    fn state_mut(&mut self) -> &mut State {
        self.state.as_mut().expect("AnimSystem used before setup or after discard")
    }

    // -- resource labels --------------------------------------------------

    /// Generates a fresh label and pushes it; resources created before the
    /// matching [`AnimSystem::pop_label`] are tagged with it.
    pub fn push_label(&mut self) -> Label {
        self.state_mut().manager.labels.push_new()
    }

    /// Pushes a caller-supplied label.
    pub fn push_label_value(&mut self, label: Label) {
        self.state_mut().manager.labels.push(label);
    }

    pub fn pop_label(&mut self) -> Label {
        self.state_mut().manager.labels.pop()
    }

    // -- creation / lookup / destruction -----------------------------------

    pub fn create_library(&mut self, setup: &AnimLibrarySetup) -> Result<AnimId> {
        self.state_mut().manager.create_library(setup)
    }

    pub fn create_skeleton(&mut self, setup: &AnimSkeletonSetup) -> Result<AnimId> {
        self.state_mut().manager.create_skeleton(setup)
    }

    pub fn create_instance(&mut self, setup: &AnimInstanceSetup) -> Result<AnimId> {
        self.state_mut().manager.create_instance(setup.library, setup.skeleton)
    }

    #[must_use]
    pub fn lookup(&self, locator: &str) -> Option<AnimId> {
        self.state().manager.registry.lookup(Locator::new(locator))
    }

    /// Destroys every resource registered under `label` (or every
    /// resource, for [`Label::ALL`]).
    pub fn destroy(&mut self, label: Label) {
        self.state_mut().manager.destroy(label);
    }

    #[must_use]
    pub fn has_library(&self, id: AnimId) -> bool {
        self.state().manager.has_library(id)
    }

    #[must_use]
    pub fn library(&self, id: AnimId) -> &AnimLibrary {
        self.state().manager.library(id)
    }

    #[must_use]
    pub fn has_skeleton(&self, id: AnimId) -> bool {
        self.state().manager.has_skeleton(id)
    }

    #[must_use]
    pub fn skeleton(&self, id: AnimId) -> &AnimSkeleton {
        self.state().manager.skeleton(id)
    }

    /// Overwrites a library's entire key buffer verbatim. A no-op, with a
    /// warning logged by the manager, when `library_id` doesn't resolve.
    pub fn write_keys(&mut self, library_id: AnimId, data: &[i16]) -> Result<()> {
        self.state_mut().manager.write_keys(library_id, data)
    }

    // -- per-frame sequence -------------------------------------------------

    pub fn new_frame(&mut self) {
        self.state_mut().frame.new_frame();
    }

    /// Admits `id` as active for the current frame. Must only be called
    /// between [`AnimSystem::new_frame`] and [`AnimSystem::evaluate`].
    pub fn add_active_instance(&mut self, id: AnimId) -> bool {
        let state = self.state_mut();
        state.frame.add_active_instance(&mut state.manager, id)
    }

    pub fn evaluate(&mut self, frame_duration_seconds: f64) {
        let state = self.state_mut();
        state.frame.evaluate(&mut state.manager, frame_duration_seconds);
    }

    #[must_use]
    pub fn skin_matrix_table(&self) -> &[f32] {
        self.state().frame.skin_matrix_table()
    }

    #[must_use]
    pub fn skin_matrix_table_byte_size(&self) -> usize {
        self.state().frame.skin_matrix_table_byte_size()
    }

    #[must_use]
    pub fn skin_matrix_infos(&self) -> &[SkinMatrixInfo] {
        self.state().frame.skin_matrix_infos()
    }

    /// This frame's sampled-and-mixed pose for `id`; empty if `id` wasn't
    /// admitted via [`AnimSystem::add_active_instance`] this frame.
    #[must_use]
    pub fn instance_samples(&self, id: AnimId) -> &[f32] {
        self.state().frame.instance_samples(&self.state().manager, id)
    }

    // -- playback -----------------------------------------------------------

    pub fn play(&mut self, instance: AnimId, job: &AnimJob) -> AnimJobId {
        let state = self.state_mut();
        state.frame.play(&mut state.manager, instance, job)
    }

    pub fn stop(&mut self, instance: AnimId, job_id: AnimJobId, allow_fade_out: bool) {
        let state = self.state_mut();
        state.frame.stop(&mut state.manager, instance, job_id, allow_fade_out);
    }

    pub fn stop_track(&mut self, instance: AnimId, track_index: i32, allow_fade_out: bool) {
        let state = self.state_mut();
        state.frame.stop_track(&mut state.manager, instance, track_index, allow_fade_out);
    }

    pub fn stop_all(&mut self, instance: AnimId, allow_fade_out: bool) {
        let state = self.state_mut();
        state.frame.stop_all(&mut state.manager, instance, allow_fade_out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::{AnimClipSetup, AnimCurveSetup};
    use crate::types::CurveFormat;

    fn small_setup() -> AnimSetup {
        AnimSetup {
            max_num_libs: 4,
            max_num_skeletons: 4,
            max_num_instances: 16,
            max_num_active_instances: 8,
            clip_pool_capacity: 16,
            curve_pool_capacity: 64,
            key_pool_capacity: 4096,
            sample_pool_capacity: 4096,
            matrix_pool_capacity: 256,
            skin_matrix_table_width: 64,
            skin_matrix_table_height: 8,
            resource_label_stack_capacity: 16,
            resource_registry_capacity: 16,
            max_bones: 16,
        }
    }

    fn float_clip_library(locator: &str) -> AnimLibrarySetup {
        AnimLibrarySetup {
            locator: locator.to_string(),
            curve_layout: vec![CurveFormat::Float],
            clips: vec![AnimClipSetup {
                name: "clip0".to_string(),
                length: 2,
                key_duration: 1.0,
                curves: vec![AnimCurveSetup {
                    is_static: false,
                    static_value: [0.0, 0.0, 0.0, 0.0],
                    magnitude: [32767.0, 0.0, 0.0, 0.0],
                }],
            }],
        }
    }

    #[test]
    fn is_valid_tracks_setup_and_discard() {
        let mut sys = AnimSystem::default();
        assert!(!sys.is_valid());
        sys = AnimSystem::setup(&small_setup());
        assert!(sys.is_valid());
        sys.discard();
        assert!(!sys.is_valid());
    }

    #[test]
    fn label_push_pop_roundtrips() {
        let mut sys = AnimSystem::setup(&small_setup());
        let label = sys.push_label();
        assert_eq!(sys.pop_label(), label);
    }

    #[test]
    fn full_frame_cycle_samples_and_advances_time() {
        let mut sys = AnimSystem::setup(&small_setup());
        let lib = sys.create_library(&float_clip_library("walk")).unwrap();
        let inst = sys
            .create_instance(&AnimInstanceSetup { library: lib, skeleton: None })
            .unwrap();
        sys.play(
            inst,
            &AnimJob {
                clip_index: 0,
                duration: 0.0,
                ..AnimJob::default()
            },
        );

        sys.new_frame();
        assert!(sys.add_active_instance(inst));
        sys.evaluate(1.0 / 60.0);

        assert_eq!(sys.instance_samples(inst).len(), 1);
    }

    #[test]
    fn unknown_library_id_returns_shared_empty_default() {
        let sys = AnimSystem::setup(&small_setup());
        let lib = sys.library(AnimId::INVALID);
        assert_eq!(lib.sample_stride, 0);
    }

    #[test]
    fn destroy_by_label_removes_resources_created_under_it() {
        let mut sys = AnimSystem::setup(&small_setup());
        let label = sys.push_label();
        let lib = sys.create_library(&float_clip_library("batch")).unwrap();
        sys.pop_label();
        assert!(sys.has_library(lib));
        sys.destroy(label);
        assert!(!sys.has_library(lib));
    }
}
