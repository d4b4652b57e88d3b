//! Owns every pool the runtime allocates from and performs the in-place
//! compaction that keeps them defragmented as libraries and skeletons come
//! and go.

use log::{debug, warn};

use crate::errors::{AnimError, Result};
use crate::id::{AnimId, ResourceType, SlotPool};
use crate::pools::{Arena, FixedPool, Mat4x3};
use crate::registry::{Label, LabelStack, Locator, Registry};
use crate::setup::{AnimLibrarySetup, AnimSetup, AnimSkeletonSetup};
use crate::slice::Slice;
use crate::types::{AnimLibrary, AnimSkeleton, Clip, Curve, Instance};

/// `1 / 32767`, the scale a raw `i16` key is multiplied by before being
/// multiplied again by a curve's magnitude.
const I16_NORM: f32 = 1.0 / 32767.0;

pub struct CompactingPoolManager {
    pub registry: Registry,
    pub labels: LabelStack,
    libraries: SlotPool<AnimLibrary>,
    skeletons: SlotPool<AnimSkeleton>,
    instances: SlotPool<Instance>,
    clips: FixedPool<Clip>,
    curves: FixedPool<Curve>,
    matrices: FixedPool<Mat4x3>,
    keys: Arena<i16>,
    max_bones: usize,
}

impl CompactingPoolManager {
    #[must_use]
    pub fn new(setup: &AnimSetup) -> Self {
        CompactingPoolManager {
            registry: Registry::new(setup.resource_registry_capacity),
            labels: LabelStack::new(setup.resource_label_stack_capacity),
            libraries: SlotPool::new(ResourceType::Library, setup.max_num_libs),
            skeletons: SlotPool::new(ResourceType::Skeleton, setup.max_num_skeletons),
            instances: SlotPool::new(ResourceType::Instance, setup.max_num_instances),
            clips: FixedPool::new(setup.clip_pool_capacity),
            curves: FixedPool::new(setup.curve_pool_capacity),
            matrices: FixedPool::new(setup.matrix_pool_capacity),
            keys: Arena::new(setup.key_pool_capacity),
            max_bones: setup.max_bones,
        }
    }

    #[must_use]
    pub fn library(&self, id: AnimId) -> &AnimLibrary {
        self.libraries.get(id).unwrap_or_else(|| AnimLibrary::empty())
    }

    #[must_use]
    pub fn has_library(&self, id: AnimId) -> bool {
        self.libraries.get(id).is_some()
    }

    #[must_use]
    pub fn skeleton(&self, id: AnimId) -> &AnimSkeleton {
        self.skeletons.get(id).unwrap_or_else(|| AnimSkeleton::empty())
    }

    #[must_use]
    pub fn has_skeleton(&self, id: AnimId) -> bool {
        self.skeletons.get(id).is_some()
    }

    pub(crate) fn instance(&self, id: AnimId) -> Option<&Instance> {
        self.instances.get(id)
    }

    pub(crate) fn instance_mut(&mut self, id: AnimId) -> Option<&mut Instance> {
        self.instances.get_mut(id)
    }

    pub(crate) fn clip_pool(&self) -> &FixedPool<Clip> {
        &self.clips
    }

    pub(crate) fn curve_pool(&self) -> &FixedPool<Curve> {
        &self.curves
    }

    pub(crate) fn key_arena(&self) -> &Arena<i16> {
        &self.keys
    }

    pub(crate) fn matrix_pool(&self) -> &FixedPool<Mat4x3> {
        &self.matrices
    }

    pub(crate) fn instances_iter_mut(&mut self) -> impl Iterator<Item = (AnimId, &mut Instance)> {
        self.instances.iter_mut()
    }

    /// Looks up an existing library by locator, or validates and allocates a
    /// new one. Validation never mutates a pool: either every pool has room
    /// and every clip's curve count matches the library's layout, or nothing
    /// is allocated.
    pub fn create_library(&mut self, setup: &AnimLibrarySetup) -> Result<AnimId> {
        let locator = Locator::new(&setup.locator);
        if let Some(existing) = self.registry.lookup(locator) {
            return Ok(existing);
        }

        if self.clips.remaining() < setup.clips.len() {
            return Err(AnimError::PoolExhausted { pool: "clip" });
        }
        let needed_curves = setup.curve_layout.len() * setup.clips.len();
        if self.curves.remaining() < needed_curves {
            return Err(AnimError::PoolExhausted { pool: "curve" });
        }
        for clip in &setup.clips {
            if clip.curves.len() != setup.curve_layout.len() {
                return Err(AnimError::LayoutMismatch {
                    clip: clip.name.clone(),
                    expected: setup.curve_layout.len(),
                    found: clip.curves.len(),
                });
            }
        }
        let mut needed_keys = 0usize;
        for clip in &setup.clips {
            let key_stride: usize = clip
                .curves
                .iter()
                .zip(&setup.curve_layout)
                .filter(|(c, _)| !c.is_static)
                .map(|(_, fmt)| fmt.stride())
                .sum();
            needed_keys += key_stride * clip.length;
        }
        if self.keys.remaining() < needed_keys {
            return Err(AnimError::PoolExhausted { pool: "key" });
        }

        let clips_start = self.clips.len();
        let curves_start = self.curves.len();
        let keys_start = self.keys.used();
        let mut clip_index_map = std::collections::HashMap::with_capacity(setup.clips.len());

        for (clip_local_index, clip_setup) in setup.clips.iter().enumerate() {
            let clip_curves_start = self.curves.len();
            let mut new_curves = Vec::with_capacity(setup.curve_layout.len());
            let mut rest_row: Vec<i16> = Vec::new();
            let mut running_key_index = 0usize;
            for (curve_setup, format) in clip_setup.curves.iter().zip(&setup.curve_layout) {
                let magnitude = [
                    curve_setup.magnitude[0] * I16_NORM,
                    curve_setup.magnitude[1] * I16_NORM,
                    curve_setup.magnitude[2] * I16_NORM,
                    curve_setup.magnitude[3] * I16_NORM,
                ];
                let mut curve = Curve::new(*format, curve_setup.is_static, curve_setup.static_value, magnitude);
                if !curve_setup.is_static {
                    curve.key_index = running_key_index;
                    curve.key_stride = curve.num_values;
                    running_key_index += curve.num_values;
                    for c in 0..curve.num_values {
                        let mag = magnitude[c];
                        let raw = if mag.abs() > f32::EPSILON {
                            (curve_setup.static_value[c] / mag).round() as i16
                        } else {
                            0
                        };
                        rest_row.push(raw);
                    }
                }
                new_curves.push(curve);
            }
            let key_stride = running_key_index;
            let key_slice = self.keys.reserve(key_stride * clip_setup.length);
            if key_stride > 0 {
                let mut all = Vec::with_capacity(key_stride * clip_setup.length);
                for _ in 0..clip_setup.length {
                    all.extend_from_slice(&rest_row);
                }
                self.keys.write(key_slice, &all);
            }
            for curve in new_curves {
                self.curves.push(curve);
            }
            let clip_curves = Slice::new(clip_curves_start, setup.curve_layout.len());
            self.clips.push(Clip {
                name: clip_setup.name.clone(),
                length: clip_setup.length,
                key_duration: clip_setup.key_duration,
                key_stride,
                curves: clip_curves,
                keys: key_slice,
            });
            clip_index_map.insert(clip_setup.name.clone(), clip_local_index);
        }

        let sample_stride = setup.curve_layout.iter().map(|f| f.stride()).sum();
        let library = AnimLibrary {
            locator: Some(locator),
            curve_layout: setup.curve_layout.iter().copied().collect(),
            sample_stride,
            clips: Slice::new(clips_start, setup.clips.len()),
            curves: Slice::new(curves_start, self.curves.len() - curves_start),
            keys: Slice::new(keys_start, self.keys.used() - keys_start),
            clip_index_map,
        };
        let id = self
            .libraries
            .allocate(library)
            .expect("clip/curve/key capacity already validated above");
        self.registry.add(locator, id, self.labels.peek());
        debug!("created library {:?}", setup.locator);
        Ok(id)
    }

    pub fn create_skeleton(&mut self, setup: &AnimSkeletonSetup) -> Result<AnimId> {
        let locator = Locator::new(&setup.locator);
        if let Some(existing) = self.registry.lookup(locator) {
            return Ok(existing);
        }
        let num_bones = setup.bones.len();
        if num_bones > self.max_bones {
            return Err(AnimError::PoolExhausted { pool: "bone" });
        }
        if self.matrices.remaining() < num_bones * 2 {
            return Err(AnimError::PoolExhausted { pool: "matrix" });
        }

        let bind_start = self.matrices.len();
        for bone in &setup.bones {
            self.matrices.push(bone.bind_pose);
        }
        let inv_bind_start = self.matrices.len();
        for bone in &setup.bones {
            self.matrices.push(bone.inv_bind_pose);
        }
        let matrices = Slice::new(bind_start, num_bones * 2);
        let bind_pose = Slice::new(bind_start, num_bones);
        let inv_bind_pose = Slice::new(inv_bind_start, num_bones);

        let mut parent_indices = smallvec::SmallVec::with_capacity(num_bones);
        for (i, bone) in setup.bones.iter().enumerate() {
            debug_assert!(
                bone.parent_index < 0 || (bone.parent_index as usize) < i,
                "bone {i} has a parent index that is not strictly earlier in hierarchy order"
            );
            parent_indices.push(bone.parent_index);
        }

        let skeleton = AnimSkeleton {
            locator: Some(locator),
            num_bones,
            matrices,
            bind_pose,
            inv_bind_pose,
            parent_indices,
        };
        let id = self
            .skeletons
            .allocate(skeleton)
            .expect("matrix capacity already validated above");
        self.registry.add(locator, id, self.labels.peek());
        debug!("created skeleton {:?}", setup.locator);
        Ok(id)
    }

    pub fn create_instance(&mut self, library: AnimId, skeleton: Option<AnimId>) -> Result<AnimId> {
        if !self.has_library(library) {
            return Err(AnimError::UnknownLibrary);
        }
        if let Some(skel) = skeleton {
            if !self.has_skeleton(skel) {
                return Err(AnimError::UnknownSkeleton);
            }
        }
        let instance = Instance::new(library, skeleton);
        let id = self.instances.allocate(instance).ok_or(AnimError::PoolExhausted { pool: "instance" })?;
        self.registry.add(Locator::non_shared(), id, self.labels.peek());
        Ok(id)
    }

    /// Destroys every resource registered under `label` (every resource, for
    /// [`Label::ALL`]), dispatching by the type tag packed into each id.
    pub fn destroy(&mut self, label: Label) {
        for id in self.registry.remove(label) {
            match id.resource_type() {
                Some(ResourceType::Library) => self.destroy_library(id),
                Some(ResourceType::Skeleton) => self.destroy_skeleton(id),
                Some(ResourceType::Instance) => self.destroy_instance(id),
                None => {}
            }
        }
    }

    fn destroy_library(&mut self, id: AnimId) {
        let Some(lib) = self.libraries.free(id) else { return };
        self.remove_clips(lib.clips);
        self.remove_curves(lib.curves);
        self.remove_keys(lib.keys);
    }

    fn destroy_skeleton(&mut self, id: AnimId) {
        let Some(skel) = self.skeletons.free(id) else { return };
        self.remove_matrices(skel.matrices);
    }

    fn destroy_instance(&mut self, id: AnimId) {
        self.instances.free(id);
    }

    fn remove_clips(&mut self, removed: Slice) {
        self.clips.remove_range(removed);
        for (_, lib) in self.libraries.iter_mut() {
            lib.clips.fill_gap(removed);
        }
    }

    fn remove_curves(&mut self, removed: Slice) {
        self.curves.remove_range(removed);
        for (_, lib) in self.libraries.iter_mut() {
            lib.curves.fill_gap(removed);
        }
        for clip in self.clips.iter_mut() {
            clip.curves.fill_gap(removed);
        }
    }

    fn remove_keys(&mut self, removed: Slice) {
        self.keys.remove(removed);
        for (_, lib) in self.libraries.iter_mut() {
            lib.keys.fill_gap(removed);
        }
        for clip in self.clips.iter_mut() {
            clip.keys.fill_gap(removed);
        }
    }

    fn remove_matrices(&mut self, removed: Slice) {
        self.matrices.remove_range(removed);
        for (_, skel) in self.skeletons.iter_mut() {
            skel.matrices.fill_gap(removed);
            skel.bind_pose.fill_gap(removed);
            skel.inv_bind_pose.fill_gap(removed);
        }
    }

    /// Overwrites a library's entire key slice verbatim. A no-op, logged,
    /// when `library_id` doesn't resolve; an error if `data`'s length
    /// doesn't exactly match the library's key count.
    pub fn write_keys(&mut self, library_id: AnimId, data: &[i16]) -> Result<()> {
        let Some(lib) = self.libraries.get(library_id) else {
            warn!("write_keys: unknown library id");
            return Ok(());
        };
        if data.len() != lib.keys.len {
            return Err(AnimError::KeyByteCountMismatch { expected: lib.keys.len, found: data.len() });
        }
        self.keys.write(lib.keys, data);
        Ok(())
    }
}
