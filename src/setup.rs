//! Setup/configuration structs passed into the facade's `create_*` and
//! `play` operations.

use crate::id::AnimId;
use crate::types::CurveFormat;

/// Process-wide configuration, supplied once to [`crate::facade::AnimSystem::setup`].
#[derive(Debug, Clone, Copy)]
pub struct AnimSetup {
    pub max_num_libs: usize,
    pub max_num_skeletons: usize,
    pub max_num_instances: usize,
    pub max_num_active_instances: usize,
    pub clip_pool_capacity: usize,
    pub curve_pool_capacity: usize,
    pub key_pool_capacity: usize,
    pub sample_pool_capacity: usize,
    pub matrix_pool_capacity: usize,
    pub skin_matrix_table_width: usize,
    pub skin_matrix_table_height: usize,
    pub resource_label_stack_capacity: usize,
    pub resource_registry_capacity: usize,
    pub max_bones: usize,
}

impl Default for AnimSetup {
    fn default() -> Self {
        let max_num_libs = 16;
        let clip_pool_capacity = max_num_libs * 64;
        let curve_pool_capacity = clip_pool_capacity * 256;
        AnimSetup {
            max_num_libs,
            max_num_skeletons: 16,
            max_num_instances: 128,
            max_num_active_instances: 128,
            clip_pool_capacity,
            curve_pool_capacity,
            key_pool_capacity: 4 * 1024 * 1024,
            sample_pool_capacity: 4 * 1024 * 1024,
            matrix_pool_capacity: 1024,
            skin_matrix_table_width: 1024,
            skin_matrix_table_height: 64,
            resource_label_stack_capacity: 256,
            resource_registry_capacity: 256,
            max_bones: 256,
        }
    }
}

/// Setup for a single curve within a clip.
#[derive(Debug, Clone, Copy)]
pub struct AnimCurveSetup {
    pub is_static: bool,
    pub static_value: [f32; 4],
    /// Raw (un-premultiplied) magnitude; the manager divides by 32767 when
    /// the library is created.
    pub magnitude: [f32; 4],
}

impl Default for AnimCurveSetup {
    fn default() -> Self {
        AnimCurveSetup {
            is_static: true,
            static_value: [0.0; 4],
            magnitude: [32767.0; 4],
        }
    }
}

/// Setup for a single clip: a named, fixed-length, fixed-cadence bundle of
/// curves.
#[derive(Debug, Clone)]
pub struct AnimClipSetup {
    pub name: String,
    pub length: usize,
    pub key_duration: f64,
    pub curves: Vec<AnimCurveSetup>,
}

/// Setup for an [`crate::types::AnimLibrary`].
#[derive(Debug, Clone)]
pub struct AnimLibrarySetup {
    pub locator: String,
    pub curve_layout: Vec<CurveFormat>,
    pub clips: Vec<AnimClipSetup>,
}

/// Setup for a single bone.
#[derive(Debug, Clone, Copy)]
pub struct AnimBoneSetup {
    pub parent_index: i32,
    /// Bind-pose, 4x3 (3 rotation/scale columns of 3 floats, then translation).
    pub bind_pose: [f32; 12],
    pub inv_bind_pose: [f32; 12],
}

/// Setup for an [`crate::types::AnimSkeleton`].
#[derive(Debug, Clone)]
pub struct AnimSkeletonSetup {
    pub locator: String,
    pub bones: Vec<AnimBoneSetup>,
}

/// Setup for an [`crate::types::Instance`].
#[derive(Debug, Clone, Copy)]
pub struct AnimInstanceSetup {
    pub library: AnimId,
    pub skeleton: Option<AnimId>,
}

/// A requested playback of a clip on an instance.
#[derive(Debug, Clone, Copy)]
pub struct AnimJob {
    /// Index into the instance's library clip slice.
    pub clip_index: usize,
    pub track_index: i32,
    pub mix_weight: f32,
    /// Relative to "now", in seconds.
    pub start_time: f64,
    /// `<= 0.0` means infinite duration.
    pub duration: f64,
    /// When true, `duration` is a loop count multiplied by the clip's
    /// duration rather than a length in seconds.
    pub duration_is_loop_count: bool,
    pub fade_in: f64,
    pub fade_out: f64,
}

impl Default for AnimJob {
    fn default() -> Self {
        AnimJob {
            clip_index: 0,
            track_index: 0,
            mix_weight: 1.0,
            start_time: 0.0,
            duration: 0.0,
            duration_is_loop_count: false,
            fade_in: 0.0,
            fade_out: 0.0,
        }
    }
}
