//! Converts a per-instance sample vector plus a skeleton's bind pose into
//! transposed 4x3 skin matrices ready for GPU upload.

use glam::{Affine3A, Mat3A, Quat, Vec3, Vec3A};
use smallvec::SmallVec;

use crate::pools::{FixedPool, Mat4x3};
use crate::types::{AnimSkeleton, MAX_BONES};

/// Floats per bone in a sample vector: translation(3) + quaternion(4) + scale(3).
pub const SAMPLE_STRIDE_PER_BONE: usize = 10;
/// Floats per bone in the output skin-matrix table.
pub const SKIN_MATRIX_STRIDE_PER_BONE: usize = 12;

fn mat4x3_to_affine(m: Mat4x3) -> Affine3A {
    Affine3A {
        matrix3: Mat3A::from_cols(
            Vec3A::new(m[0], m[1], m[2]),
            Vec3A::new(m[3], m[4], m[5]),
            Vec3A::new(m[6], m[7], m[8]),
        ),
        translation: Vec3A::new(m[9], m[10], m[11]),
    }
}

/// Writes `m` into `out` as three rows of four floats: for each axis, the
/// corresponding component of every column followed by that axis's
/// translation. This is the transpose GPU vertex shaders expect when
/// sampling three `vec4` rows to rebuild a 4x3 matrix.
fn write_transposed(m: &Affine3A, out: &mut [f32]) {
    let cols = [m.matrix3.x_axis, m.matrix3.y_axis, m.matrix3.z_axis];
    out[0] = cols[0].x;
    out[1] = cols[1].x;
    out[2] = cols[2].x;
    out[3] = m.translation.x;
    out[4] = cols[0].y;
    out[5] = cols[1].y;
    out[6] = cols[2].y;
    out[7] = m.translation.y;
    out[8] = cols[0].z;
    out[9] = cols[1].z;
    out[10] = cols[2].z;
    out[11] = m.translation.z;
}

/// Builds every bone's skin matrix for one instance, in hierarchy order
/// (relies on the invariant `parent[i] < i`).
///
/// `samples` must hold `skeleton.num_bones * SAMPLE_STRIDE_PER_BONE` floats;
/// `out_skin_matrices` must hold `skeleton.num_bones * SKIN_MATRIX_STRIDE_PER_BONE`.
///
/// All math is single-precision; quaternions are used exactly as sampled,
/// with no renormalization or orthogonalization.
pub fn build_skin_matrices(
    skeleton: &AnimSkeleton,
    matrix_pool: &FixedPool<Mat4x3>,
    samples: &[f32],
    out_skin_matrices: &mut [f32],
) {
    debug_assert_eq!(samples.len(), skeleton.num_bones * SAMPLE_STRIDE_PER_BONE);
    debug_assert_eq!(out_skin_matrices.len(), skeleton.num_bones * SKIN_MATRIX_STRIDE_PER_BONE);

    let inv_bind_pose = matrix_pool.slice(skeleton.inv_bind_pose);
    let mut world_cache: SmallVec<[Affine3A; MAX_BONES]> = SmallVec::with_capacity(skeleton.num_bones);

    for bone_index in 0..skeleton.num_bones {
        let smp = &samples[bone_index * SAMPLE_STRIDE_PER_BONE..(bone_index + 1) * SAMPLE_STRIDE_PER_BONE];
        let translation = Vec3::new(smp[0], smp[1], smp[2]);
        let rotation = Quat::from_xyzw(smp[3], smp[4], smp[5], smp[6]);
        let scale = Vec3::new(smp[7], smp[8], smp[9]);
        let local = Affine3A::from_scale_rotation_translation(scale, rotation, translation);

        let parent_index = skeleton.parent_indices[bone_index];
        let world = if parent_index >= 0 {
            world_cache[parent_index as usize] * local
        } else {
            local
        };
        world_cache.push(world);

        let inv_bind = mat4x3_to_affine(inv_bind_pose[bone_index]);
        let skin = world * inv_bind;
        let out = &mut out_skin_matrices[bone_index * SKIN_MATRIX_STRIDE_PER_BONE..(bone_index + 1) * SKIN_MATRIX_STRIDE_PER_BONE];
        write_transposed(&skin, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slice::Slice;
    use smallvec::smallvec;

    fn identity_mat4x3() -> Mat4x3 {
        [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]
    }

    #[test]
    fn single_root_bone_with_identity_pose_yields_identity_skin() {
        let mut pool: FixedPool<Mat4x3> = FixedPool::new(4);
        let idx = pool.push(identity_mat4x3());
        let skeleton = AnimSkeleton {
            locator: None,
            num_bones: 1,
            matrices: Slice::new(idx, 1),
            bind_pose: Slice::new(idx, 1),
            inv_bind_pose: Slice::new(idx, 1),
            parent_indices: smallvec![-1],
        };
        // translation 0, identity quaternion, unit scale
        let samples = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        let mut out = [0.0; 12];
        build_skin_matrices(&skeleton, &pool, &samples, &mut out);
        assert_eq!(out, identity_mat4x3());
    }

    #[test]
    fn translation_propagates_through_parent_chain() {
        let mut pool: FixedPool<Mat4x3> = FixedPool::new(4);
        let idx0 = pool.push(identity_mat4x3());
        pool.push(identity_mat4x3());
        let skeleton = AnimSkeleton {
            locator: None,
            num_bones: 2,
            matrices: Slice::new(idx0, 2),
            bind_pose: Slice::new(idx0, 2),
            inv_bind_pose: Slice::new(idx0, 2),
            parent_indices: smallvec![-1, 0],
        };
        // root translated by (1,0,0); child translated by (0,1,0) locally
        let samples = [
            1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0,
            0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0,
        ];
        let mut out = [0.0; 24];
        build_skin_matrices(&skeleton, &pool, &samples, &mut out);
        // child's world translation (indices 3,7,11 of its 12-float block)
        let child = &out[12..24];
        assert!((child[3] - 1.0).abs() < 1e-6);
        assert!((child[7] - 1.0).abs() < 1e-6);
    }
}
