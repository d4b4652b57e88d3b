//! Data model: curves, clips, libraries, skeletons and instances.

use once_cell::sync::OnceCell;
use smallvec::SmallVec;

use crate::id::AnimId;
use crate::registry::Locator;
use crate::slice::Slice;

/// Max bones per skeleton (spec default; also the fixed capacity of
/// [`AnimSkeleton::parent_indices`]).
pub const MAX_BONES: usize = 256;

/// Shape of one animated channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveFormat {
    Float,
    Float2,
    Float3,
    Float4,
    Quaternion,
}

impl CurveFormat {
    /// Number of float components this format samples to.
    #[must_use]
    pub fn stride(self) -> usize {
        match self {
            CurveFormat::Float => 1,
            CurveFormat::Float2 => 2,
            CurveFormat::Float3 => 3,
            CurveFormat::Float4 | CurveFormat::Quaternion => 4,
        }
    }
}

/// One animated channel within a clip.
///
/// `static == true` iff `key_stride == 0`: a static curve consumes no key
/// storage and always samples its `static_value`.
#[derive(Debug, Clone, Copy)]
pub struct Curve {
    pub format: CurveFormat,
    pub is_static: bool,
    pub num_values: usize,
    pub static_value: [f32; 4],
    /// Per-component magnitude premultiplied by `1 / 32767`, used to
    /// dequantize `i16` keys: `value = i16_key as f32 * magnitude`.
    pub magnitude: [f32; 4],
    /// Offset of this curve's values within a row of its clip's key table.
    pub key_index: usize,
    /// Number of floats this curve contributes to a key-table row (0 when static).
    pub key_stride: usize,
}

impl Curve {
    #[must_use]
    pub(crate) fn new(format: CurveFormat, is_static: bool, static_value: [f32; 4], magnitude: [f32; 4]) -> Self {
        Curve {
            format,
            is_static,
            num_values: format.stride(),
            static_value,
            magnitude,
            key_index: 0,
            key_stride: 0,
        }
    }
}

/// A named bundle of curves sharing a length and key cadence.
#[derive(Debug, Clone)]
pub struct Clip {
    pub name: String,
    /// Number of rows in this clip's key table.
    pub length: usize,
    /// Duration in seconds of a single key row.
    pub key_duration: f64,
    /// Sum of `key_stride` across this clip's non-static curves.
    pub key_stride: usize,
    /// View into the library's curve pool.
    pub curves: Slice,
    /// View into the library's key arena: `key_stride * length` elements.
    pub keys: Slice,
}

impl Clip {
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.length as f64 * self.key_duration
    }
}

/// A collection of clips that all share the same ordered curve-format
/// layout.
#[derive(Debug, Clone, Default)]
pub struct AnimLibrary {
    pub locator: Option<Locator>,
    pub curve_layout: SmallVec<[CurveFormat; 16]>,
    /// Sum of `stride(fmt)` over `curve_layout`: size in floats of one
    /// sampled pose for this library.
    pub sample_stride: usize,
    pub clips: Slice,
    pub curves: Slice,
    pub keys: Slice,
    pub clip_index_map: std::collections::HashMap<String, usize>,
}

impl Default for CurveFormat {
    fn default() -> Self {
        CurveFormat::Float
    }
}

static EMPTY_LIBRARY: OnceCell<AnimLibrary> = OnceCell::new();

impl AnimLibrary {
    /// Shared empty instance returned by accessors when an id doesn't
    /// resolve, so callers reading fields see deterministic zeros instead of
    /// having to null-check.
    #[must_use]
    pub fn empty() -> &'static AnimLibrary {
        EMPTY_LIBRARY.get_or_init(AnimLibrary::default)
    }
}

/// A bone hierarchy with bind and inverse-bind poses.
#[derive(Debug, Clone, Default)]
pub struct AnimSkeleton {
    pub locator: Option<Locator>,
    pub num_bones: usize,
    /// View into the matrix pool: bind poses followed by inverse-bind poses.
    pub matrices: Slice,
    pub bind_pose: Slice,
    pub inv_bind_pose: Slice,
    /// `parent_indices[i] < i` for every bone; `-1` marks a root.
    pub parent_indices: SmallVec<[i32; MAX_BONES]>,
}

static EMPTY_SKELETON: OnceCell<AnimSkeleton> = OnceCell::new();

impl AnimSkeleton {
    #[must_use]
    pub fn empty() -> &'static AnimSkeleton {
        EMPTY_SKELETON.get_or_init(AnimSkeleton::default)
    }
}

/// A playable binding of a library with an optional skeleton.
///
/// Instances hold weak (id-based) references: destroying a library while an
/// instance still refers to it is a programming error the manager does not
/// police in release builds.
pub struct Instance {
    pub library: AnimId,
    pub skeleton: Option<AnimId>,
    pub sequencer: crate::sequencer::Sequencer,
    /// This frame's view into the shared sample arena; empty when inactive.
    pub samples: Slice,
    /// This frame's view into the skin-matrix table; empty when inactive or
    /// skeleton-less.
    pub skin_matrices: Slice,
}

impl Instance {
    #[must_use]
    pub(crate) fn new(library: AnimId, skeleton: Option<AnimId>) -> Self {
        Instance {
            library,
            skeleton,
            sequencer: crate::sequencer::Sequencer::new(),
            samples: Slice::empty(),
            skin_matrices: Slice::empty(),
        }
    }
}
