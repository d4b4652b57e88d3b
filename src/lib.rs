//! Pooled, priority-blending skeletal animation runtime.
//!
//! Libraries own contiguous ranges in a handful of shared pools (clips,
//! curves, keys, bind-pose matrices); destroying a library compacts those
//! pools in place and rewrites every surviving owner's range descriptor.
//! Each animation instance carries its own [`sequencer::Sequencer`], a
//! bounded, track-and-time-ordered list of scheduled clip playbacks that
//! mixes by priority with fade envelopes. [`frame::FrameOrchestrator`] drives
//! the per-frame `new_frame -> add_active_instance* -> evaluate` sequence,
//! sampling curves into a shared arena and, for instances with a skeleton,
//! composing bone hierarchies into transposed skin matrices ready for GPU
//! upload via [`skin::build_skin_matrices`].
//!
//! The public entry point is [`facade::AnimSystem`].
//!
//! ```
//! use anim_core::{AnimInstanceSetup, AnimJob, AnimSetup, AnimSystem};
//!
//! let mut anim = AnimSystem::setup(&AnimSetup::default());
//! // anim.create_library(...), anim.create_instance(...), anim.play(...)
//! anim.new_frame();
//! // anim.add_active_instance(instance_id);
//! anim.evaluate(1.0 / 60.0);
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]

pub mod errors;
pub mod facade;
pub mod frame;
pub mod id;
pub mod manager;
pub mod pools;
pub mod registry;
pub mod sequencer;
pub mod setup;
pub mod skin;
pub mod slice;
pub mod types;
pub mod utils;

pub use errors::{AnimError, Result};
pub use facade::AnimSystem;
pub use frame::SkinMatrixInfo;
pub use id::{AnimId, ResourceType};
pub use registry::{Label, Locator};
pub use sequencer::AnimJobId;
pub use setup::{
    AnimBoneSetup, AnimClipSetup, AnimCurveSetup, AnimInstanceSetup, AnimJob, AnimLibrarySetup, AnimSetup,
    AnimSkeletonSetup,
};
pub use types::{AnimLibrary, AnimSkeleton, Clip, Curve, CurveFormat};
pub use utils::interner;
