//! Utility Module
//!
//! - [`interner`]: string interning for efficient [`Locator`](crate::registry::Locator) names.
//!
//! ```
//! use anim_core::utils::interner;
//!
//! let sym1 = interner::intern("walk_cycle");
//! let sym2 = interner::intern("walk_cycle");
//! assert_eq!(sym1, sym2); // O(1) comparison
//! ```

pub mod interner;

pub use interner::Symbol;
