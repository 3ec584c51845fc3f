//! Common types, traits, and error definitions for rust_footstep_planning
//!
//! Sides, pose helpers and the planner-facing traits shared by the one-shot
//! and anytime planners.

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
