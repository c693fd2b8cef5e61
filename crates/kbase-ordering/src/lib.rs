//! Manual ordering and root resolution for kbase documents.
//!
//! - [`positions`]: gap-sequenced positions per (account, category) scope
//! - [`roots`]: one-level duplicate groups

#![doc = include_str!("../README.md")]

pub mod positions;
pub mod roots;

pub use positions::{CategoryChange, POSITION_GAP, PositionManager};
pub use roots::RootResolver;
