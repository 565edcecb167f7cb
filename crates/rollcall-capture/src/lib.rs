//! Frame type and frame-source abstraction.
//!
//! The physical camera driver is an external collaborator; sessions consume
//! any [`FrameSource`] that provides grayscale frames on demand.

pub mod frame;
pub mod source;

pub use frame::Frame;
pub use source::{CaptureError, FrameSource, ScriptedSource, SyntheticSource};
