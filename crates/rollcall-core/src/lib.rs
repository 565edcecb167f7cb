//! Identity resolution and recognition-backend lifecycle.
//!
//! The recognition algorithm itself is an external collaborator behind the
//! [`RecognitionBackend`] trait; this crate owns everything around it: the
//! background loader with readiness semantics, the enrolled-identity types,
//! and the label-to-identity resolution policy.

pub mod backend;
pub mod identity;
pub mod loader;
pub mod resolver;

pub use backend::{
    BackendError, BoundingBox, Prediction, RecognitionBackend, ScriptedBackend, SyntheticBackend,
};
pub use identity::{Identity, LabelMap, Roster};
pub use loader::{LoaderError, ModelState, ResourceLoader, StatusReport};
pub use resolver::{resolve, Resolution, Strategy};
