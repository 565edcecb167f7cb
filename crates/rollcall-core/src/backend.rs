//! Recognition backend contract.
//!
//! The detection/embedding/classification algorithm itself lives outside this
//! workspace. Everything here treats it as an opaque engine that, once loaded,
//! answers `detect(frame)` and `predict(face)`.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("model artifact not found: {0}")]
    ArtifactNotFound(String),
    #[error("backend load failed: {0}")]
    LoadFailed(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
}

/// Bounding box for a detected face, in pixel coordinates of the source frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Raw classifier output for one face.
///
/// `confidence` is a distance-style score: lower means a closer match. A
/// backend that could not classify the face at all reports `label: None`.
#[derive(Debug, Clone, Copy)]
pub struct Prediction {
    pub label: Option<u32>,
    pub confidence: f32,
}

/// Opaque face-identification engine.
///
/// Frames are 8-bit grayscale, `width * height` bytes, matching the capture
/// layer's output. Implementations must be shareable across threads: the
/// loader publishes one handle to every caller in the process.
pub trait RecognitionBackend: Send + Sync {
    /// Find faces in a frame. An empty result is not an error.
    fn detect(&self, gray: &[u8], width: u32, height: u32)
        -> Result<Vec<BoundingBox>, BackendError>;

    /// Classify one detected face region.
    fn predict(
        &self,
        gray: &[u8],
        width: u32,
        height: u32,
        face: &BoundingBox,
    ) -> Result<Prediction, BackendError>;
}

/// Backend that never sees a face. Lets the full pipeline run end-to-end
/// (sessions, persistence, aggregation) on hosts without a trained model.
pub struct SyntheticBackend;

impl RecognitionBackend for SyntheticBackend {
    fn detect(
        &self,
        _gray: &[u8],
        _width: u32,
        _height: u32,
    ) -> Result<Vec<BoundingBox>, BackendError> {
        Ok(Vec::new())
    }

    fn predict(
        &self,
        _gray: &[u8],
        _width: u32,
        _height: u32,
        _face: &BoundingBox,
    ) -> Result<Prediction, BackendError> {
        Ok(Prediction {
            label: None,
            confidence: f32::MAX,
        })
    }
}

/// Scripted backend for exercising the capture/resolution pipeline.
///
/// Each `detect` call pops one frame's worth of scripted faces; `predict`
/// answers with the prediction scripted for that face. Once the script is
/// exhausted, `detect` reports no faces.
pub struct ScriptedBackend {
    frames: Mutex<VecDeque<Vec<(BoundingBox, Prediction)>>>,
    pending: Mutex<VecDeque<Prediction>>,
}

impl ScriptedBackend {
    pub fn new<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = Vec<(BoundingBox, Prediction)>>,
    {
        Self {
            frames: Mutex::new(frames.into_iter().collect()),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// A frame script where every face sits in a unit box; only the
    /// predictions matter to the resolution pipeline.
    pub fn from_predictions<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = Vec<Prediction>>,
    {
        let boxed = frames.into_iter().map(|preds| {
            preds
                .into_iter()
                .map(|p| {
                    (
                        BoundingBox {
                            x: 0.0,
                            y: 0.0,
                            width: 1.0,
                            height: 1.0,
                        },
                        p,
                    )
                })
                .collect()
        });
        Self::new(boxed)
    }
}

impl RecognitionBackend for ScriptedBackend {
    fn detect(
        &self,
        _gray: &[u8],
        _width: u32,
        _height: u32,
    ) -> Result<Vec<BoundingBox>, BackendError> {
        let mut frames = self.frames.lock().unwrap_or_else(|e| e.into_inner());
        let Some(faces) = frames.pop_front() else {
            return Ok(Vec::new());
        };
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let boxes = faces.iter().map(|(b, _)| *b).collect();
        pending.extend(faces.into_iter().map(|(_, p)| p));
        Ok(boxes)
    }

    fn predict(
        &self,
        _gray: &[u8],
        _width: u32,
        _height: u32,
        _face: &BoundingBox,
    ) -> Result<Prediction, BackendError> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.pop_front().ok_or_else(|| {
            BackendError::InferenceFailed("predict called with no scripted face".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_backend_sees_nothing() {
        let backend = SyntheticBackend;
        let faces = backend.detect(&[0u8; 16], 4, 4).unwrap();
        assert!(faces.is_empty());
    }

    #[test]
    fn scripted_backend_replays_frames_in_order() {
        let backend = ScriptedBackend::from_predictions(vec![
            vec![Prediction { label: Some(0), confidence: 35.0 }],
            vec![],
            vec![Prediction { label: Some(1), confidence: 90.0 }],
        ]);

        let frame = [0u8; 16];
        let first = backend.detect(&frame, 4, 4).unwrap();
        assert_eq!(first.len(), 1);
        let pred = backend.predict(&frame, 4, 4, &first[0]).unwrap();
        assert_eq!(pred.label, Some(0));

        assert!(backend.detect(&frame, 4, 4).unwrap().is_empty());

        let third = backend.detect(&frame, 4, 4).unwrap();
        assert_eq!(third.len(), 1);
        let pred = backend.predict(&frame, 4, 4, &third[0]).unwrap();
        assert_eq!(pred.label, Some(1));

        // Script exhausted: quiet frames from here on.
        assert!(backend.detect(&frame, 4, 4).unwrap().is_empty());
    }
}
