//! Frame-source abstraction.
//!
//! The physical capture driver lives outside this workspace; the session
//! recorder only needs something that provides frames on demand and is
//! released when dropped. Two in-tree sources cover testing and camera-less
//! deployments.

use std::collections::VecDeque;
use std::time::Instant;

use thiserror::Error;

use crate::frame::Frame;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("capture device not found: {0}")]
    DeviceNotFound(String),
    #[error("capture device busy")]
    DeviceBusy,
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    /// The source has no more frames to give. The recorder treats this as a
    /// normal end of the capture window, not a failure.
    #[error("frame stream ended")]
    StreamEnded,
}

/// Provides frames on demand for one capture session.
///
/// A source is exclusively owned by the session loop for its duration and
/// released on drop, on every exit path.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Frame, CaptureError>;

    /// Discard `count` frames, letting device-side gain control settle.
    /// Errors during warm-up are ignored, as the frames would be anyway.
    fn warm_up(&mut self, count: usize) {
        for _ in 0..count {
            let _ = self.next_frame();
        }
        if count > 0 {
            tracing::debug!(count, "warm-up frames discarded");
        }
    }
}

/// Endless flat-gray frames. Stands in for a camera on hosts without one,
/// pairing with the synthetic backend for end-to-end pipeline runs.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    level: u8,
    sequence: u32,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, level: u8) -> Self {
        Self {
            width,
            height,
            level,
            sequence: 0,
        }
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        let frame = Frame {
            data: vec![self.level; (self.width * self.height) as usize],
            width: self.width,
            height: self.height,
            timestamp: Instant::now(),
            sequence: self.sequence,
        };
        self.sequence = self.sequence.wrapping_add(1);
        Ok(frame)
    }
}

/// Replays a fixed frame list, then reports `StreamEnded`. Used by the
/// recorder tests so capture windows finish without waiting out the clock.
pub struct ScriptedSource {
    frames: VecDeque<Frame>,
}

impl ScriptedSource {
    pub fn new<I: IntoIterator<Item = Frame>>(frames: I) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    /// `count` blank frames of the given size.
    pub fn blank(count: usize, width: u32, height: u32) -> Self {
        Self::new((0..count).map(|i| Frame {
            data: vec![0u8; (width * height) as usize],
            width,
            height,
            timestamp: Instant::now(),
            sequence: i as u32,
        }))
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        self.frames.pop_front().ok_or(CaptureError::StreamEnded)
    }
}
