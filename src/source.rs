use crate::error::{Error, Result};
use opencv::prelude::*;
use opencv::videoio;

/// Frames from a video file, stream URL or camera.
pub struct VideoSource {
    capture: videoio::VideoCapture,
    name: String,
}

impl VideoSource {
    /// Opens `source`. A plain non-negative integer selects a camera index,
    /// anything else is handed to OpenCV as a file name or stream URL.
    pub fn open(source: &str) -> Result<Self> {
        let capture = match source.parse::<i32>() {
            Ok(index) if index >= 0 => videoio::VideoCapture::new(index, videoio::CAP_ANY)?,
            _ => videoio::VideoCapture::from_file(source, videoio::CAP_ANY)?,
        };
        if !capture.is_opened()? {
            return Err(Error::SourceUnavailable(source.to_owned()));
        }
        tracing::info!("opened video source {}", source);
        Ok(Self {
            capture,
            name: source.to_owned(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Next frame, or `None` once the source is exhausted or can no longer be read.
    pub fn next_frame(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }

    /// Iterates over [`Self::next_frame`] until it yields `None`.
    pub fn frames(&mut self) -> impl Iterator<Item = Result<Mat>> + '_ {
        std::iter::from_fn(move || self.next_frame().transpose())
    }

    /// Total frame count reported by the backend. Cameras usually report nothing.
    pub fn frame_count(&self) -> Result<Option<u64>> {
        let count = self.capture.get(videoio::CAP_PROP_FRAME_COUNT)?;
        Ok((count > 0.0).then_some(count as u64))
    }

    pub fn fps(&self) -> Result<Option<f64>> {
        let fps = self.capture.get(videoio::CAP_PROP_FPS)?;
        Ok((fps > 0.0).then_some(fps))
    }
}
