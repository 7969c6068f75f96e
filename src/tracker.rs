use crate::detector::{downsample, FaceDetector};
use crate::error::{Error, Result};
use crate::geometry::{FaceRect, Point};
use crate::intensity::IntensityImage;
use crate::landmarks_file::{FrameLandmarks, LandmarkWriter};
use crate::rotation::Rotation;
use crate::shape_predictor::ShapePredictor;
use opencv::core::{self, Scalar};
use opencv::imgproc;
use opencv::prelude::*;
use std::io::Write;
use std::ops::ControlFlow;

pub const DEFAULT_DOWNSAMPLE_RATIO: f64 = 0.5;

/// Where the predictor looks in each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegionMode {
    /// First face found on a downsampled copy of the frame.
    #[default]
    Detect,
    /// The whole frame.
    FullFrame,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
    rotation: Rotation,
    mode: RegionMode,
    downsample_ratio: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            rotation: Rotation::None,
            mode: RegionMode::Detect,
            downsample_ratio: DEFAULT_DOWNSAMPLE_RATIO,
        }
    }
}

impl TrackerConfig {
    pub fn new(rotation: Rotation, mode: RegionMode, downsample_ratio: f64) -> Result<Self> {
        if !(downsample_ratio > 0.0 && downsample_ratio <= 1.0) {
            return Err(Error::InvalidDownsampleRatio(downsample_ratio));
        }
        Ok(Self {
            rotation,
            mode,
            downsample_ratio,
        })
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn mode(&self) -> RegionMode {
        self.mode
    }

    pub fn downsample_ratio(&self) -> f64 {
        self.downsample_ratio
    }
}

pub struct ProcessedFrame {
    pub index: u64,
    pub faces_detected: usize,
    pub region: Option<FaceRect>,
    pub landmarks: Option<Vec<Point>>,
    /// Rotated frame with the region and landmarks drawn on it.
    pub annotated: Mat,
}

impl ProcessedFrame {
    pub fn to_landmarks(&self) -> FrameLandmarks {
        FrameLandmarks::new(self.index, self.landmarks.clone().unwrap_or_default())
    }
}

pub struct LandmarkTracker<D: FaceDetector> {
    detector: D,
    predictor: ShapePredictor,
    config: TrackerConfig,
    frame_index: u64,
}

impl<D: FaceDetector> LandmarkTracker<D> {
    pub fn new(detector: D, predictor: ShapePredictor, config: TrackerConfig) -> Self {
        Self {
            detector,
            predictor,
            config,
            frame_index: 0,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn process_frame(&mut self, frame: &Mat) -> Result<ProcessedFrame> {
        let index = self.frame_index;
        self.frame_index += 1;

        let mut frame = self.config.rotation.apply(frame)?;

        let (faces_detected, region) = match self.config.mode {
            RegionMode::FullFrame => (1, Some(FaceRect::full_frame(frame.cols(), frame.rows()))),
            RegionMode::Detect => {
                let ratio = self.config.downsample_ratio;
                let small = downsample(&frame, ratio)?;
                let faces = self.detector.detect(&small)?;
                (faces.len(), faces.first().map(|face| face.upscale(ratio)))
            }
        };

        let landmarks = match &region {
            Some(region) => {
                let image = IntensityImage::from_mat(&frame)?;
                Some(self.predictor.predict(&image, region))
            }
            None => None,
        };

        if self.config.mode == RegionMode::Detect {
            if let Some(region) = &region {
                let green = Scalar::new(0.0, 255.0, 0.0, 0.0);
                imgproc::rectangle_def(&mut frame, region.to_cv(), green)?;
            }
        }
        for point in landmarks.iter().flatten() {
            let center = core::Point {
                x: point.x as i32,
                y: point.y as i32,
            };
            imgproc::circle_def(&mut frame, center, 2, Scalar::new(0.0, 0.0, 255.0, 0.0))?;
        }

        Ok(ProcessedFrame {
            index,
            faces_detected,
            region,
            landmarks,
            annotated: frame,
        })
    }

    /// Processes `frames` until they run out or `on_frame` breaks, writing one
    /// landmark line per frame. The writer is finished and handed back.
    pub fn run<I, W, F>(
        &mut self,
        frames: I,
        mut writer: LandmarkWriter<W>,
        mut on_frame: F,
    ) -> Result<W>
    where
        I: IntoIterator<Item = Result<Mat>>,
        W: Write,
        F: FnMut(&ProcessedFrame) -> Result<ControlFlow<()>>,
    {
        let mut frames = frames.into_iter();
        loop {
            let frame = match frames.next() {
                Some(frame) => frame?,
                None => {
                    tracing::info!("Unable to retrieve frame from video stream.");
                    break;
                }
            };

            let processed = self.process_frame(&frame)?;
            match self.config.mode {
                RegionMode::FullFrame => tracing::info!("Frame {}", processed.index),
                RegionMode::Detect => tracing::info!(
                    "Frame {}: {} face(s) detected",
                    processed.index,
                    processed.faces_detected
                ),
            }
            writer.write_frame(&processed.to_landmarks())?;

            if on_frame(&processed)?.is_break() {
                tracing::info!("stopped after frame {}", processed.index);
                break;
            }
        }

        tracing::info!("wrote landmarks for {} frames", writer.frames_written());
        writer.finish()
    }
}
