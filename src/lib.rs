//! 68-point face landmark detection over video streams.
//!
//! Frames come from [`VideoSource`], are rotated and searched for a face by a
//! [`FaceDetector`], and a dlib compatible [`ShapePredictor`] places the
//! landmarks. [`LandmarkTracker`] ties the steps together per frame and
//! [`LandmarkWriter`] records one text line per frame.

pub mod detector;
mod error;
pub mod geometry;
pub mod intensity;
pub mod landmarks_file;
pub mod rotation;
pub mod shape_predictor;
pub mod source;
pub mod tracker;

pub use detector::{CascadeDetector, FaceDetector};
pub use error::{Error, Result};
pub use geometry::{FaceRect, Point};
pub use intensity::IntensityImage;
pub use landmarks_file::{FrameLandmarks, LandmarkWriter};
pub use rotation::Rotation;
pub use shape_predictor::ShapePredictor;
pub use source::VideoSource;
pub use tracker::{LandmarkTracker, ProcessedFrame, RegionMode, TrackerConfig};
