use crate::error::Result;
use crate::geometry::FaceRect;
use opencv::core::{self, Rect, Vector};
use opencv::prelude::*;
use opencv::{imgproc, objdetect};
use std::path::Path;

pub const DEFAULT_CASCADE: &str = "haarcascades/haarcascade_frontalface_alt.xml";

/// Locates faces in a frame. Boxes are returned in detector order; only the
/// first one is used for landmarks.
pub trait FaceDetector {
    fn detect(&mut self, frame: &Mat) -> Result<Vec<FaceRect>>;
}

/// Frontal face detector backed by an OpenCV Haar cascade.
pub struct CascadeDetector {
    classifier: objdetect::CascadeClassifier,
}

impl CascadeDetector {
    /// Loads `cascade` directly when it exists, otherwise looks it up among
    /// the OpenCV data files.
    pub fn new(cascade: &str) -> Result<Self> {
        let xml = if Path::new(cascade).exists() {
            cascade.to_owned()
        } else {
            core::find_file_def(cascade)?
        };
        tracing::debug!("loading face cascade {}", xml);
        let classifier = objdetect::CascadeClassifier::new(&xml)?;
        Ok(Self { classifier })
    }
}

impl FaceDetector for CascadeDetector {
    fn detect(&mut self, frame: &Mat) -> Result<Vec<FaceRect>> {
        let grayscale = convert_to_grayscale(frame)?;
        let mut faces: Vector<Rect> = Vector::new();

        self.classifier.detect_multi_scale(
            &grayscale,
            &mut faces,
            1.1,
            2,
            objdetect::CASCADE_SCALE_IMAGE,
            core::Size {
                width: 30,
                height: 30,
            },
            core::Size {
                width: 0,
                height: 0,
            },
        )?;
        Ok(faces.iter().map(FaceRect::from_cv).collect())
    }
}

pub fn convert_to_grayscale(image: &Mat) -> Result<Mat> {
    if image.channels() == 1 {
        return Ok(image.try_clone()?);
    }
    let mut gray: Mat = Mat::default();
    imgproc::cvt_color_def(image, &mut gray, imgproc::COLOR_BGR2GRAY)?;
    Ok(gray)
}

/// Shrinks `frame` by `ratio` in both dimensions.
pub fn downsample(frame: &Mat, ratio: f64) -> Result<Mat> {
    let mut small = Mat::default();
    imgproc::resize(
        frame,
        &mut small,
        core::Size::default(),
        ratio,
        ratio,
        imgproc::INTER_LINEAR,
    )?;
    Ok(small)
}
