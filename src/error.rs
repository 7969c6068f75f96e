use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OpenCV error {0}")]
    OpenCv(#[from] opencv::Error),

    #[error("invalid shape predictor model: {0}")]
    InvalidModel(String),

    #[error("failed to parse shape predictor model at byte {offset}: {kind:?}")]
    ModelParse {
        offset: usize,
        kind: nom::error::ErrorKind,
    },

    #[error("unable to open video source {0}")]
    SourceUnavailable(String),

    #[error("unknown rotation flag ({0}), expected 0, 1, 2 or 3")]
    InvalidRotation(u8),

    #[error("downsample ratio must be in (0, 1], got {0}")]
    InvalidDownsampleRatio(f64),

    #[error("unsupported frame type {0}, expected 8-bit BGR or grayscale")]
    UnsupportedFrame(i32),

    #[error("malformed landmarks line: {0}")]
    MalformedLandmarks(String),
}

pub type Result<T> = std::result::Result<T, Error>;
