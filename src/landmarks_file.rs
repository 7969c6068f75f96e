use crate::error::{Error, Result};
use crate::geometry::Point;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const LANDMARKS_FILE_NAME: &str = "landmarks.txt";

/// One line of the landmarks file: `Frame <index>` followed by ` <x> <y>`
/// per landmark. Frames without a face carry no points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLandmarks {
    pub index: u64,
    pub points: Vec<Point>,
}

impl FrameLandmarks {
    pub fn new(index: u64, points: Vec<Point>) -> Self {
        Self { index, points }
    }

    pub fn empty(index: u64) -> Self {
        Self::new(index, Vec::new())
    }
}

impl fmt::Display for FrameLandmarks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame {}", self.index)?;
        for point in &self.points {
            write!(f, " {}", point)?;
        }
        Ok(())
    }
}

impl FromStr for FrameLandmarks {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let malformed = || Error::MalformedLandmarks(line.to_owned());
        let mut tokens = line.split_whitespace();

        if tokens.next() != Some("Frame") {
            return Err(malformed());
        }
        let index = tokens
            .next()
            .and_then(|token| token.parse::<u64>().ok())
            .ok_or_else(malformed)?;

        let coordinates = tokens
            .map(|token| token.parse::<i64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| malformed())?;
        if coordinates.len() % 2 != 0 {
            return Err(malformed());
        }

        let points = coordinates
            .chunks_exact(2)
            .map(|xy| Point::new(xy[0], xy[1]))
            .collect();
        Ok(Self { index, points })
    }
}

/// Appends one landmark line per frame.
pub struct LandmarkWriter<W: Write> {
    out: W,
    frames_written: u64,
}

impl LandmarkWriter<BufWriter<File>> {
    /// Creates `dir` if needed and starts a fresh `landmarks.txt` inside it.
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = landmarks_path(dir);
        let file = File::create(&path)?;
        tracing::info!("writing landmarks to {:?}", path);
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> LandmarkWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            frames_written: 0,
        }
    }

    /// Writes and flushes one line, so an interrupted run keeps every finished frame.
    pub fn write_frame(&mut self, frame: &FrameLandmarks) -> Result<()> {
        writeln!(self.out, "{}", frame)?;
        self.out.flush()?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

pub fn landmarks_path<P: AsRef<Path>>(dir: P) -> PathBuf {
    dir.as_ref().join(LANDMARKS_FILE_NAME)
}
