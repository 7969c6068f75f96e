use crate::error::{Error, Result};
use opencv::core::{self, Vec3b};
use opencv::prelude::*;

/// Row-major 8-bit intensity buffer sampled by the shape predictor.
#[derive(Debug, Clone)]
pub struct IntensityImage {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl IntensityImage {
    pub fn from_fn<F>(width: u32, height: u32, f: F) -> Self
    where
        F: Fn(u32, u32) -> u8,
    {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            data,
            width,
            height,
        }
    }

    /// Converts an 8-bit BGR or grayscale frame. Colour pixels become the mean
    /// of their three channels.
    pub fn from_mat(frame: &Mat) -> Result<Self> {
        let typ = frame.typ();
        let width = frame.cols();
        let height = frame.rows();
        let mut data = Vec::with_capacity(width as usize * height as usize);

        if typ == core::CV_8UC3 {
            for row in 0..height {
                for pixel in frame.at_row::<Vec3b>(row)? {
                    let [b, g, r] = pixel.0;
                    data.push(((u16::from(b) + u16::from(g) + u16::from(r)) / 3) as u8);
                }
            }
        } else if typ == core::CV_8UC1 {
            for row in 0..height {
                data.extend_from_slice(frame.at_row::<u8>(row)?);
            }
        } else {
            return Err(Error::UnsupportedFrame(typ));
        }

        Ok(Self {
            data,
            width: width as u32,
            height: height as u32,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn intensity(&self, x: i64, y: i64) -> Option<u8> {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return None;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }
}
