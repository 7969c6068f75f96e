use crate::error::{Error, Result};
use opencv::core;
use opencv::prelude::*;

/// Orientation correction applied to every frame before detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Clockwise,
    UpsideDown,
    CounterClockwise,
}

impl Rotation {
    /// Maps the command line flag: 0 none, 1 clockwise, 2 180 degrees,
    /// 3 counter-clockwise.
    pub fn from_flag(flag: u8) -> Result<Self> {
        match flag {
            0 => Ok(Rotation::None),
            1 => Ok(Rotation::Clockwise),
            2 => Ok(Rotation::UpsideDown),
            3 => Ok(Rotation::CounterClockwise),
            other => Err(Error::InvalidRotation(other)),
        }
    }

    pub fn flag(&self) -> u8 {
        match self {
            Rotation::None => 0,
            Rotation::Clockwise => 1,
            Rotation::UpsideDown => 2,
            Rotation::CounterClockwise => 3,
        }
    }

    pub fn rotated_size(&self, width: i32, height: i32) -> (i32, i32) {
        match self {
            Rotation::None | Rotation::UpsideDown => (width, height),
            Rotation::Clockwise | Rotation::CounterClockwise => (height, width),
        }
    }

    pub fn apply(&self, frame: &Mat) -> Result<Mat> {
        let mut rotated = Mat::default();
        match self {
            Rotation::None => return Ok(frame.try_clone()?),
            Rotation::Clockwise => {
                let mut transposed = Mat::default();
                core::transpose(frame, &mut transposed)?;
                // transpose + flip around the y axis
                core::flip(&transposed, &mut rotated, 1)?;
            }
            Rotation::UpsideDown => {
                core::flip(frame, &mut rotated, -1)?;
            }
            Rotation::CounterClockwise => {
                let mut transposed = Mat::default();
                core::transpose(frame, &mut transposed)?;
                // transpose + flip around the x axis
                core::flip(&transposed, &mut rotated, 0)?;
            }
        }
        Ok(rotated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Mat {
        Mat::from_slice_2d(&[[1u8, 2, 3], [4, 5, 6]]).unwrap()
    }

    fn rows(mat: &Mat) -> Vec<Vec<u8>> {
        (0..mat.rows())
            .map(|r| {
                (0..mat.cols())
                    .map(|c| *mat.at_2d::<u8>(r, c).unwrap())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn flags_round_trip() {
        for flag in 0..4 {
            assert_eq!(Rotation::from_flag(flag).unwrap().flag(), flag);
        }
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert!(matches!(
            Rotation::from_flag(4),
            Err(Error::InvalidRotation(4))
        ));
    }

    #[test]
    fn none_copies_frame() {
        let rotated = Rotation::None.apply(&sample()).unwrap();
        assert_eq!(rows(&rotated), vec![vec![1, 2, 3], vec![4, 5, 6]]);
    }

    #[test]
    fn clockwise() {
        let rotated = Rotation::Clockwise.apply(&sample()).unwrap();
        assert_eq!(rows(&rotated), vec![vec![4, 1], vec![5, 2], vec![6, 3]]);
    }

    #[test]
    fn upside_down() {
        let rotated = Rotation::UpsideDown.apply(&sample()).unwrap();
        assert_eq!(rows(&rotated), vec![vec![6, 5, 4], vec![3, 2, 1]]);
    }

    #[test]
    fn counter_clockwise() {
        let rotated = Rotation::CounterClockwise.apply(&sample()).unwrap();
        assert_eq!(rows(&rotated), vec![vec![3, 6], vec![2, 5], vec![1, 4]]);
    }

    #[test]
    fn rotated_size_swaps_for_quarter_turns() {
        assert_eq!(Rotation::Clockwise.rotated_size(640, 480), (480, 640));
        assert_eq!(Rotation::UpsideDown.rotated_size(640, 480), (640, 480));
    }
}
