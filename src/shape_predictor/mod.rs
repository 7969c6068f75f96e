//! Ensemble of regression trees landmark predictor, compatible with dlib's
//! `shape_predictor_68_face_landmarks.dat`.

mod dlib;
mod transform;

pub use transform::{find_similarity_transform, PointTransformAffine};

#[cfg(test)]
pub(crate) use self::dlib::tests as test_models;

use bzip2::read::BzDecoder;
use nalgebra::{DVector, Vector2};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{Error, Result};
use crate::geometry::{FaceRect, Point};
use crate::intensity::IntensityImage;

fn location(shape: &DVector<f32>, idx: usize) -> Vector2<f32> {
    Vector2::new(shape[idx * 2], shape[idx * 2 + 1])
}

#[derive(Debug, Clone)]
struct SplitFeature {
    idx1: usize,
    idx2: usize,
    thresh: f32,
}

#[derive(Debug, Clone)]
struct RegressionTree {
    splits: Vec<SplitFeature>,
    leaf_values: Vec<DVector<f32>>,
}

impl RegressionTree {
    /// Walks the complete binary tree stored in `splits` and returns the leaf
    /// shape delta it lands on.
    fn leaf(&self, feature_pixel_values: &[f32]) -> &DVector<f32> {
        let mut i = 0;
        while i < self.splits.len() {
            let split = &self.splits[i];
            let diff = feature_pixel_values[split.idx1] - feature_pixel_values[split.idx2];
            i = if diff > split.thresh { 2 * i + 1 } else { 2 * i + 2 };
        }
        &self.leaf_values[i - self.splits.len()]
    }
}

/// Landmark regressor. Shapes are stored as interleaved `x, y` coordinates
/// normalized to the unit square of the face region.
#[derive(Debug, Clone)]
pub struct ShapePredictor {
    initial_shape: DVector<f32>,
    forests: Vec<Vec<RegressionTree>>,
    anchor_idx: Vec<Vec<usize>>,
    deltas: Vec<Vec<Vector2<f32>>>,
}

impl ShapePredictor {
    /// Loads a model serialized by dlib. Files ending in `.bz2` are
    /// decompressed first.
    pub fn from_dlib_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let mut bytes = Vec::new();
        if path.extension().is_some_and(|ext| ext == "bz2") {
            BzDecoder::new(reader).read_to_end(&mut bytes)?;
        } else {
            reader.read_to_end(&mut bytes)?;
        }

        let predictor = Self::from_dlib_bytes(&bytes)?;
        tracing::debug!(
            "loaded shape predictor {:?}: {} parts, {} cascades",
            path,
            predictor.num_parts(),
            predictor.num_cascades()
        );
        Ok(predictor)
    }

    pub fn from_dlib_bytes(bytes: &[u8]) -> Result<Self> {
        dlib::parse_shape_predictor(bytes)
    }

    pub fn num_parts(&self) -> usize {
        self.initial_shape.len() / 2
    }

    pub fn num_cascades(&self) -> usize {
        self.forests.len()
    }

    // https://github.com/davisking/dlib/blob/master/dlib/image_processing/shape_predictor.h
    /// Runs the cascade on `region` of `image` and returns one point per
    /// landmark in image coordinates.
    pub fn predict(&self, image: &IntensityImage, region: &FaceRect) -> Vec<Point> {
        let to_image = PointTransformAffine::unnormalizing(region);
        let mut current_shape = self.initial_shape.clone();
        let mut feature_pixel_values = Vec::new();

        for (iter, forest) in self.forests.iter().enumerate() {
            self.extract_feature_pixel_values(
                image,
                &to_image,
                &current_shape,
                iter,
                &mut feature_pixel_values,
            );
            for tree in forest {
                current_shape += tree.leaf(&feature_pixel_values);
            }
        }

        (0..self.num_parts())
            .map(|i| {
                let p = to_image.apply(location(&current_shape, i).cast::<f64>());
                Point::rounded(p.x, p.y)
            })
            .collect()
    }

    fn extract_feature_pixel_values(
        &self,
        image: &IntensityImage,
        to_image: &PointTransformAffine,
        current_shape: &DVector<f32>,
        iter: usize,
        feature_pixel_values: &mut Vec<f32>,
    ) {
        let tform = self.find_tform_between(current_shape).m;

        feature_pixel_values.clear();
        feature_pixel_values.extend(self.anchor_idx[iter].iter().zip(&self.deltas[iter]).map(
            |(&anchor, delta)| {
                let p = tform * delta.cast::<f64>() + location(current_shape, anchor).cast::<f64>();
                let p = to_image.apply(p);
                let p = Point::rounded(p.x, p.y);
                image.intensity(p.x, p.y).map_or(0.0, f32::from)
            },
        ));
    }

    fn find_tform_between(&self, to_shape: &DVector<f32>) -> PointTransformAffine {
        let num = self.num_parts();
        if num == 1 {
            return PointTransformAffine::default();
        }

        let from_points: Vec<_> = (0..num)
            .map(|i| location(&self.initial_shape, i).cast::<f64>())
            .collect();
        let to_points: Vec<_> = (0..num)
            .map(|i| location(to_shape, i).cast::<f64>())
            .collect();
        find_similarity_transform(&from_points, &to_points)
    }

    /// Checks every index `predict` relies on.
    fn validate(&self) -> Result<()> {
        let shape_len = self.initial_shape.len();
        if shape_len == 0 || shape_len % 2 != 0 {
            return Err(Error::InvalidModel(format!(
                "initial shape has {} coordinates",
                shape_len
            )));
        }
        if self.anchor_idx.len() != self.forests.len() || self.deltas.len() != self.forests.len() {
            return Err(Error::InvalidModel(format!(
                "{} cascades but {} anchor sets and {} delta sets",
                self.forests.len(),
                self.anchor_idx.len(),
                self.deltas.len()
            )));
        }

        let num_parts = self.num_parts();
        for (iter, forest) in self.forests.iter().enumerate() {
            let anchors = &self.anchor_idx[iter];
            if anchors.len() != self.deltas[iter].len() {
                return Err(Error::InvalidModel(format!(
                    "cascade {} has {} anchors and {} deltas",
                    iter,
                    anchors.len(),
                    self.deltas[iter].len()
                )));
            }
            if let Some(anchor) = anchors.iter().find(|&&a| a >= num_parts) {
                return Err(Error::InvalidModel(format!(
                    "cascade {} anchors landmark {} of {}",
                    iter, anchor, num_parts
                )));
            }

            for tree in forest {
                if tree.leaf_values.len() != tree.splits.len() + 1 {
                    return Err(Error::InvalidModel(format!(
                        "tree with {} splits has {} leaves",
                        tree.splits.len(),
                        tree.leaf_values.len()
                    )));
                }
                if tree.leaf_values.iter().any(|leaf| leaf.len() != shape_len) {
                    return Err(Error::InvalidModel(format!(
                        "leaf size differs from the {} coordinate shape",
                        shape_len
                    )));
                }
                if tree
                    .splits
                    .iter()
                    .any(|split| split.idx1 >= anchors.len() || split.idx2 >= anchors.len())
                {
                    return Err(Error::InvalidModel(format!(
                        "split feature out of range in cascade {}",
                        iter
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::dlib::tests::{two_point_model, write_column, write_int};
    use super::*;
    use std::io::Write;

    fn half_bright(bright_left: bool) -> IntensityImage {
        IntensityImage::from_fn(100, 100, move |x, _| {
            if (x < 50) == bright_left {
                200
            } else {
                0
            }
        })
    }

    #[test]
    fn brighter_left_landmark_moves_shape_right() {
        let predictor = ShapePredictor::from_dlib_bytes(&two_point_model()).unwrap();
        let points = predictor.predict(&half_bright(true), &FaceRect::new(0, 0, 100, 100));
        assert_eq!(points, vec![Point::new(50, 50), Point::new(100, 50)]);
    }

    #[test]
    fn darker_left_landmark_moves_shape_left() {
        let predictor = ShapePredictor::from_dlib_bytes(&two_point_model()).unwrap();
        let points = predictor.predict(&half_bright(false), &FaceRect::new(0, 0, 100, 100));
        assert_eq!(points, vec![Point::new(0, 50), Point::new(50, 50)]);
    }

    #[test]
    fn region_outside_image_samples_zero() {
        let predictor = ShapePredictor::from_dlib_bytes(&two_point_model()).unwrap();
        let region = FaceRect::new(1000, 1000, 1100, 1100);
        let points = predictor.predict(&half_bright(true), &region);
        assert_eq!(points, vec![Point::new(1000, 1050), Point::new(1050, 1050)]);
    }

    #[test]
    fn tree_walks_to_expected_leaf() {
        let leaf = |v: f32| DVector::from_vec(vec![v, v]);
        let tree = RegressionTree {
            splits: vec![
                SplitFeature {
                    idx1: 0,
                    idx2: 1,
                    thresh: 10.0,
                },
                SplitFeature {
                    idx1: 1,
                    idx2: 2,
                    thresh: 0.0,
                },
                SplitFeature {
                    idx1: 2,
                    idx2: 0,
                    thresh: 0.0,
                },
            ],
            leaf_values: vec![leaf(0.0), leaf(1.0), leaf(2.0), leaf(3.0)],
        };
        // 50 - 20 > 10 goes left to node 1, 20 - 5 > 0 goes left to leaf 0
        assert_eq!(tree.leaf(&[50.0, 20.0, 5.0])[0], 0.0);
        // 50 - 60 <= 10 goes right to node 2, 5 - 50 <= 0 goes right to leaf 3
        assert_eq!(tree.leaf(&[50.0, 60.0, 5.0])[0], 3.0);
    }

    #[test]
    fn leaf_count_mismatch_is_invalid() {
        let mut bytes = Vec::new();
        write_int(&mut bytes, 1);
        write_column(&mut bytes, &[0.5, 0.5]);
        // one cascade, one tree with a split but a single leaf
        write_int(&mut bytes, 1);
        write_int(&mut bytes, 1);
        write_int(&mut bytes, 1);
        write_int(&mut bytes, 0);
        write_int(&mut bytes, 0);
        write_int(&mut bytes, 0);
        write_int(&mut bytes, 0);
        write_int(&mut bytes, 1);
        write_column(&mut bytes, &[0.0, 0.0]);
        // anchors and deltas
        write_int(&mut bytes, 1);
        write_int(&mut bytes, 1);
        write_int(&mut bytes, 0);
        write_int(&mut bytes, 1);
        write_int(&mut bytes, 1);
        write_int(&mut bytes, 0);
        write_int(&mut bytes, 0);
        write_int(&mut bytes, 0);
        write_int(&mut bytes, 0);

        assert!(matches!(
            ShapePredictor::from_dlib_bytes(&bytes),
            Err(Error::InvalidModel(_))
        ));
    }

    #[test]
    fn anchor_out_of_range_is_invalid() {
        let mut bytes = two_point_model();
        // skip the four 3-byte zero floats and both delta counts to reach the
        // value byte of the last anchor
        let anchor_pos = bytes.len() - 4 * 3 - 2 - 2 - 1;
        assert_eq!(bytes[anchor_pos], 1);
        bytes[anchor_pos] = 5;
        assert!(matches!(
            ShapePredictor::from_dlib_bytes(&bytes),
            Err(Error::InvalidModel(_))
        ));
    }

    #[test]
    fn loads_plain_and_compressed_files() {
        let dir = tempfile::tempdir().unwrap();

        let plain = dir.path().join("model.dat");
        std::fs::write(&plain, two_point_model()).unwrap();
        assert_eq!(ShapePredictor::from_dlib_file(&plain).unwrap().num_parts(), 2);

        let compressed = dir.path().join("model.dat.bz2");
        let mut encoder = bzip2::write::BzEncoder::new(
            File::create(&compressed).unwrap(),
            bzip2::Compression::best(),
        );
        encoder.write_all(&two_point_model()).unwrap();
        encoder.finish().unwrap();
        assert_eq!(
            ShapePredictor::from_dlib_file(&compressed).unwrap().num_cascades(),
            1
        );
    }
}
