use crate::geometry::FaceRect;
use nalgebra::{Matrix2, Vector2};

/// `p -> m * p + b`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointTransformAffine {
    pub m: Matrix2<f64>,
    pub b: Vector2<f64>,
}

impl Default for PointTransformAffine {
    fn default() -> Self {
        Self {
            m: Matrix2::identity(),
            b: Vector2::zeros(),
        }
    }
}

impl PointTransformAffine {
    pub fn new(m: Matrix2<f64>, b: Vector2<f64>) -> Self {
        Self { m, b }
    }

    /// Maps the unit square onto `rect`: (0,0) to the top left corner,
    /// (1,0) to the top right and (1,1) to the bottom right.
    pub fn unnormalizing(rect: &FaceRect) -> Self {
        let left = rect.left as f64;
        let top = rect.top as f64;
        let right = rect.right as f64;
        let bottom = rect.bottom as f64;
        Self::new(
            Matrix2::new(right - left, 0.0, 0.0, bottom - top),
            Vector2::new(left, top),
        )
    }

    pub fn apply(&self, p: Vector2<f64>) -> Vector2<f64> {
        self.m * p + self.b
    }
}

/// Least squares similarity transform (rotation, uniform scale, translation)
/// taking `from` onto `to` (Umeyama).
pub fn find_similarity_transform(
    from: &[Vector2<f64>],
    to: &[Vector2<f64>],
) -> PointTransformAffine {
    debug_assert_eq!(from.len(), to.len());
    if from.is_empty() {
        return PointTransformAffine::default();
    }

    let n = from.len() as f64;
    let mean_from = from.iter().fold(Vector2::<f64>::zeros(), |acc, p| acc + p) / n;
    let mean_to = to.iter().fold(Vector2::<f64>::zeros(), |acc, p| acc + p) / n;

    let mut sigma_from = 0.0f64;
    let mut cov = Matrix2::<f64>::zeros();
    for (f, t) in from.iter().zip(to) {
        let df = f - mean_from;
        sigma_from += df.norm_squared();
        cov += (t - mean_to) * df.transpose();
    }
    sigma_from /= n;
    cov /= n;

    let svd = cov.svd(true, true);
    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => return PointTransformAffine::default(),
    };
    let d = Matrix2::from_diagonal(&svd.singular_values);

    let mut s = Matrix2::identity();
    let det = cov.determinant();
    if det < 0.0 || (det == 0.0 && u.determinant() * v_t.determinant() < 0.0) {
        if d[(1, 1)] < d[(0, 0)] {
            s[(1, 1)] = -1.0;
        } else {
            s[(0, 0)] = -1.0;
        }
    }

    let r = u * s * v_t;
    let c = if sigma_from != 0.0 {
        (d * s).trace() / sigma_from
    } else {
        1.0
    };
    let t = mean_to - c * r * mean_from;

    PointTransformAffine::new(c * r, t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vector2<f64>, b: Vector2<f64>) -> bool {
        (a - b).norm() < 1e-3
    }

    #[test]
    fn unnormalizing_maps_unit_square_onto_rect() {
        let tform = PointTransformAffine::unnormalizing(&FaceRect::new(10, 20, 110, 220));
        assert!(close(tform.apply(Vector2::new(0.0, 0.0)), Vector2::new(10.0, 20.0)));
        assert!(close(tform.apply(Vector2::new(1.0, 0.0)), Vector2::new(110.0, 20.0)));
        assert!(close(tform.apply(Vector2::new(1.0, 1.0)), Vector2::new(110.0, 220.0)));
        assert!(close(tform.apply(Vector2::new(0.5, 0.5)), Vector2::new(60.0, 120.0)));
    }

    #[test]
    fn unnormalizing_is_exact_past_single_precision() {
        // 100_000_001 is not representable as an f32
        let tform = PointTransformAffine::unnormalizing(&FaceRect::new(1, 1, 100_000_001, 7));
        assert_eq!(tform.apply(Vector2::new(1.0, 0.5)), Vector2::new(100_000_001.0, 4.0));
    }

    #[test]
    fn similarity_of_identical_shapes_is_identity() {
        let points = [
            Vector2::new(0.1, 0.2),
            Vector2::new(0.8, 0.3),
            Vector2::new(0.5, 0.9),
        ];
        let tform = find_similarity_transform(&points, &points);
        for p in &points {
            assert!(close(tform.apply(*p), *p));
        }
    }

    #[test]
    fn similarity_recovers_scale_rotation_and_shift() {
        let from = [
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(0.0, 1.0),
            Vector2::new(1.0, 1.0),
        ];
        // rotate 90 degrees, scale by 2, then shift
        let to: Vec<_> = from
            .iter()
            .map(|p| Vector2::new(-2.0 * p.y + 5.0, 2.0 * p.x - 1.0))
            .collect();

        let tform = find_similarity_transform(&from, &to);
        for (f, t) in from.iter().zip(&to) {
            assert!(close(tform.apply(*f), *t));
        }
        assert!((tform.m[(0, 1)] + 2.0).abs() < 1e-3);
        assert!((tform.m[(1, 0)] - 2.0).abs() < 1e-3);
    }

    #[test]
    fn single_point_translates_only() {
        let tform =
            find_similarity_transform(&[Vector2::new(1.0, 1.0)], &[Vector2::new(3.0, 4.0)]);
        assert!(close(tform.apply(Vector2::new(1.0, 1.0)), Vector2::new(3.0, 4.0)));
    }
}
