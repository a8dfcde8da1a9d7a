//! Thin-plate spline mapping from gaze features to screen coordinates.
//!
//! With five samples the spline has five kernel weights and three affine
//! coefficients per screen axis. The side conditions make the kernel part
//! orthogonal to the affine part, so the 8x8 system has a unique solution
//! whenever the samples are distinct and not collinear.

use super::model::CalibrationSample;
use crate::{
    constants::{CALIBRATION_TARGET_COUNT, EPSILON},
    error::FitError,
    gaze_estimation::GazeFeatureVector,
    geometry::ScreenPoint,
};
use nalgebra::{Matrix2, SMatrix, Vector2};

const N: usize = CALIBRATION_TARGET_COUNT;
const SYSTEM_SIZE: usize = N + 3;

/// Two normalized gaze vectors closer than this are the same point
const MIN_CENTER_SEPARATION: f64 = 1e-6;

/// Radial basis `r² ln r`
fn kernel(r: f64) -> f64 {
    if r < EPSILON {
        0.0
    } else {
        r * r * r.ln()
    }
}

fn to_vector(gaze: &GazeFeatureVector) -> Vector2<f64> {
    Vector2::new(gaze.x(), gaze.y())
}

/// Fitted mapping parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ThinPlateSpline {
    centroid: Vector2<f64>,
    spread: f64,
    centers: [Vector2<f64>; N],
    radius: f64,
    /// Kernel weights followed by the constant, x and y affine terms; one column per axis
    coefficients: SMatrix<f64, SYSTEM_SIZE, 2>,
}

impl ThinPlateSpline {
    /// Fit the spline through `samples`.
    ///
    /// # Errors
    ///
    /// `IncompleteCalibration` without exactly five samples, `Degenerate`
    /// when the gaze vectors coincide, are collinear, make the system
    /// singular, or the solution misses a target by more than
    /// `consistency_tolerance` pixels.
    pub fn fit(
        samples: &[CalibrationSample],
        degeneracy_ratio: f64,
        consistency_tolerance: f64,
    ) -> Result<Self, FitError> {
        if samples.len() != N {
            return Err(FitError::IncompleteCalibration {
                collected: samples.len(),
                required: N,
            });
        }
        if samples.iter().any(|s| !s.gaze_vector.is_finite() || !s.screen_point.is_finite()) {
            return Err(FitError::Degenerate("non-finite calibration sample".to_string()));
        }

        let raw: [Vector2<f64>; N] = std::array::from_fn(|i| to_vector(&samples[i].gaze_vector));
        let centroid = raw.iter().fold(Vector2::zeros(), |acc, g| acc + g) / N as f64;
        let scatter = raw.iter().fold(Matrix2::zeros(), |acc, g| {
            let d = g - centroid;
            acc + d * d.transpose()
        }) / N as f64;

        let spread = scatter.trace().sqrt();
        if spread < EPSILON {
            return Err(FitError::Degenerate("all gaze vectors coincide".to_string()));
        }

        let eigenvalues = scatter.symmetric_eigenvalues();
        let ratio = eigenvalues.min().max(0.0) / eigenvalues.max();
        if ratio < degeneracy_ratio {
            return Err(FitError::Degenerate(format!(
                "gaze vectors are collinear (scatter ratio {ratio:.2e})"
            )));
        }

        let centers: [Vector2<f64>; N] = std::array::from_fn(|i| (raw[i] - centroid) / spread);
        for i in 0..N {
            for j in 0..i {
                if (centers[i] - centers[j]).norm() < MIN_CENTER_SEPARATION {
                    return Err(FitError::Degenerate(format!(
                        "targets {j} and {i} have the same gaze vector"
                    )));
                }
            }
        }
        let radius = centers.iter().map(|c| c.norm()).fold(0.0, f64::max);

        let mut system = SMatrix::<f64, SYSTEM_SIZE, SYSTEM_SIZE>::zeros();
        let mut rhs = SMatrix::<f64, SYSTEM_SIZE, 2>::zeros();
        for i in 0..N {
            for j in 0..N {
                system[(i, j)] = kernel((centers[i] - centers[j]).norm());
            }
            for (k, value) in [1.0, centers[i].x, centers[i].y].into_iter().enumerate() {
                system[(i, N + k)] = value;
                system[(N + k, i)] = value;
            }
            rhs[(i, 0)] = samples[i].screen_point.x;
            rhs[(i, 1)] = samples[i].screen_point.y;
        }

        let coefficients = system
            .lu()
            .solve(&rhs)
            .filter(|c| c.iter().all(|v| v.is_finite()))
            .ok_or_else(|| FitError::Degenerate("calibration system is singular".to_string()))?;

        let spline = Self {
            centroid,
            spread,
            centers,
            radius,
            coefficients,
        };

        for (i, sample) in samples.iter().enumerate() {
            let residual = spline.evaluate(&sample.gaze_vector).distance_to(sample.screen_point);
            if !(residual <= consistency_tolerance) {
                return Err(FitError::Degenerate(format!(
                    "fit misses target {i} by {residual:.3} px"
                )));
            }
        }

        Ok(spline)
    }

    /// Map a gaze vector to screen coordinates, unclamped.
    ///
    /// Beyond the outermost sample the kernel term is attenuated with the
    /// inverse square of the excess distance, so far extrapolation follows
    /// the affine part. The attenuation has zero slope at the boundary.
    #[must_use]
    pub fn evaluate(&self, gaze: &GazeFeatureVector) -> ScreenPoint {
        let p = (to_vector(gaze) - self.centroid) / self.spread;
        let distance = p.norm();
        let attenuation = if distance <= self.radius {
            1.0
        } else {
            let excess = (distance - self.radius) / self.radius;
            1.0 / excess.mul_add(excess, 1.0)
        };

        let axis = |column: usize| {
            let c = self.coefficients.column(column);
            let bend: f64 = self
                .centers
                .iter()
                .enumerate()
                .map(|(i, center)| c[i] * kernel((p - center).norm()))
                .sum();
            c[N] + c[N + 1] * p.x + c[N + 2] * p.y + attenuation * bend
        };

        ScreenPoint::new(axis(0), axis(1))
    }

    /// Affine part alone, the limit of `evaluate` far from the samples
    #[must_use]
    pub fn evaluate_affine(&self, gaze: &GazeFeatureVector) -> ScreenPoint {
        let p = (to_vector(gaze) - self.centroid) / self.spread;
        let axis = |column: usize| {
            let c = self.coefficients.column(column);
            c[N] + c[N + 1] * p.x + c[N + 2] * p.y
        };
        ScreenPoint::new(axis(0), axis(1))
    }

    /// Mean of the calibration gaze vectors
    #[must_use]
    pub fn centroid(&self) -> GazeFeatureVector {
        GazeFeatureVector::new(self.centroid.x, self.centroid.y)
    }

    /// Distance of the outermost sample from the centroid, in gaze units
    #[must_use]
    pub fn support_radius(&self) -> f64 {
        self.radius * self.spread
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(gaze: [(f64, f64); N]) -> Vec<CalibrationSample> {
        let targets = [
            (960.0, 540.0),
            (192.0, 108.0),
            (1728.0, 108.0),
            (192.0, 972.0),
            (1728.0, 972.0),
        ];
        targets
            .iter()
            .zip(gaze)
            .map(|(&(x, y), (gx, gy))| CalibrationSample {
                screen_point: ScreenPoint::new(x, y),
                gaze_vector: GazeFeatureVector::new(gx, gy),
            })
            .collect()
    }

    fn skewed() -> Vec<CalibrationSample> {
        samples([(0.02, -0.01), (-0.55, -0.4), (0.6, -0.45), (-0.5, 0.35), (0.65, 0.5)])
    }

    #[test]
    fn test_interpolates_samples() {
        let data = skewed();
        let spline = ThinPlateSpline::fit(&data, 1e-3, 1e-3).unwrap();
        for s in &data {
            assert!(spline.evaluate(&s.gaze_vector).distance_to(s.screen_point) < 1e-4);
        }
    }

    #[test]
    fn test_affine_layout_reproduces_affine_map() {
        // Samples on an exact affine image need no bending
        let data = samples([(0.0, 0.0), (-0.4, -0.2), (0.4, -0.2), (-0.4, 0.2), (0.4, 0.2)]);
        let spline = ThinPlateSpline::fit(&data, 1e-3, 1e-3).unwrap();
        let gaze = GazeFeatureVector::new(0.2, 0.1);
        assert!(spline.evaluate(&gaze).distance_to(ScreenPoint::new(1344.0, 756.0)) < 1e-4);
    }

    #[test]
    fn test_extrapolation_is_continuous_and_degrades_to_affine() {
        let spline = ThinPlateSpline::fit(&skewed(), 1e-3, 1e-3).unwrap();
        let origin = spline.centroid();
        let at = |scale: f64| GazeFeatureVector::new(origin.x() + 0.8 * scale, origin.y() + 0.6 * scale);

        let edge = spline.support_radius();
        let inside = spline.evaluate(&at(edge * (1.0 - 1e-9)));
        let outside = spline.evaluate(&at(edge * (1.0 + 1e-9)));
        assert!(inside.distance_to(outside) < 1e-3);

        let far = at(200.0);
        let full = spline.evaluate(&far);
        let affine = spline.evaluate_affine(&far);
        assert!(full.is_finite());
        assert!(full.distance_to(affine) < 0.01 * affine.norm());
    }

    #[test]
    fn test_rejects_collinear_and_coincident() {
        let collinear = samples([(0.0, 0.0), (-0.2, -0.2), (0.1, 0.1), (0.3, 0.3), (0.5, 0.5)]);
        assert!(matches!(
            ThinPlateSpline::fit(&collinear, 1e-3, 0.5),
            Err(FitError::Degenerate(_))
        ));

        let coincident = samples([(0.1, 0.1); N]);
        assert!(matches!(
            ThinPlateSpline::fit(&coincident, 1e-3, 0.5),
            Err(FitError::Degenerate(_))
        ));

        let repeated = samples([(0.0, 0.0), (-0.4, -0.2), (0.4, -0.2), (-0.4, 0.2), (-0.4, 0.2)]);
        assert!(matches!(
            ThinPlateSpline::fit(&repeated, 1e-3, 0.5),
            Err(FitError::Degenerate(_))
        ));
    }

    #[test]
    fn test_requires_five_samples() {
        let mut data = skewed();
        data.pop();
        assert_eq!(
            ThinPlateSpline::fit(&data, 1e-3, 0.5),
            Err(FitError::IncompleteCalibration { collected: 4, required: 5 })
        );
    }
}
