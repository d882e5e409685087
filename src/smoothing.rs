// src/smoothing.rs - Landmark smoothing between consecutive frames
use nalgebra::{Matrix3, Matrix3x6, Matrix6, Vector3, Vector6};

use crate::landmark::Landmark;

/// Constant-velocity Kalman filter over a 3D position.
pub struct KalmanFilter {
    state: Vector6<f64>, // [x, y, z, vx, vy, vz]
    covariance: Matrix6<f64>,
    process_noise: Matrix6<f64>,
    measurement_noise: Matrix3<f64>,
    dt: f64,
    initialized: bool,
}

impl KalmanFilter {
    pub fn new(dt: f64) -> Self {
        let mut process_noise = Matrix6::identity() * 1e-4;
        process_noise.fixed_view_mut::<3, 3>(3, 3).fill_diagonal(1e-3);

        Self {
            state: Vector6::zeros(),
            covariance: Matrix6::identity(),
            process_noise,
            measurement_noise: Matrix3::identity() * 1e-3,
            dt,
            initialized: false,
        }
    }

    pub fn predict(&mut self) {
        let mut f = Matrix6::identity();
        f.fixed_view_mut::<3, 3>(0, 3).fill_diagonal(self.dt);

        self.state = f * self.state;
        self.covariance = f * self.covariance * f.transpose() + self.process_noise;
    }

    pub fn update(&mut self, measurement: Vector3<f64>) {
        // First measurement seeds the state so the filter does not drift in from the origin
        if !self.initialized {
            self.state.fixed_rows_mut::<3>(0).copy_from(&measurement);
            self.covariance = Matrix6::identity() * 1e-2;
            self.covariance.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.measurement_noise);
            self.initialized = true;
            return;
        }

        // H observes position, not velocity
        let mut h = Matrix3x6::<f64>::zeros();
        h[(0, 0)] = 1.0;
        h[(1, 1)] = 1.0;
        h[(2, 2)] = 1.0;

        let y = measurement - (h * self.state);
        let s = h * self.covariance * h.transpose() + self.measurement_noise;

        let Some(s_inv) = s.try_inverse() else {
            return;
        };
        let k = self.covariance * h.transpose() * s_inv;

        self.state += k * y;
        self.covariance = (Matrix6::identity() - k * h) * self.covariance;
    }

    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.state[0], self.state[1], self.state[2])
    }
}

/// One filter per landmark; visibility and presence pass through untouched.
pub struct LandmarkSmoother {
    filters: Vec<KalmanFilter>,
    dt: f64,
}

impl LandmarkSmoother {
    pub fn new(fps: f64) -> Self {
        Self {
            filters: Vec::new(),
            dt: 1.0 / fps.max(1.0),
        }
    }

    pub fn smooth(&mut self, landmarks: &mut [Landmark]) {
        if self.filters.len() != landmarks.len() {
            self.filters = (0..landmarks.len())
                .map(|_| KalmanFilter::new(self.dt))
                .collect();
        }

        for (filter, lm) in self.filters.iter_mut().zip(landmarks.iter_mut()) {
            filter.predict();
            filter.update(Vector3::new(lm.x as f64, lm.y as f64, lm.z as f64));
            let p = filter.position();
            lm.x = p.x as f32;
            lm.y = p.y as f32;
            lm.z = p.z as f32;
        }
    }

    pub fn reset(&mut self) {
        self.filters.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn first_measurement_is_passed_through() {
        let mut kf = KalmanFilter::new(1.0 / 30.0);
        kf.predict();
        kf.update(Vector3::new(0.4, 0.6, -0.2));
        assert_abs_diff_eq!(kf.position(), Vector3::new(0.4, 0.6, -0.2), epsilon = 1e-12);
    }

    #[test]
    fn converges_to_constant_measurement() {
        let mut kf = KalmanFilter::new(1.0 / 30.0);
        kf.predict();
        kf.update(Vector3::new(0.0, 0.0, 0.0));
        for _ in 0..200 {
            kf.predict();
            kf.update(Vector3::new(0.5, 0.25, 0.1));
        }
        assert_abs_diff_eq!(kf.position(), Vector3::new(0.5, 0.25, 0.1), epsilon = 1e-3);
    }

    #[test]
    fn smoother_keeps_scores_and_resets() {
        let mut smoother = LandmarkSmoother::new(30.0);
        let mut landmarks = vec![Landmark::new(0.2, 0.3, 0.0, 0.9); 4];
        smoother.smooth(&mut landmarks);
        assert_eq!(landmarks[0].visibility, 0.9);
        assert_abs_diff_eq!(landmarks[0].x, 0.2, epsilon = 1e-6);

        let mut jumped = vec![Landmark::new(0.8, 0.3, 0.0, 0.9); 4];
        smoother.smooth(&mut jumped);
        assert!(jumped[0].x < 0.8 && jumped[0].x > 0.2);

        smoother.reset();
        let mut fresh = vec![Landmark::new(0.8, 0.3, 0.0, 0.9); 4];
        smoother.smooth(&mut fresh);
        assert_abs_diff_eq!(fresh[0].x, 0.8, epsilon = 1e-6);
    }
}
