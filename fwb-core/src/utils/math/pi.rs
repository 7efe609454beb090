/// A discrete PI speed law with an optional integrator.
///
/// With the integrator disabled (the default) the output is `kp * error`.
/// When enabled, the integral of the error is accumulated over `dt` and
/// frozen while the saturated output would be pushed further out.
#[derive(Debug, Clone)]
pub struct PiController
{
    kp: f32,
    ki: f32,
    dt: f32,
    limit: f32,
    integral: f32,
    integral_enabled: bool,
}

impl PiController
{
    pub fn new(
        kp: f32,
        ki: f32,
        dt: f32,
        limit: f32,
    ) -> Self
    {
        Self {
            kp,
            ki,
            dt,
            limit,
            integral: 0.0,
            integral_enabled: false,
        }
    }

    pub fn with_integral(
        mut self,
        enabled: bool,
    ) -> Self
    {
        self.integral_enabled = enabled;
        self
    }

    /// Compute the saturated output for the current error.
    pub fn update(
        &mut self,
        error: f32,
    ) -> f32
    {
        if !self.integral_enabled {
            return (self.kp * error).clamp(-self.limit, self.limit);
        }

        let candidate = self.integral + error * self.dt;
        let raw = self.kp * error + self.ki * candidate;
        let out = raw.clamp(-self.limit, self.limit);
        // Integrate only while unsaturated or when the error unwinds the output.
        if raw == out || (raw > out) != (error > 0.0) {
            self.integral = candidate;
        }
        out
    }

    /// Reset integrator history.
    pub fn reset(&mut self)
    {
        self.integral = 0.0;
    }

    pub fn integral(&self) -> f32
    {
        self.integral
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::utils::math::actuation::V_MAX;

    #[test]
    fn proportional_only_by_default()
    {
        let mut pi = PiController::new(0.034, 0.32, 0.02, V_MAX);
        assert_eq!(pi.update(0.0), 0.0);
        assert!((pi.update(100.0) - 3.4).abs() < 1e-5);
        assert!((pi.update(100.0) - 3.4).abs() < 1e-5);
        assert_eq!(pi.integral(), 0.0);
    }

    #[test]
    fn large_error_saturates()
    {
        let mut pi = PiController::new(0.034, 0.32, 0.02, V_MAX);
        assert_eq!(pi.update(250.0), V_MAX);
        assert_eq!(pi.update(-250.0), -V_MAX);
    }

    #[test]
    fn integral_accumulates_when_enabled()
    {
        let mut pi = PiController::new(0.01, 0.5, 0.02, V_MAX).with_integral(true);
        let first = pi.update(10.0);
        let second = pi.update(10.0);
        assert!(second > first);
        assert!((pi.integral() - 0.4).abs() < 1e-5);
        pi.reset();
        assert_eq!(pi.integral(), 0.0);
    }

    #[test]
    fn integral_holds_while_saturated()
    {
        let mut pi = PiController::new(0.034, 0.32, 0.02, V_MAX).with_integral(true);
        for _ in 0..50 {
            assert_eq!(pi.update(500.0), V_MAX);
        }
        assert_eq!(pi.integral(), 0.0);
        // Opposite error unwinds immediately.
        let out = pi.update(-10.0);
        assert!(out < 0.0);
    }
}
