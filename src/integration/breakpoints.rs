//! Breakpoint schedule for transient analysis.

use log::trace;

/// Ordered set of future time points the integrator must land on exactly.
///
/// The set always holds the final time. The start time is dropped as soon as
/// the run begins, like every other point once it has been passed. Points
/// closer than the minimum spacing to an existing point are merged into it.
#[derive(Debug, Clone)]
pub struct Breakpoints {
    points: Vec<f64>,
    min_spacing: f64,
}

impl Breakpoints {
    /// Create a schedule spanning `start..=stop`.
    pub fn new(start: f64, stop: f64, min_spacing: f64) -> Self {
        let points = if stop > start {
            vec![start, stop]
        } else {
            vec![start]
        };
        Self {
            points,
            min_spacing: min_spacing.max(0.0),
        }
    }

    /// Minimum distance between two breakpoints.
    pub fn min_spacing(&self) -> f64 {
        self.min_spacing
    }

    /// The next pending breakpoint.
    pub fn first(&self) -> f64 {
        self.points[0]
    }

    /// The final time.
    pub fn last(&self) -> f64 {
        self.points[self.points.len() - 1]
    }

    /// Distance between the first two pending breakpoints.
    pub fn delta(&self) -> f64 {
        match self.points.get(1) {
            Some(second) => second - self.points[0],
            None => f64::INFINITY,
        }
    }

    /// Pending breakpoints in increasing order.
    pub fn points(&self) -> &[f64] {
        &self.points
    }

    /// Schedule a breakpoint. Returns `false` if it was merged or lies outside the schedule.
    pub fn set(&mut self, time: f64) -> bool {
        if !time.is_finite() || time > self.last() + self.min_spacing {
            return false;
        }
        let pos = self.points.partition_point(|&p| p < time);
        let near_before = pos > 0 && time - self.points[pos - 1] <= self.min_spacing;
        let near_after = pos < self.points.len() && self.points[pos] - time <= self.min_spacing;
        if near_before || near_after {
            return false;
        }
        trace!("breakpoint scheduled at {:e}", time);
        self.points.insert(pos, time);
        true
    }

    /// Drop the first breakpoint once it has been passed. The final time is kept.
    pub fn clear_first(&mut self) {
        if self.points.len() > 1 {
            self.points.remove(0);
        }
    }

    /// Check whether `time` sits on the first breakpoint.
    pub fn is_at_first(&self, time: f64) -> bool {
        (time - self.first()).abs() <= self.min_spacing
    }

    /// Clamp a step so that it never crosses the first breakpoint after `time`.
    ///
    /// Returns the possibly shortened step and whether it now ends exactly on
    /// a breakpoint.
    pub fn clamp(&self, time: f64, delta: f64) -> (f64, bool) {
        let next = self
            .points
            .iter()
            .copied()
            .find(|&p| p > time + self.min_spacing);
        match next {
            Some(point) if time + delta >= point - self.min_spacing => (point - time, true),
            _ => (delta, false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_contains_start_and_stop() {
        let bp = Breakpoints::new(0.0, 1e-3, 1e-12);
        assert_eq!(bp.points(), &[0.0, 1e-3]);
        assert_eq!(bp.delta(), 1e-3);
    }

    #[test]
    fn test_set_keeps_order_and_merges() {
        let mut bp = Breakpoints::new(0.0, 10.0, 1e-3);
        assert!(bp.set(5.0));
        assert!(bp.set(2.0));
        assert!(!bp.set(5.0005));
        assert!(!bp.set(20.0));
        assert_eq!(bp.points(), &[0.0, 2.0, 5.0, 10.0]);
    }

    #[test]
    fn test_clamp_lands_exactly() {
        let mut bp = Breakpoints::new(0.0, 10.0, 1e-9);
        bp.set(1.0);
        bp.clear_first();

        let (delta, hit) = bp.clamp(0.7, 0.5);
        assert!(hit);
        assert_relative_eq!(0.7 + delta, 1.0);

        let (delta, hit) = bp.clamp(0.2, 0.5);
        assert!(!hit);
        assert_eq!(delta, 0.5);
    }

    #[test]
    fn test_clear_keeps_final_time() {
        let mut bp = Breakpoints::new(0.0, 1.0, 0.0);
        bp.clear_first();
        bp.clear_first();
        assert_eq!(bp.points(), &[1.0]);
        assert_eq!(bp.delta(), f64::INFINITY);
    }
}
