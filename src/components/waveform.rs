//! Time-dependent source values.

use crate::error::{EngineError, Result};

/// Trapezoidal pulse train.
#[derive(Debug, Clone, PartialEq)]
pub struct Pulse {
    pub initial: f64,
    pub pulsed: f64,
    pub delay: f64,
    pub rise: f64,
    pub fall: f64,
    pub width: f64,
    /// Repetition period, 0 for a single pulse
    pub period: f64,
}

impl Pulse {
    /// Single step from `initial` to `pulsed` at `delay` with rise time `rise`.
    pub fn step(initial: f64, pulsed: f64, delay: f64, rise: f64) -> Self {
        Self {
            initial,
            pulsed,
            delay,
            rise,
            fall: rise,
            width: f64::INFINITY,
            period: 0.0,
        }
    }

    fn corners(&self) -> [f64; 4] {
        [
            0.0,
            self.rise,
            self.rise + self.width,
            self.rise + self.width + self.fall,
        ]
    }

    fn value(&self, time: f64) -> f64 {
        if time <= self.delay {
            return self.initial;
        }
        let mut t = time - self.delay;
        if self.period > 0.0 {
            t %= self.period;
        }
        let [_, top, end, bottom] = self.corners();
        if t < top {
            self.initial + (self.pulsed - self.initial) * t / self.rise
        } else if t < end {
            self.pulsed
        } else if t < bottom {
            self.pulsed + (self.initial - self.pulsed) * (t - end) / self.fall
        } else {
            self.initial
        }
    }

    fn next_breakpoint(&self, after: f64) -> Option<f64> {
        let first_cycle = if self.period > 0.0 && after > self.delay {
            ((after - self.delay) / self.period).floor()
        } else {
            0.0
        };
        let cycles = if self.period > 0.0 { 2 } else { 1 };
        (0..cycles)
            .flat_map(|k| {
                let offset = self.delay + (first_cycle + k as f64) * self.period;
                self.corners().map(|c| offset + c)
            })
            .filter(|&t| t.is_finite() && t > after)
            .reduce(f64::min)
    }
}

/// Shape of a source over time.
#[derive(Debug, Clone, PartialEq)]
pub enum Waveform {
    Pulse(Pulse),
    /// Piecewise linear through `(time, value)` points, constant outside them
    Pwl(Vec<(f64, f64)>),
}

impl Waveform {
    /// Value at `time`.
    pub fn value(&self, time: f64) -> f64 {
        match self {
            Waveform::Pulse(pulse) => pulse.value(time),
            Waveform::Pwl(points) => {
                let pos = points.partition_point(|&(t, _)| t <= time);
                match (pos, points.len()) {
                    (_, 0) => 0.0,
                    (0, _) => points[0].1,
                    (p, n) if p == n => points[n - 1].1,
                    (p, _) => {
                        let (t0, v0) = points[p - 1];
                        let (t1, v1) = points[p];
                        v0 + (v1 - v0) * (time - t0) / (t1 - t0)
                    }
                }
            }
        }
    }

    /// First corner strictly after `after`.
    pub fn next_breakpoint(&self, after: f64) -> Option<f64> {
        match self {
            Waveform::Pulse(pulse) => pulse.next_breakpoint(after),
            Waveform::Pwl(points) => points.iter().map(|&(t, _)| t).find(|&t| t > after),
        }
    }

    /// Check the waveform parameters of source `component`.
    pub fn validate(&self, component: &str) -> Result<()> {
        match self {
            Waveform::Pulse(p) => {
                if p.rise < 0.0 || p.fall < 0.0 || p.width < 0.0 || p.delay < 0.0 || p.period < 0.0 {
                    return Err(EngineError::invalid_parameter(
                        component,
                        "pulse",
                        "times cannot be negative",
                    ));
                }
                if p.period > 0.0 && p.period < p.rise + p.width + p.fall {
                    return Err(EngineError::invalid_parameter(
                        component,
                        "pulse",
                        "period shorter than one pulse",
                    ));
                }
                Ok(())
            }
            Waveform::Pwl(points) => {
                if points.is_empty() {
                    return Err(EngineError::invalid_parameter(component, "pwl", "no points"));
                }
                if points.windows(2).any(|w| w[1].0 <= w[0].0) {
                    return Err(EngineError::invalid_parameter(
                        component,
                        "pwl",
                        "times must be strictly increasing",
                    ));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pulse() -> Waveform {
        Waveform::Pulse(Pulse {
            initial: 0.0,
            pulsed: 1.0,
            delay: 1.0,
            rise: 0.5,
            fall: 0.5,
            width: 1.0,
            period: 4.0,
        })
    }

    #[test]
    fn test_pulse_values() {
        let w = pulse();
        assert_eq!(w.value(0.5), 0.0);
        assert_relative_eq!(w.value(1.25), 0.5);
        assert_eq!(w.value(2.0), 1.0);
        assert_relative_eq!(w.value(2.75), 0.5);
        assert_eq!(w.value(3.5), 0.0);
        // Second period
        assert_eq!(w.value(6.0), 1.0);
    }

    #[test]
    fn test_pulse_breakpoints() {
        let w = pulse();
        assert_eq!(w.next_breakpoint(0.0), Some(1.0));
        assert_eq!(w.next_breakpoint(1.0), Some(1.5));
        assert_eq!(w.next_breakpoint(2.6), Some(3.0));
        assert_eq!(w.next_breakpoint(3.0), Some(5.0));
    }

    #[test]
    fn test_step_has_two_corners() {
        let w = Waveform::Pulse(Pulse::step(0.0, 1.0, 0.0, 1e-9));
        assert_eq!(w.next_breakpoint(-1.0), Some(0.0));
        assert_eq!(w.next_breakpoint(0.0), Some(1e-9));
        assert_eq!(w.next_breakpoint(1e-9), None);
        assert_eq!(w.value(1.0), 1.0);
    }

    #[test]
    fn test_pwl() {
        let w = Waveform::Pwl(vec![(0.0, 0.0), (1.0, 2.0), (3.0, 0.0)]);
        assert_relative_eq!(w.value(0.5), 1.0);
        assert_relative_eq!(w.value(2.0), 1.0);
        assert_eq!(w.value(5.0), 0.0);
        assert_eq!(w.next_breakpoint(1.0), Some(3.0));
        assert!(w.validate("V1").is_ok());
        assert!(Waveform::Pwl(vec![(1.0, 0.0), (1.0, 1.0)]).validate("V1").is_err());
    }
}
