//! Triangular alpha wave
//!
//! Alpha moves by a fixed step per tick and bounces between the configured
//! bounds. The tick period, not the step, sets the pulse rate.

/// Alpha change per tick
pub const PULSE_STEP: f64 = 0.05;

/// Alpha when the overlay first appears
pub const INITIAL_ALPHA: f64 = 0.8;

/// Absorbs float drift so repeated steps land exactly on a bound
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    Rising,
    Falling,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pulse {
    alpha: f64,
    direction: FadeDirection,
}

impl Default for Pulse {
    fn default() -> Self {
        Self {
            alpha: INITIAL_ALPHA,
            direction: FadeDirection::Falling,
        }
    }
}

impl Pulse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn direction(&self) -> FadeDirection {
        self.direction
    }

    /// Advance one tick within `[min, max]` and return the new alpha.
    ///
    /// Reaching a bound pins alpha to it and reverses direction. Bounds that
    /// moved since the last tick pull alpha back into range without flipping.
    pub fn advance(&mut self, min: f64, max: f64) -> f64 {
        match self.direction {
            FadeDirection::Falling => {
                self.alpha -= PULSE_STEP;
                if self.alpha <= min + EPSILON {
                    self.alpha = min;
                    self.direction = FadeDirection::Rising;
                }
            }
            FadeDirection::Rising => {
                self.alpha += PULSE_STEP;
                if self.alpha >= max - EPSILON {
                    self.alpha = max;
                    self.direction = FadeDirection::Falling;
                }
            }
        }
        self.alpha = self.alpha.clamp(min, max);
        self.alpha
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(pulse: &mut Pulse, ticks: usize, min: f64, max: f64) -> Vec<(f64, FadeDirection)> {
        (0..ticks)
            .map(|_| {
                let alpha = pulse.advance(min, max);
                (alpha, pulse.direction())
            })
            .collect()
    }

    #[test]
    fn starts_falling_from_initial_alpha() {
        let mut pulse = Pulse::new();
        assert_eq!(pulse.alpha(), 0.8);
        assert_eq!(pulse.direction(), FadeDirection::Falling);
        assert!((pulse.advance(0.3, 1.0) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn stays_within_bounds_and_flips_at_them() {
        let (min, max) = (0.3, 1.0);
        let mut pulse = Pulse::new();
        let mut previous = pulse.alpha();
        let mut direction = pulse.direction();

        for (alpha, next_direction) in run(&mut pulse, 500, min, max) {
            assert!((min..=max).contains(&alpha), "alpha {alpha} out of bounds");
            if next_direction != direction {
                // Direction only changes exactly on a bound
                let bound = if next_direction == FadeDirection::Rising { min } else { max };
                assert_eq!(alpha, bound);
            } else if direction == FadeDirection::Falling {
                assert!(alpha < previous);
            } else {
                assert!(alpha > previous);
            }
            previous = alpha;
            direction = next_direction;
        }
    }

    #[test]
    fn period_is_twice_the_range_over_the_step() {
        let (min, max) = (0.3, 1.0);
        let mut pulse = Pulse::new();
        let history = run(&mut pulse, 200, min, max);

        let peaks: Vec<usize> = history
            .iter()
            .enumerate()
            .filter(|(_, (alpha, _))| *alpha == max)
            .map(|(i, _)| i)
            .collect();

        assert!(peaks.len() >= 3);
        let expected = (2.0 * (max - min) / PULSE_STEP).round() as usize;
        for pair in peaks.windows(2) {
            assert_eq!(pair[1] - pair[0], expected);
        }
    }

    #[test]
    fn flat_range_holds_steady() {
        let mut pulse = Pulse::new();
        for (alpha, _) in run(&mut pulse, 10, 0.5, 0.5) {
            assert_eq!(alpha, 0.5);
        }
    }

    #[test]
    fn shrinking_range_pulls_alpha_inside() {
        let mut pulse = Pulse::new();
        let alpha = pulse.advance(0.1, 0.4);
        assert_eq!(alpha, 0.4);
        assert_eq!(pulse.direction(), FadeDirection::Falling);
        assert!((pulse.advance(0.1, 0.4) - 0.35).abs() < 1e-12);
    }
}
