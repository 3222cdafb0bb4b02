//! Asymmetric exponential attack/release envelope.
//!
//! This is a one-pole smoother, not a timed attack/decay/sustain/release
//! state machine: there is no "decay" or "sustain" stage, only a target of 0
//! or 1 that `current` chases at one of two fixed rates. That is sufficient
//! for long-form tonal material where the only transitions are "fade in" and
//! "fade out".

use crate::types::MIN_ENV_S;

/// A per-sample gain that exponentially chases a target of 0 or 1.
#[derive(Clone, Copy, Debug, Default)]
pub struct Envelope {
    current: f32,
    target: f32,
    attack_coeff: f32,
    release_coeff: f32,
}

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives the per-sample attack/release coefficients for a given
    /// sample rate. `MIN_ENV_S` floors both times to avoid division by zero
    /// and impulsive (one-sample) edges.
    pub fn configure(&mut self, attack_s: f32, release_s: f32, sr: f32) {
        self.attack_coeff = 1.0 / (attack_s.max(MIN_ENV_S) * sr);
        self.release_coeff = 1.0 / (release_s.max(MIN_ENV_S) * sr);
    }

    /// Sets the target the envelope chases: `true` for a full fade-in,
    /// `false` for a fade-out. Does not itself advance `current`.
    pub fn trigger(&mut self, active: bool) {
        self.target = if active { 1.0 } else { 0.0 };
    }

    /// Advances `current` toward `target` one sample at a time and scales
    /// each sample of `block` by the result in place.
    pub fn process(&mut self, block: &mut [f32]) {
        for sample in block.iter_mut() {
            let k = if self.target > self.current {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.current += (self.target - self.current) * k;
            *sample *= self.current;
        }
    }

    pub fn reset(&mut self) {
        self.current = 0.0;
        self.target = 0.0;
    }

    pub fn current(&self) -> f32 {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_in_unit_range_through_a_full_cycle() {
        let mut env = Envelope::new();
        env.configure(0.01, 0.01, 48_000.0);
        env.trigger(true);
        let mut block = vec![1.0f32; 48_000];
        env.process(&mut block);
        assert!(block.iter().all(|s| (0.0..=1.0).contains(s)));
        env.trigger(false);
        let mut block = vec![1.0f32; 48_000];
        env.process(&mut block);
        assert!(block.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn monotonic_during_attack_and_release() {
        let mut env = Envelope::new();
        env.configure(0.05, 0.05, 48_000.0);
        env.trigger(true);
        let mut block = vec![1.0f32; 4096];
        env.process(&mut block);
        assert!(block.windows(2).all(|w| w[1] >= w[0] - 1e-9));

        env.trigger(false);
        let mut block = vec![1.0f32; 4096];
        env.process(&mut block);
        assert!(block.windows(2).all(|w| w[1] <= w[0] + 1e-9));
    }

    #[test]
    fn faster_attack_has_a_steeper_initial_slope_than_slower_release() {
        let mut env = Envelope::new();
        env.configure(1.0, 30.0, 48_000.0);
        env.trigger(true);
        let mut attack_block = [1.0f32; 2];
        env.process(&mut attack_block);
        let attack_delta = attack_block[0];

        let mut env = Envelope::new();
        env.configure(1.0, 30.0, 48_000.0);
        env.current = 1.0;
        env.trigger(false);
        let mut release_block = [1.0f32; 2];
        env.process(&mut release_block);
        let release_delta = 1.0 - release_block[0];

        assert!(attack_delta > release_delta);
    }

    #[test]
    fn long_attack_is_nearly_silent_at_twenty_milliseconds() {
        let mut env = Envelope::new();
        env.configure(30.0, 30.0, 48_000.0);
        env.trigger(true);
        let mut block = vec![1.0f32; (0.02 * 48_000.0) as usize];
        env.process(&mut block);
        assert!(block.last().copied().unwrap_or(0.0) < 0.01);
    }

    #[test]
    fn reset_clears_current_and_target() {
        let mut env = Envelope::new();
        env.configure(0.01, 0.01, 48_000.0);
        env.trigger(true);
        let mut block = vec![1.0f32; 1000];
        env.process(&mut block);
        env.reset();
        assert_eq!(env.current(), 0.0);
        let mut block = [1.0f32; 1];
        env.process(&mut block);
        assert_eq!(block[0], 0.0);
    }
}
