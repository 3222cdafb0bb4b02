//! Two coupled mono layers with a binaural frequency offset.

use crate::config::LayerConfiguration;
use crate::layer::mono::MonoLayer;

/// Two [`MonoLayer`]s driven from one configuration: left renders
/// `carrier_hz`, right renders `carrier_hz + stereo_offset_hz`. Both share
/// envelope semantics (triggered and reset together) but have independent
/// oscillator phases.
///
/// The frequency difference is a perceptual phenomenon only: neither channel
/// carries any amplitude modulation at the beat frequency.
pub struct StereoLayer {
    left: MonoLayer,
    right: MonoLayer,
}

impl Default for StereoLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl StereoLayer {
    pub fn new() -> Self {
        Self {
            left: MonoLayer::new(),
            right: MonoLayer::new(),
        }
    }

    pub fn initialize(&mut self, sr: f32, attack_s: f32, release_s: f32) {
        self.left.initialize(sr, attack_s, release_s);
        self.right.initialize(sr, attack_s, release_s);
    }

    pub fn update_and_process(
        &mut self,
        left_block: &mut [f32],
        right_block: &mut [f32],
        sr: f32,
        cfg: &LayerConfiguration,
        gate: bool,
    ) {
        self.left
            .update_and_process(left_block, sr, cfg.carrier_hz(), cfg, gate);
        self.right
            .update_and_process(right_block, sr, cfg.right_carrier_hz(), cfg, gate);
    }

    pub fn trigger_release(&mut self) {
        self.left.trigger_release();
        self.right.trigger_release();
    }

    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }

    pub fn envelope_value(&self) -> f32 {
        self.left.envelope_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChannelMode;

    #[test]
    fn offset_produces_a_divergence_between_channels() {
        let mut layer = StereoLayer::new();
        layer.initialize(48_000.0, 0.001, 0.001);
        let cfg = LayerConfiguration::new(440.0, 0.0, 0.0, 1.0, ChannelMode::Stereo, 10.0, 0.0, 48_000.0).unwrap();
        let mut left = [0.0f32; 4096];
        let mut right = [0.0f32; 4096];
        layer.update_and_process(&mut left, &mut right, 48_000.0, &cfg, true);
        assert!(left.iter().zip(right.iter()).any(|(l, r)| (l - r).abs() > 1e-6));
    }
}
