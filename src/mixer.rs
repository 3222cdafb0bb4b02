//! Fixed-size layer pool with additive summation and equal-power panning.

use crate::config::LayerConfiguration;
use crate::error::EngineError;
use crate::layer::{MonoLayer, StereoLayer};
use crate::types::{ChannelMode, MAX_BUFFER, MAX_LAYERS, MIX_HEADROOM};

/// Owns a fixed-size pool of mono and stereo layer slots, allocated once at
/// `initialize`, and the scratch buffers used to render each layer before
/// summing it into the mix.
pub struct Mixer {
    mono_slots: Vec<MonoLayer>,
    stereo_slots: Vec<StereoLayer>,
    mono_tmp: Vec<f32>,
    left_tmp: Vec<f32>,
    right_tmp: Vec<f32>,
    output_mode: ChannelMode,
}

impl Mixer {
    pub fn new() -> Self {
        Self {
            mono_slots: Vec::new(),
            stereo_slots: Vec::new(),
            mono_tmp: vec![0.0; MAX_BUFFER],
            left_tmp: vec![0.0; MAX_BUFFER],
            right_tmp: vec![0.0; MAX_BUFFER],
            output_mode: ChannelMode::Mono,
        }
    }

    /// Allocates the full fixed-size pool of `MAX_LAYERS` mono and
    /// `MAX_LAYERS` stereo slots and configures their envelopes, regardless
    /// of how many layers the snapshot passed to `initialize` actually
    /// uses — a later `update_configs` may publish a snapshot with more
    /// layers (still ≤ `MAX_LAYERS`), and every slot it could possibly
    /// address must already exist. Called exactly once, from
    /// `AudioEngine::initialize`.
    pub fn initialize(&mut self, sr: f32, mode: ChannelMode, attack_s: f32, release_s: f32) {
        self.mono_slots = (0..MAX_LAYERS)
            .map(|_| {
                let mut layer = MonoLayer::new();
                layer.initialize(sr, attack_s, release_s);
                layer
            })
            .collect();
        self.stereo_slots = (0..MAX_LAYERS)
            .map(|_| {
                let mut layer = StereoLayer::new();
                layer.initialize(sr, attack_s, release_s);
                layer
            })
            .collect();
        self.output_mode = mode;
    }

    fn ensure_scratch_len(&mut self, len: usize) {
        if len > self.mono_tmp.len() {
            self.mono_tmp.resize(len, 0.0);
            self.left_tmp.resize(len, 0.0);
            self.right_tmp.resize(len, 0.0);
        }
    }

    /// Additively renders `configs` into `out`, then applies `MIX_HEADROOM`.
    /// Errors if the mixer was initialized in stereo mode. `gate` is `false`
    /// once the engine has been stopped, letting envelopes decay through
    /// their release tail instead of being re-triggered.
    pub fn render_mono(
        &mut self,
        out: &mut [f32],
        sr: f32,
        configs: &[LayerConfiguration],
        gate: bool,
    ) -> Result<(), EngineError> {
        if self.output_mode != ChannelMode::Mono {
            return Err(EngineError::ChannelModeMismatch);
        }
        self.ensure_scratch_len(out.len());
        out.fill(0.0);

        let count = configs.len().min(MAX_LAYERS);
        for i in 0..count {
            let scratch = &mut self.mono_tmp[..out.len()];
            self.mono_slots[i].update_and_process(scratch, sr, configs[i].carrier_hz(), &configs[i], gate);
            for (o, s) in out.iter_mut().zip(scratch.iter()) {
                *o += *s;
            }
        }

        for sample in out.iter_mut() {
            *sample *= MIX_HEADROOM;
        }
        Ok(())
    }

    /// Additively renders `configs` into `left`/`right`, panning mono layers
    /// with an equal-power law, then applies `MIX_HEADROOM` to both
    /// channels. Errors if the mixer was initialized in mono mode, or if
    /// `left.len() != right.len()`.
    pub fn render_stereo(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        sr: f32,
        configs: &[LayerConfiguration],
        gate: bool,
    ) -> Result<(), EngineError> {
        if self.output_mode != ChannelMode::Stereo {
            return Err(EngineError::ChannelModeMismatch);
        }
        if left.len() != right.len() {
            return Err(EngineError::InvalidBufferGeometry);
        }
        self.ensure_scratch_len(left.len());
        left.fill(0.0);
        right.fill(0.0);

        let count = configs.len().min(MAX_LAYERS);
        for i in 0..count {
            let cfg = &configs[i];
            if cfg.channel_mode() == ChannelMode::Stereo {
                let l_scratch = &mut self.left_tmp[..left.len()];
                let r_scratch = &mut self.right_tmp[..right.len()];
                self.stereo_slots[i].update_and_process(l_scratch, r_scratch, sr, cfg, gate);
                for (o, s) in left.iter_mut().zip(l_scratch.iter()) {
                    *o += *s;
                }
                for (o, s) in right.iter_mut().zip(r_scratch.iter()) {
                    *o += *s;
                }
            } else {
                let scratch = &mut self.mono_tmp[..left.len()];
                self.mono_slots[i].update_and_process(scratch, sr, cfg.carrier_hz(), cfg, gate);
                let theta = (cfg.pan() + 1.0) * std::f32::consts::FRAC_PI_4;
                let gain_l = theta.cos();
                let gain_r = theta.sin();
                for ((l, r), s) in left.iter_mut().zip(right.iter_mut()).zip(scratch.iter()) {
                    *l += *s * gain_l;
                    *r += *s * gain_r;
                }
            }
        }

        for sample in left.iter_mut() {
            *sample *= MIX_HEADROOM;
        }
        for sample in right.iter_mut() {
            *sample *= MIX_HEADROOM;
        }
        Ok(())
    }

    pub fn trigger_release_all(&mut self) {
        for layer in &mut self.mono_slots {
            layer.trigger_release();
        }
        for layer in &mut self.stereo_slots {
            layer.trigger_release();
        }
    }

    pub fn reset(&mut self) {
        for layer in &mut self.mono_slots {
            layer.reset();
        }
        for layer in &mut self.stereo_slots {
            layer.reset();
        }
    }

    /// Bounds-safe metering accessor; returns `0.0` for an out-of-range
    /// index rather than failing.
    ///
    /// In a mono-output mixer every layer renders through a mono slot
    /// regardless of its own `channel_mode` (see [`Mixer::render_mono`]), so
    /// the mono slot is always the right one to meter. In a stereo-output
    /// mixer, `render_stereo` picks a stereo or mono slot per layer
    /// depending on that layer's own `channel_mode` — a mono layer panned
    /// into a stereo mix never touches its stereo slot, so metering must
    /// follow the same per-layer choice or it reads a slot that was never
    /// rendered into.
    pub fn get_layer_envelope_value(&self, i: usize, configs: &[LayerConfiguration]) -> f32 {
        match self.output_mode {
            ChannelMode::Mono => self.mono_slots.get(i).map(|l| l.envelope_value()).unwrap_or(0.0),
            ChannelMode::Stereo => {
                let renders_as_stereo = configs
                    .get(i)
                    .map(|cfg| cfg.channel_mode() == ChannelMode::Stereo)
                    .unwrap_or(false);
                if renders_as_stereo {
                    self.stereo_slots.get(i).map(|l| l.envelope_value()).unwrap_or(0.0)
                } else {
                    self.mono_slots.get(i).map(|l| l.envelope_value()).unwrap_or(0.0)
                }
            }
        }
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(pan: f32) -> LayerConfiguration {
        LayerConfiguration::new(440.0, 0.0, 0.0, 1.0, ChannelMode::Mono, 0.0, pan, 48_000.0).unwrap()
    }

    #[test]
    fn mono_layer_in_stereo_mode_with_zero_pan_is_balanced() {
        let mut mixer = Mixer::new();
        mixer.initialize(48_000.0, ChannelMode::Stereo, 0.001, 0.001);
        let configs = [cfg(0.0)];
        let mut left = [0.0f32; 2048];
        let mut right = [0.0f32; 2048];
        mixer.render_stereo(&mut left, &mut right, 48_000.0, &configs, true).unwrap();
        for (l, r) in left.iter().zip(right.iter()) {
            assert!((l - r).abs() <= 1e-5);
        }
    }

    #[test]
    fn full_left_pan_favors_left_channel() {
        let mut mixer = Mixer::new();
        mixer.initialize(48_000.0, ChannelMode::Stereo, 0.001, 0.001);
        let configs = [cfg(-1.0)];
        let mut left = [0.0f32; 2048];
        let mut right = [0.0f32; 2048];
        mixer.render_stereo(&mut left, &mut right, 48_000.0, &configs, true).unwrap();
        let peak_l = left.iter().fold(0.0f32, |a, s| a.max(s.abs()));
        let peak_r = right.iter().fold(0.0f32, |a, s| a.max(s.abs()));
        assert!(peak_l > 10.0 * peak_r);
    }

    #[test]
    fn wrong_mode_is_rejected() {
        let mut mixer = Mixer::new();
        mixer.initialize(48_000.0, ChannelMode::Mono, 0.001, 0.001);
        let configs = [cfg(0.0)];
        let mut left = [0.0f32; 16];
        let mut right = [0.0f32; 16];
        assert_eq!(
            mixer.render_stereo(&mut left, &mut right, 48_000.0, &configs, true),
            Err(EngineError::ChannelModeMismatch)
        );
    }
}
