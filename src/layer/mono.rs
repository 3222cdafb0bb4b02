//! A single signal path: carrier → pre-mod headroom → AM → envelope → weight.

use crate::config::LayerConfiguration;
use crate::dsp::{AmModulator, Envelope, Lfo, SineOscillator};
use crate::types::{MAX_BUFFER, PRE_MOD_HEADROOM};

/// Owns one carrier, one LFO, and one envelope; renders one mono signal path.
pub struct MonoLayer {
    oscillator: SineOscillator,
    lfo: Lfo,
    envelope: Envelope,
    modulator_scratch: Vec<f32>,
    initialized: bool,
}

impl Default for MonoLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl MonoLayer {
    pub fn new() -> Self {
        Self {
            oscillator: SineOscillator::new(),
            lfo: Lfo::new(),
            envelope: Envelope::new(),
            modulator_scratch: vec![0.0; MAX_BUFFER],
            initialized: false,
        }
    }

    /// Configures the envelope for this layer's lifetime and marks it ready
    /// to render. Allocates the modulator scratch buffer once, growing it
    /// only if later asked to render a block larger than `MAX_BUFFER`.
    pub fn initialize(&mut self, sr: f32, attack_s: f32, release_s: f32) {
        self.envelope.configure(attack_s, release_s, sr);
        self.initialized = true;
    }

    /// Renders one block of this layer's output into `block`, driven by
    /// `carrier_hz` (the caller picks left/right carrier for a stereo pair)
    /// and the remaining fields of `cfg`. `gate` is `true` while the engine
    /// is playing (the envelope is held open); once the engine has been
    /// stopped the caller passes `false` and the envelope is left to decay
    /// toward whatever target `trigger_release` last set, producing the
    /// release tail.
    pub fn update_and_process(
        &mut self,
        block: &mut [f32],
        sr: f32,
        carrier_hz: f32,
        cfg: &LayerConfiguration,
        gate: bool,
    ) {
        if !self.initialized {
            block.fill(0.0);
            return;
        }

        if block.len() > self.modulator_scratch.len() {
            self.modulator_scratch.resize(block.len(), 0.0);
        }

        self.oscillator.set_frequency(carrier_hz, sr);
        if gate {
            self.envelope.trigger(true);
        }

        self.oscillator.process(block);
        for sample in block.iter_mut() {
            *sample *= PRE_MOD_HEADROOM;
        }

        if cfg.modulator_hz() > 0.0 && cfg.modulator_depth() > 0.0 {
            self.lfo.set_frequency(cfg.modulator_hz(), sr);
            let modulator = &mut self.modulator_scratch[..block.len()];
            self.lfo.process(modulator);
            AmModulator::apply(block, modulator, cfg.modulator_depth());
        }

        self.envelope.process(block);

        let weight = cfg.weight();
        if weight == 0.0 {
            block.fill(0.0);
        } else if weight != 1.0 {
            for sample in block.iter_mut() {
                *sample *= weight;
            }
        }
    }

    /// Begins the release phase; audio continues to render through the
    /// release tail rather than stopping immediately.
    pub fn trigger_release(&mut self) {
        self.envelope.trigger(false);
    }

    pub fn reset(&mut self) {
        self.oscillator.reset();
        self.lfo.reset();
        self.envelope.reset();
    }

    pub fn envelope_value(&self) -> f32 {
        self.envelope.current()
    }
}
