//! Configuration types for the duotone audio engine.

use crate::error::{ConfigField, EngineError};
use crate::types::{
    ChannelMode, CARRIER_HZ_MAX, CARRIER_HZ_MIN, DEFAULT_ATTACK_S, DEFAULT_RELEASE_S, MAX_LAYERS,
    MODULATOR_HZ_MAX, MODULATOR_HZ_MIN, NYQUIST_GUARD_FACTOR, SR_DEFAULT, SR_MAX, SR_MIN,
};

/// One layer's immutable, validated configuration.
///
/// Validated once at construction (see [`LayerConfiguration::new`]); every
/// accessor below simply returns a field, never re-checks an invariant.
/// Freely `Copy`, freely shared across threads, never mutated after
/// construction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerConfiguration {
    carrier_hz: f32,
    modulator_hz: f32,
    modulator_depth: f32,
    weight: f32,
    channel_mode: ChannelMode,
    stereo_offset_hz: f32,
    pan: f32,
}

impl LayerConfiguration {
    /// Validates every field against a concrete sample rate.
    ///
    /// A [`LayerConfiguration`] is meaningless without a sample rate (the
    /// carrier range's Nyquist guard depends on it), so construction always
    /// takes one rather than deferring the check to `initialize`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        carrier_hz: f32,
        modulator_hz: f32,
        modulator_depth: f32,
        weight: f32,
        channel_mode: ChannelMode,
        stereo_offset_hz: f32,
        pan: f32,
        sample_rate: f32,
    ) -> Result<Self, EngineError> {
        let cfg = Self {
            carrier_hz,
            modulator_hz,
            modulator_depth,
            weight,
            channel_mode,
            stereo_offset_hz,
            pan,
        };
        cfg.validate(sample_rate)?;
        Ok(cfg)
    }

    /// Re-validates this configuration against a (possibly different) sample
    /// rate. Called by `initialize`/`update_configs`, since sample rate is
    /// engine-instance data that can outlive the rate used at construction.
    pub fn validate(&self, sample_rate: f32) -> Result<(), EngineError> {
        let nyquist = NYQUIST_GUARD_FACTOR * sample_rate;

        if !(CARRIER_HZ_MIN..=CARRIER_HZ_MAX).contains(&self.carrier_hz) || self.carrier_hz >= nyquist
        {
            return Err(EngineError::InvalidConfiguration {
                field: ConfigField::CarrierHz,
            });
        }

        if self.modulator_hz != 0.0
            && !(MODULATOR_HZ_MIN..=MODULATOR_HZ_MAX).contains(&self.modulator_hz)
        {
            return Err(EngineError::InvalidConfiguration {
                field: ConfigField::ModulatorHz,
            });
        }

        if !(0.0..=1.0).contains(&self.modulator_depth) {
            return Err(EngineError::InvalidConfiguration {
                field: ConfigField::ModulatorDepth,
            });
        }

        if !(0.0..=1.0).contains(&self.weight) {
            return Err(EngineError::InvalidConfiguration {
                field: ConfigField::Weight,
            });
        }

        if self.channel_mode == ChannelMode::Stereo {
            let right_hz = self.carrier_hz + self.stereo_offset_hz;
            if !(CARRIER_HZ_MIN..=CARRIER_HZ_MAX).contains(&right_hz) || right_hz >= nyquist {
                return Err(EngineError::InvalidConfiguration {
                    field: ConfigField::StereoOffsetHz,
                });
            }
        }

        if !(-1.0..=1.0).contains(&self.pan) {
            return Err(EngineError::InvalidConfiguration {
                field: ConfigField::Pan,
            });
        }

        Ok(())
    }

    pub fn carrier_hz(&self) -> f32 {
        self.carrier_hz
    }

    pub fn modulator_hz(&self) -> f32 {
        self.modulator_hz
    }

    pub fn modulator_depth(&self) -> f32 {
        self.modulator_depth
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn channel_mode(&self) -> ChannelMode {
        self.channel_mode
    }

    pub fn stereo_offset_hz(&self) -> f32 {
        self.stereo_offset_hz
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    /// The right-channel carrier frequency when rendered as a stereo layer.
    pub fn right_carrier_hz(&self) -> f32 {
        self.carrier_hz + self.stereo_offset_hz
    }
}

/// An ordered, bounded sequence of [`LayerConfiguration`]s, immutable once
/// published. Length never exceeds `MAX_LAYERS`.
#[derive(Clone, Debug, Default)]
pub struct LayerSnapshot {
    layers: Vec<LayerConfiguration>,
}

impl LayerSnapshot {
    /// Builds a snapshot from a non-empty, bounded slice of configurations.
    pub fn new(layers: Vec<LayerConfiguration>) -> Result<Self, EngineError> {
        if layers.is_empty() || layers.len() > MAX_LAYERS {
            return Err(EngineError::InvalidConfiguration {
                field: ConfigField::LayerCount,
            });
        }
        Ok(Self { layers })
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn as_slice(&self) -> &[LayerConfiguration] {
        &self.layers
    }
}

/// Engine-wide, immutable settings that outlive any single layer snapshot.
///
/// Separated from [`LayerSnapshot`] so `initialize` takes a small, clonable
/// pair instead of a combinatorial constructor, following the builder-style
/// ergonomics of an engine config value with `with_*` setters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    sample_rate: f32,
    attack_s: f32,
    release_s: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: SR_DEFAULT,
            attack_s: DEFAULT_ATTACK_S,
            release_s: DEFAULT_RELEASE_S,
        }
    }
}

impl EngineConfig {
    /// Validates the sample rate eagerly; attack/release are clamped to a
    /// sane floor downstream by `Envelope::configure`, so they are not
    /// fallible here.
    pub fn new(sample_rate: f32) -> Result<Self, EngineError> {
        Self::default().with_sample_rate(sample_rate)
    }

    pub fn with_sample_rate(mut self, sample_rate: f32) -> Result<Self, EngineError> {
        if !(SR_MIN..=SR_MAX).contains(&sample_rate) {
            return Err(EngineError::InvalidSampleRate(sample_rate));
        }
        self.sample_rate = sample_rate;
        Ok(self)
    }

    pub fn with_attack_s(mut self, attack_s: f32) -> Self {
        self.attack_s = attack_s;
        self
    }

    pub fn with_release_s(mut self, release_s: f32) -> Self {
        self.release_s = release_s;
        self
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn attack_s(&self) -> f32 {
        self.attack_s
    }

    pub fn release_s(&self) -> f32 {
        self.release_s
    }
}
