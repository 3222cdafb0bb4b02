//! Error types for the duotone audio engine.

use std::fmt;

/// A configuration field that failed validation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ConfigField {
    CarrierHz,
    ModulatorHz,
    ModulatorDepth,
    Weight,
    StereoOffsetHz,
    Pan,
    LayerCount,
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CarrierHz => "carrier_hz",
            Self::ModulatorHz => "modulator_hz",
            Self::ModulatorDepth => "modulator_depth",
            Self::Weight => "weight",
            Self::StereoOffsetHz => "stereo_offset_hz",
            Self::Pan => "pan",
            Self::LayerCount => "layer_count",
        };
        f.write_str(name)
    }
}

/// Errors the duotone engine can report.
///
/// Validation errors (`InvalidSampleRate`, `InvalidConfiguration`) propagate
/// to the caller immediately and leave engine state unchanged.
/// `InternalRenderFault` is never returned synchronously from
/// `fill_*_buffer`; it is only ever stashed in the engine's error slot (see
/// [`crate::engine::AudioEngine::try_get_critical_error`]).
#[derive(Clone, Debug, PartialEq)]
pub enum EngineError {
    /// Sample rate was outside `[SR_MIN, SR_MAX]`.
    InvalidSampleRate(f32),
    /// A `LayerConfiguration` field failed validation.
    InvalidConfiguration { field: ConfigField },
    /// `start()` was called before `initialize()`.
    NotInitialized,
    /// `fill_mono_buffer` was called on a stereo engine, or vice versa.
    ChannelModeMismatch,
    /// Mismatched left/right buffer lengths, or a block larger than `MAX_BUFFER`.
    InvalidBufferGeometry,
    /// Any call made after `dispose()`.
    Disposed,
    /// An unexpected fault occurred inside `fill_*_buffer`.
    ///
    /// Never returned synchronously; the callback that encountered it
    /// cleared its buffer to silence and stashed this value in the error
    /// slot instead.
    InternalRenderFault(&'static str),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSampleRate(sr) => {
                write!(f, "invalid sample rate: {sr} (expected 8000..=192000)")
            }
            Self::InvalidConfiguration { field } => {
                write!(f, "invalid layer configuration field: {field}")
            }
            Self::NotInitialized => write!(f, "engine is not initialized"),
            Self::ChannelModeMismatch => {
                write!(f, "fill buffer call did not match the engine's channel mode")
            }
            Self::InvalidBufferGeometry => {
                write!(f, "buffer geometry is invalid (mismatched lengths or too large)")
            }
            Self::Disposed => write!(f, "engine has been disposed"),
            Self::InternalRenderFault(reason) => {
                write!(f, "internal render fault: {reason}")
            }
        }
    }
}

impl std::error::Error for EngineError {}
