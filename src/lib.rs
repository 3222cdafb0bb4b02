//! A deterministic real-time binaural/isochronic tone engine.
//!
//! The crate's only job is the `fill_*_buffer` / `update_configs` contract:
//! a control thread publishes [`config::LayerSnapshot`]s, an audio thread
//! repeatedly pulls blocks of samples out of an [`engine::AudioEngine`]. No
//! audio device bridge, UI, or persistence lives here.

pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod layer;
pub mod metrics;
pub mod mixer;
pub mod types;

pub use config::{EngineConfig, LayerConfiguration, LayerSnapshot};
pub use engine::{AudioEngine, CriticalErrorNotification};
pub use error::{ConfigField, EngineError};
pub use metrics::EngineMetrics;
pub use types::{
    ChannelMode, CARRIER_HZ_MAX, CARRIER_HZ_MIN, CONTROL_RATE, DEFAULT_ATTACK_S,
    DEFAULT_RELEASE_S, MAX_BUFFER, MAX_CONSECUTIVE_ERRORS, MAX_LAYERS, MIN_ENV_S, MIX_HEADROOM,
    MODULATOR_HZ_MAX, MODULATOR_HZ_MIN, SR_DEFAULT, SR_MAX, SR_MIN,
};
