//! Per-layer signal renderers: mono and stereo (binaural) variants.

pub mod mono;
pub mod stereo;

pub use mono::MonoLayer;
pub use stereo::StereoLayer;
