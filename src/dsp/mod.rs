//! Low-level DSP primitives: the node graph's leaf and interior nodes.

pub mod envelope;
pub mod lfo;
pub mod modulator;
pub mod oscillator;

pub use envelope::Envelope;
pub use lfo::Lfo;
pub use modulator::AmModulator;
pub use oscillator::SineOscillator;
