//! Lock-free engine telemetry, read by the control thread for metering.

use crate::types::MAX_LAYERS;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

const LOAD_SCALE: f32 = 1_000_000.0;
const DEFAULT_SMOOTHING: f32 = 0.9;

/// Measures DSP load as the ratio of render time to the buffer's real-time
/// budget. A load of 1.0 means the render consumed the entire budget.
pub struct ProcessLoadMeasurer {
    buffer_time_ns: AtomicU64,
    load_fixed: AtomicU32,
    smoothing: f32,
}

impl Default for ProcessLoadMeasurer {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING)
    }
}

impl ProcessLoadMeasurer {
    /// Smoothing in `[0.0, 0.99]`: higher means a slower-responding reading.
    pub fn new(smoothing: f32) -> Self {
        Self {
            buffer_time_ns: AtomicU64::new(0),
            load_fixed: AtomicU32::new(0),
            smoothing: smoothing.clamp(0.0, 0.99),
        }
    }

    /// Sets the real-time budget for one block: `block_len / sample_rate`
    /// in nanoseconds.
    pub fn set_buffer_time(&self, ns: u64) {
        self.buffer_time_ns.store(ns, Ordering::Relaxed);
    }

    /// Returns an RAII timer that records elapsed time into this measurer
    /// on drop.
    pub fn start_timer(&self) -> ScopedTimer<'_> {
        ScopedTimer {
            measurer: self,
            start: Instant::now(),
        }
    }

    pub fn record_sample(&self, elapsed_ns: u64) {
        let buffer_ns = self.buffer_time_ns.load(Ordering::Relaxed);
        if buffer_ns == 0 {
            return;
        }

        let instant_load = (elapsed_ns as f64 / buffer_ns as f64).min(2.0) as f32;
        let old_fixed = self.load_fixed.load(Ordering::Relaxed);
        let old_load = old_fixed as f32 / LOAD_SCALE;
        let new_load = self.smoothing * old_load + (1.0 - self.smoothing) * instant_load;
        let new_fixed = (new_load * LOAD_SCALE) as u32;

        self.load_fixed.store(new_fixed, Ordering::Relaxed);
    }

    pub fn get_load(&self) -> f32 {
        self.load_fixed.load(Ordering::Relaxed) as f32 / LOAD_SCALE
    }

    pub fn reset(&self) {
        self.load_fixed.store(0, Ordering::Relaxed);
    }
}

/// RAII timer that records its elapsed lifetime into a [`ProcessLoadMeasurer`]
/// on drop.
pub struct ScopedTimer<'a> {
    measurer: &'a ProcessLoadMeasurer,
    start: Instant,
}

impl Drop for ScopedTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed().as_nanos() as u64;
        self.measurer.record_sample(elapsed);
    }
}

/// Cross-thread engine metrics: written only from the audio thread, read
/// only from the control thread for metering. Tearing on the per-layer
/// envelope reads yields only a visual artifact, never a correctness issue,
/// so plain relaxed atomics are sufficient.
pub struct EngineMetrics {
    pub load: ProcessLoadMeasurer,
    layer_envelope_fixed: [AtomicU32; MAX_LAYERS],
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self {
            load: ProcessLoadMeasurer::default(),
            layer_envelope_fixed: std::array::from_fn(|_| AtomicU32::new(0)),
        }
    }
}

impl EngineMetrics {
    /// Records the current envelope value for layer `index`, called once per
    /// block from the audio thread. Out-of-range indices are ignored.
    pub fn set_layer_envelope(&self, index: usize, value: f32) {
        if let Some(slot) = self.layer_envelope_fixed.get(index) {
            slot.store(value.to_bits(), Ordering::Relaxed);
        }
    }

    /// Returns the last recorded envelope value for layer `index`, or `0.0`
    /// if out of range. Never fails.
    pub fn layer_envelope(&self, index: usize) -> f32 {
        self.layer_envelope_fixed
            .get(index)
            .map(|slot| f32::from_bits(slot.load(Ordering::Relaxed)))
            .unwrap_or(0.0)
    }

    pub fn reset(&self) {
        for slot in &self.layer_envelope_fixed {
            slot.store(0, Ordering::Relaxed);
        }
        self.load.reset();
    }
}
