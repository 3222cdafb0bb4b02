//! `AudioEngine`: the public façade that owns the layer pool, performs
//! lock-free configuration handoff between the control and audio threads,
//! applies master-gain smoothing and a hard safety clamp, and degrades
//! gracefully on repeated faults.

use arc_swap::{ArcSwap, ArcSwapOption};
use crossbeam_channel::{Receiver, Sender};
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::config::{EngineConfig, LayerSnapshot};
use crate::error::EngineError;
use crate::metrics::EngineMetrics;
use crate::mixer::Mixer;
use crate::types::{ChannelMode, MASTER_GAIN_SLEW, MAX_BUFFER, MAX_CONSECUTIVE_ERRORS, OUTPUT_CLAMP};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
enum EngineState {
    Uninitialized = 0,
    Initialized = 1,
    Playing = 2,
    Stopped = 3,
    Disposed = 4,
}

impl EngineState {
    fn from_tag(tag: u8) -> Self {
        match tag {
            0 => Self::Uninitialized,
            1 => Self::Initialized,
            2 => Self::Playing,
            3 => Self::Stopped,
            _ => Self::Disposed,
        }
    }
}

/// The closed set of things that can go wrong inside `fill_*_buffer`,
/// packed into a single tag byte so the error slot stays lock-free.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
enum RenderFaultReason {
    MonoRenderFailed = 1,
    StereoRenderFailed = 2,
    #[cfg(any(test, feature = "test-util"))]
    Injected = 3,
}

impl RenderFaultReason {
    fn as_str(self) -> &'static str {
        match self {
            Self::MonoRenderFailed => "mono render failed",
            Self::StereoRenderFailed => "stereo render failed",
            #[cfg(any(test, feature = "test-util"))]
            Self::Injected => "injected test fault",
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::MonoRenderFailed),
            2 => Some(Self::StereoRenderFailed),
            #[cfg(any(test, feature = "test-util"))]
            3 => Some(Self::Injected),
            _ => None,
        }
    }
}

/// Lock-free last-fault slot: a single tagged atomic byte, no heap
/// allocation and no lock on the audio thread's write path.
#[derive(Default)]
struct ErrorSlot {
    tag: AtomicU8,
}

impl ErrorSlot {
    const NONE: u8 = 0;

    fn store(&self, reason: RenderFaultReason) {
        self.tag.store(reason as u8, Ordering::SeqCst);
    }

    fn clear(&self) {
        self.tag.store(Self::NONE, Ordering::SeqCst);
    }

    fn load(&self) -> Option<EngineError> {
        RenderFaultReason::from_tag(self.tag.load(Ordering::SeqCst))
            .map(|reason| EngineError::InternalRenderFault(reason.as_str()))
    }
}

/// A critical-error notification delivered off the audio thread. Subscribers
/// must tolerate being invoked on a non-UI thread.
#[derive(Clone, Debug)]
pub struct CriticalErrorNotification {
    pub error: EngineError,
}

/// State touched only from inside `fill_mono_buffer`/`fill_stereo_buffer`.
/// Lives behind an `UnsafeCell` rather than a lock: the audio thread is the
/// only caller of those two methods, so exclusive access falls out of the
/// single-caller contract instead of runtime synchronization.
struct AudioThreadState {
    mixer: Mixer,
    consecutive_error_count: u32,
}

/// The top-level DSP engine facade.
///
/// Every control-thread operation (`initialize`, `update_configs`, `start`,
/// `stop`, `reset`, `dispose`, the gain/metering accessors) and both
/// audio-thread entry points (`fill_mono_buffer`, `fill_stereo_buffer`) take
/// `&self`, so callers share one engine behind an `Arc` between the control
/// thread and the real-time audio thread. The render path never allocates,
/// locks, or blocks: configuration handoff goes through `ArcSwap`, the state
/// machine and error slot are tagged atomics, and the fields only the audio
/// thread touches (`mixer`, the fault counter) live behind an `UnsafeCell`.
pub struct AudioEngine {
    sample_rate: f32,
    engine_config: EngineConfig,
    channel_mode: AtomicU8,
    state: AtomicU8,
    release_pending: AtomicBool,
    snapshot: ArcSwap<LayerSnapshot>,
    config_dirty: AtomicBool,
    master_gain_target_fixed: AtomicU32,
    smoothed_master_gain_fixed: AtomicU32,
    error_slot: ErrorSlot,
    has_critical_error: AtomicBool,
    metrics: EngineMetrics,
    notification_tx: ArcSwapOption<Sender<CriticalErrorNotification>>,
    notification_thread: Mutex<Option<JoinHandle<()>>>,
    audio_state: UnsafeCell<AudioThreadState>,
}

// SAFETY: `audio_state` is only ever dereferenced mutably from
// `fill_mono_buffer`/`fill_stereo_buffer` and the methods they call
// directly; callers are responsible for never driving both from more than
// one thread at a time (the audio thread owns both). Every other field is
// an atomic, an `ArcSwap`/`ArcSwapOption`, or a `Mutex` taken only off the
// render path. Mirrors `StreamCallback`'s `unsafe impl Sync` in the cubeb
// output backend this crate's concurrency design is grounded on.
unsafe impl Sync for AudioEngine {}

impl AudioEngine {
    /// Constructs an engine for `sample_rate`, which must lie in
    /// `[SR_MIN, SR_MAX]`, with the default attack/release times
    /// (`DEFAULT_ATTACK_S`/`DEFAULT_RELEASE_S`).
    pub fn new(sample_rate: f32) -> Result<Self, EngineError> {
        Self::with_config(EngineConfig::new(sample_rate)?)
    }

    /// Constructs an engine from a fully-specified [`EngineConfig`],
    /// allowing non-default attack/release times.
    pub fn with_config(engine_config: EngineConfig) -> Result<Self, EngineError> {
        let sample_rate = engine_config.sample_rate();
        Ok(Self {
            sample_rate,
            engine_config,
            channel_mode: AtomicU8::new(ChannelMode::Mono as u8),
            state: AtomicU8::new(EngineState::Uninitialized as u8),
            release_pending: AtomicBool::new(false),
            snapshot: ArcSwap::from_pointee(LayerSnapshot::default()),
            config_dirty: AtomicBool::new(false),
            master_gain_target_fixed: AtomicU32::new(1.0f32.to_bits()),
            smoothed_master_gain_fixed: AtomicU32::new(1.0f32.to_bits()),
            error_slot: ErrorSlot::default(),
            has_critical_error: AtomicBool::new(false),
            metrics: EngineMetrics::default(),
            notification_tx: ArcSwapOption::empty(),
            notification_thread: Mutex::new(None),
            audio_state: UnsafeCell::new(AudioThreadState {
                mixer: Mixer::new(),
                consecutive_error_count: 0,
            }),
        })
    }

    #[allow(clippy::mut_from_ref)]
    fn audio_state(&self) -> &mut AudioThreadState {
        // SAFETY: see the `unsafe impl Sync` justification above. Every
        // caller within this file obtains this reference exactly once per
        // `fill_*_buffer`/`reset`/`inject_render_fault_for_test` call and
        // threads it through explicitly rather than re-deriving it, so no
        // two live `&mut` references to the same state ever coexist.
        unsafe { &mut *self.audio_state.get() }
    }

    fn state(&self) -> EngineState {
        EngineState::from_tag(self.state.load(Ordering::SeqCst))
    }

    /// One-time setup: validates and publishes the first snapshot, sizes the
    /// mixer's layer pool, and spawns the background critical-error
    /// notification thread. Must be called exactly once, before `start`.
    pub fn initialize(&self, configs: LayerSnapshot, mode: ChannelMode) -> Result<(), EngineError> {
        for cfg in configs.as_slice() {
            cfg.validate(self.sample_rate)?;
        }

        self.channel_mode.store(mode as u8, Ordering::SeqCst);
        self.audio_state().mixer.initialize(
            self.sample_rate,
            mode,
            self.engine_config.attack_s(),
            self.engine_config.release_s(),
        );
        self.snapshot.store(Arc::new(configs));

        let (tx, rx) = crossbeam_channel::bounded::<CriticalErrorNotification>(8);
        let thread = std::thread::spawn(move || Self::run_notification_loop(rx));
        self.notification_tx.store(Some(Arc::new(tx)));
        *self.notification_thread.lock().unwrap() = Some(thread);

        self.state.store(EngineState::Initialized as u8, Ordering::SeqCst);
        log::debug!("engine initialized: sample_rate={}", self.sample_rate);
        Ok(())
    }

    fn run_notification_loop(rx: Receiver<CriticalErrorNotification>) {
        for notification in rx.iter() {
            log::error!("critical render error latched: {}", notification.error);
        }
    }

    /// Validates and atomically replaces the published snapshot. Lock-free
    /// and safe to call from the control thread while audio is playing.
    pub fn update_configs(&self, configs: LayerSnapshot) -> Result<(), EngineError> {
        if self.state() == EngineState::Disposed {
            return Err(EngineError::Disposed);
        }
        for cfg in configs.as_slice() {
            cfg.validate(self.sample_rate)?;
        }
        self.snapshot.store(Arc::new(configs));
        self.config_dirty.store(true, Ordering::SeqCst);
        log::debug!("engine configuration updated");
        Ok(())
    }

    pub fn start(&self) -> Result<(), EngineError> {
        match self.state() {
            EngineState::Disposed => return Err(EngineError::Disposed),
            EngineState::Uninitialized => return Err(EngineError::NotInitialized),
            _ => {}
        }
        self.state.store(EngineState::Playing as u8, Ordering::SeqCst);
        log::debug!("engine started");
        Ok(())
    }

    /// Triggers the release phase; the callback continues to render until
    /// silence rather than stopping abruptly. The actual release trigger is
    /// applied from the next `fill_*_buffer` call on the audio thread, since
    /// the mixer is audio-thread-exclusive state.
    pub fn stop(&self) -> Result<(), EngineError> {
        if self.state() == EngineState::Disposed {
            return Err(EngineError::Disposed);
        }
        self.release_pending.store(true, Ordering::SeqCst);
        self.state.store(EngineState::Stopped as u8, Ordering::SeqCst);
        log::debug!("engine stopped (release in progress)");
        Ok(())
    }

    /// Resets oscillator, LFO, and envelope state for every layer. Must only
    /// be called while not playing, i.e. with no concurrent
    /// `fill_*_buffer` call in flight on the audio thread.
    pub fn reset(&self) -> Result<(), EngineError> {
        if self.state() == EngineState::Disposed {
            return Err(EngineError::Disposed);
        }
        let audio_state = self.audio_state();
        audio_state.mixer.reset();
        audio_state.consecutive_error_count = 0;
        self.error_slot.clear();
        self.has_critical_error.store(false, Ordering::SeqCst);
        self.metrics.reset();
        log::debug!("engine reset");
        Ok(())
    }

    /// Idempotent. Forbids all further calls and releases the notification
    /// thread.
    pub fn dispose(&self) {
        if self.state() == EngineState::Disposed {
            return;
        }
        self.notification_tx.store(None);
        if let Some(thread) = self.notification_thread.lock().unwrap().take() {
            let _ = thread.join();
        }
        self.state.store(EngineState::Disposed as u8, Ordering::SeqCst);
        log::debug!("engine disposed");
    }

    pub fn set_master_gain(&self, v: f32) {
        let clamped = v.clamp(0.0, 1.0);
        self.master_gain_target_fixed
            .store(clamped.to_bits(), Ordering::Relaxed);
    }

    pub fn output_gain(&self) -> f32 {
        f32::from_bits(self.smoothed_master_gain_fixed.load(Ordering::Relaxed)).clamp(0.0, 1.0)
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Reads the last envelope value the audio thread recorded for layer
    /// `i`, via the lock-free metrics array rather than the audio-thread-
    /// exclusive mixer directly.
    pub fn get_layer_envelope_value(&self, i: usize) -> f32 {
        if self.state() == EngineState::Disposed {
            return 0.0;
        }
        self.metrics.layer_envelope(i)
    }

    /// Returns the last stored error (if any) and whether the engine has
    /// latched into the critical-error state. Safe for control-thread
    /// polling.
    pub fn try_get_critical_error(&self) -> (Option<EngineError>, bool) {
        (self.error_slot.load(), self.has_critical_error.load(Ordering::SeqCst))
    }

    fn advance_master_gain(&self, len: usize) {
        let target = f32::from_bits(self.master_gain_target_fixed.load(Ordering::Relaxed));
        let mut smoothed = f32::from_bits(self.smoothed_master_gain_fixed.load(Ordering::Relaxed));
        for _ in 0..len {
            smoothed += (target - smoothed) * MASTER_GAIN_SLEW;
        }
        self.smoothed_master_gain_fixed.store(smoothed.to_bits(), Ordering::Relaxed);
    }

    fn apply_output_stage(&self, block: &mut [f32]) {
        let gain = self.output_gain();
        for sample in block.iter_mut() {
            *sample = (*sample * gain).clamp(-OUTPUT_CLAMP, OUTPUT_CLAMP);
        }
    }

    fn record_fault(&self, audio_state: &mut AudioThreadState, reason: RenderFaultReason) {
        audio_state.consecutive_error_count += 1;
        self.error_slot.store(reason);
        if audio_state.consecutive_error_count >= MAX_CONSECUTIVE_ERRORS {
            self.has_critical_error.store(true, Ordering::SeqCst);
            self.state.store(EngineState::Stopped as u8, Ordering::SeqCst);
            if let Some(tx) = self.notification_tx.load().as_deref() {
                let _ = tx.try_send(CriticalErrorNotification {
                    error: EngineError::InternalRenderFault(reason.as_str()),
                });
            }
        }
    }

    fn record_success(&self, audio_state: &mut AudioThreadState) {
        audio_state.consecutive_error_count = 0;
    }

    /// Test-only hook for exercising the consecutive-error guard without a
    /// real internal fault source (this engine's render path is pure
    /// arithmetic and has no other way to fail once a snapshot validates).
    /// Gated behind the `test-util` feature so integration tests under
    /// `tests/` can reach it without exposing it in ordinary builds.
    #[cfg(any(test, feature = "test-util"))]
    pub fn inject_render_fault_for_test(&self) {
        let audio_state = self.audio_state();
        self.record_fault(audio_state, RenderFaultReason::Injected);
    }

    /// Hard real-time entry point for a mono engine: does not allocate,
    /// block, lock, or log.
    pub fn fill_mono_buffer(&self, block: &mut [f32]) -> Result<(), EngineError> {
        if self.state() == EngineState::Disposed {
            return Err(EngineError::Disposed);
        }
        if self.channel_mode.load(Ordering::SeqCst) != ChannelMode::Mono as u8 {
            return Err(EngineError::ChannelModeMismatch);
        }
        if block.len() > MAX_BUFFER {
            return Err(EngineError::InvalidBufferGeometry);
        }

        let state = self.state();
        let audio_state = self.audio_state();

        if self.release_pending.swap(false, Ordering::SeqCst) {
            audio_state.mixer.trigger_release_all();
        }

        // Only Playing and Stopped render: Stopped still plays out the
        // release tail triggered by `stop()`. Uninitialized/Initialized
        // produce silence without touching the mixer.
        if state != EngineState::Playing && state != EngineState::Stopped {
            block.fill(0.0);
            return Ok(());
        }
        let gate = state == EngineState::Playing;

        let snapshot = self.snapshot.load();
        self.config_dirty.store(false, Ordering::Relaxed);

        let sample_rate = self.sample_rate;
        #[cfg(feature = "assert-allocs")]
        let result = assert_no_alloc::assert_no_alloc(|| {
            audio_state.mixer.render_mono(block, sample_rate, snapshot.as_slice(), gate)
        });
        #[cfg(not(feature = "assert-allocs"))]
        let result = audio_state.mixer.render_mono(block, sample_rate, snapshot.as_slice(), gate);

        match result {
            Ok(()) => {
                self.record_success(audio_state);
                self.advance_master_gain(block.len());
                self.apply_output_stage(block);
                for i in 0..snapshot.len() {
                    self.metrics
                        .set_layer_envelope(i, audio_state.mixer.get_layer_envelope_value(i, snapshot.as_slice()));
                }
                Ok(())
            }
            Err(_) => {
                block.fill(0.0);
                self.record_fault(audio_state, RenderFaultReason::MonoRenderFailed);
                Ok(())
            }
        }
    }

    /// Hard real-time entry point for a stereo engine: does not allocate,
    /// block, lock, or log.
    pub fn fill_stereo_buffer(&self, left: &mut [f32], right: &mut [f32]) -> Result<(), EngineError> {
        if self.state() == EngineState::Disposed {
            return Err(EngineError::Disposed);
        }
        if self.channel_mode.load(Ordering::SeqCst) != ChannelMode::Stereo as u8 {
            return Err(EngineError::ChannelModeMismatch);
        }
        if left.len() != right.len() || left.len() > MAX_BUFFER {
            return Err(EngineError::InvalidBufferGeometry);
        }

        let state = self.state();
        let audio_state = self.audio_state();

        if self.release_pending.swap(false, Ordering::SeqCst) {
            audio_state.mixer.trigger_release_all();
        }

        if state != EngineState::Playing && state != EngineState::Stopped {
            left.fill(0.0);
            right.fill(0.0);
            return Ok(());
        }
        let gate = state == EngineState::Playing;

        let snapshot = self.snapshot.load();
        self.config_dirty.store(false, Ordering::Relaxed);

        let sample_rate = self.sample_rate;
        #[cfg(feature = "assert-allocs")]
        let result = assert_no_alloc::assert_no_alloc(|| {
            audio_state.mixer.render_stereo(left, right, sample_rate, snapshot.as_slice(), gate)
        });
        #[cfg(not(feature = "assert-allocs"))]
        let result = audio_state.mixer.render_stereo(left, right, sample_rate, snapshot.as_slice(), gate);

        match result {
            Ok(()) => {
                self.record_success(audio_state);
                self.advance_master_gain(left.len());
                self.apply_output_stage(left);
                self.apply_output_stage(right);
                for i in 0..snapshot.len() {
                    self.metrics
                        .set_layer_envelope(i, audio_state.mixer.get_layer_envelope_value(i, snapshot.as_slice()));
                }
                Ok(())
            }
            Err(_) => {
                left.fill(0.0);
                right.fill(0.0);
                self.record_fault(audio_state, RenderFaultReason::StereoRenderFailed);
                Ok(())
            }
        }
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}
