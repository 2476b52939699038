use crate::{
    adapter::FrameAdapter,
    error::*,
    meter::LevelCell,
    model::{DenoiseModel, ModelConfig, ModelFactory},
    resampler::{INTERNAL_SAMPLE_RATE, RateConverter, ResamplerQuality},
};

use atomic_float::AtomicF32;
use std::{
    ops::RangeInclusive,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
};

/// Frame length assumed for buffer sizing when no model could be created.
const FALLBACK_FRAME_LEN: usize = 480;

/// Valid attenuation limits in dB.
pub const ATTENUATION_LIMIT_RANGE: RangeInclusive<f32> = 0.0..=100.0;

/// Pipeline tuning passed to [`Processor::with_config`].
///
/// Everything here is validated by [`Processor::prepare`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorConfig {
    /// Capacity in samples of each internal-rate FIFO.
    ///
    /// **Default:** 48000 (one second at 48 kHz)
    pub fifo_capacity: usize,
    /// Attenuation limit in dB the model is created with.
    ///
    /// **Default:** 100.0
    pub attenuation_limit_db: f32,
    /// Smallest change of the attenuation limit, in dB, that is forwarded to the model.
    ///
    /// **Default:** 0.01
    pub attenuation_epsilon_db: f32,
    /// Weight of the newest block in the smoothed input/output levels.
    ///
    /// **Range:** greater than 0.0, up to 1.0
    /// **Default:** 0.5
    pub level_smoothing: f32,
    /// Interpolation quality of the sample-rate converter.
    pub quality: ResamplerQuality,
    /// Log level forwarded to the model backend.
    pub model_log_level: Option<String>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            fifo_capacity: INTERNAL_SAMPLE_RATE as usize,
            attenuation_limit_db: 100.0,
            attenuation_epsilon_db: 0.01,
            level_smoothing: 0.5,
            quality: ResamplerQuality::default(),
            model_log_level: None,
        }
    }
}

impl ProcessorConfig {
    fn validate(&self) -> Result<(), DenoiseError> {
        if self.fifo_capacity == 0 {
            return Err(DenoiseError::InvalidCapacity);
        }
        if !ATTENUATION_LIMIT_RANGE.contains(&self.attenuation_limit_db) {
            return Err(DenoiseError::InvalidConfiguration(format!(
                "attenuation limit {} dB is outside 0..=100 dB",
                self.attenuation_limit_db
            )));
        }
        if !(self.attenuation_epsilon_db >= 0.0 && self.attenuation_epsilon_db.is_finite()) {
            return Err(DenoiseError::InvalidConfiguration(
                "attenuation epsilon must be a non-negative number".to_string(),
            ));
        }
        if !(self.level_smoothing > 0.0 && self.level_smoothing <= 1.0) {
            return Err(DenoiseError::InvalidConfiguration(
                "level smoothing must be in (0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parameters that can be changed from any thread through a [`ProcessorContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessorParameter {
    /// Maximum amount of noise attenuation applied by the model.
    ///
    /// Changes smaller than [`ProcessorConfig::attenuation_epsilon_db`] are
    /// not forwarded to the model.
    ///
    /// **Range:** 0.0 to 100.0 (dB)
    /// - **0.0:** No attenuation
    /// - **100.0:** Unlimited attenuation
    ///
    /// **Default:** 100.0
    AttenuationLimit,
    /// Controls whether the model is bypassed while preserving latency.
    ///
    /// When enabled, frames are copied instead of denoised but still travel
    /// through the FIFOs and resamplers, so toggling bypass never shifts the
    /// output in time.
    ///
    /// **Range:** 0.0 to 1.0
    /// - **below 0.5:** Denoising active
    /// - **0.5 and above:** Bypass enabled
    ///
    /// **Default:** 0.0
    Bypass,
}

/// Lifecycle of a [`Processor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessorState {
    /// Not prepared: never prepared, or the last [`Processor::prepare`] failed.
    Uninitialized,
    /// Buffers sized and model created; no block processed yet.
    Prepared,
    /// At least one block processed since the last preparation.
    Processing,
    /// Resources released. [`Processor::prepare`] starts a new session.
    Released,
}

/// Counters published by the processing thread once per block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Diagnostics {
    /// Samples dropped by FIFO overwrite since preparation.
    pub fifo_overwrites: u64,
    /// Output samples that had to be filled with silence since preparation.
    pub zero_padded_samples: u64,
    /// Up-conversion calls that found too few staged samples.
    pub converter_underruns: u64,
    /// Blocks processed since preparation.
    pub blocks_processed: u64,
}

struct Shared {
    attenuation_limit: AtomicF32,
    bypass: AtomicBool,
    input_level: LevelCell,
    output_level: LevelCell,
    ready: AtomicBool,
    latency: AtomicUsize,
    reset_requested: AtomicBool,
    fifo_overwrites: AtomicU64,
    zero_padded_samples: AtomicU64,
    converter_underruns: AtomicU64,
    blocks_processed: AtomicU64,
}

impl Shared {
    fn new(attenuation_limit_db: f32) -> Self {
        Self {
            attenuation_limit: AtomicF32::new(attenuation_limit_db),
            bypass: AtomicBool::new(false),
            input_level: LevelCell::new(),
            output_level: LevelCell::new(),
            ready: AtomicBool::new(false),
            latency: AtomicUsize::new(0),
            reset_requested: AtomicBool::new(false),
            fifo_overwrites: AtomicU64::new(0),
            zero_padded_samples: AtomicU64::new(0),
            converter_underruns: AtomicU64::new(0),
            blocks_processed: AtomicU64::new(0),
        }
    }

    fn publish(&self, diagnostics: &Diagnostics) {
        self.fifo_overwrites
            .store(diagnostics.fifo_overwrites, Ordering::Relaxed);
        self.zero_padded_samples
            .store(diagnostics.zero_padded_samples, Ordering::Relaxed);
        self.converter_underruns
            .store(diagnostics.converter_underruns, Ordering::Relaxed);
        self.blocks_processed
            .store(diagnostics.blocks_processed, Ordering::Relaxed);
    }
}

/// Thread-safe handle for controlling and observing a [`Processor`].
///
/// Parameter writes are picked up by the processing thread at the start of
/// its next block. Level and diagnostic reads are advisory and may lag by
/// one block.
///
/// # Example
///
/// ```rust
/// # use alt_denoiser::{DenoiseError, DenoiseModel, ModelConfig, Processor, ProcessorParameter};
/// # struct Passthrough;
/// # impl DenoiseModel for Passthrough {
/// #     fn frame_len(&self) -> usize { 480 }
/// #     fn process_frame(&mut self, input: &[f32], output: &mut [f32]) { output.copy_from_slice(input) }
/// #     fn set_attenuation_limit(&mut self, _limit_db: f32) {}
/// # }
/// let processor = Processor::new(|_: &ModelConfig| -> Result<Box<dyn DenoiseModel>, DenoiseError> {
///     Ok(Box::new(Passthrough))
/// });
/// let context = processor.context();
///
/// std::thread::spawn(move || {
///     context.set_parameter(ProcessorParameter::AttenuationLimit, 24.0).unwrap();
/// })
/// .join()
/// .unwrap();
/// ```
#[derive(Clone)]
pub struct ProcessorContext {
    shared: Arc<Shared>,
}

impl ProcessorContext {
    /// Modifies a processor parameter.
    ///
    /// Can be called from any thread. The processing thread applies the new
    /// value at the start of its next block.
    ///
    /// # Returns
    ///
    /// Returns `Ok(())` on success or [`DenoiseError::ParameterOutOfRange`]
    /// if `value` is outside the parameter's range.
    pub fn set_parameter(&self, parameter: ProcessorParameter, value: f32) -> Result<(), DenoiseError> {
        match parameter {
            ProcessorParameter::AttenuationLimit => {
                if !ATTENUATION_LIMIT_RANGE.contains(&value) {
                    return Err(DenoiseError::ParameterOutOfRange);
                }
                self.shared.attenuation_limit.store(value, Ordering::Relaxed);
            }
            ProcessorParameter::Bypass => {
                if !(0.0..=1.0).contains(&value) {
                    return Err(DenoiseError::ParameterOutOfRange);
                }
                self.shared.bypass.store(value >= 0.5, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Retrieves the most recently set value of a parameter.
    pub fn parameter(&self, parameter: ProcessorParameter) -> f32 {
        match parameter {
            ProcessorParameter::AttenuationLimit => {
                self.shared.attenuation_limit.load(Ordering::Relaxed)
            }
            ProcessorParameter::Bypass => {
                if self.shared.bypass.load(Ordering::Relaxed) {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Smoothed linear RMS of the first input channel.
    pub fn input_level(&self) -> f32 {
        self.shared.input_level.get()
    }

    /// Smoothed linear RMS of the first output channel.
    pub fn output_level(&self) -> f32 {
        self.shared.output_level.get()
    }

    /// Returns the total output delay in host samples for the prepared stream.
    ///
    /// The value is fixed by [`Processor::prepare`] and does not change
    /// while blocks are processed. Before preparation it is 0.
    pub fn output_delay(&self) -> usize {
        self.shared.latency.load(Ordering::Relaxed)
    }

    /// Returns `false` while no model is available, in which case every
    /// processed block is silenced.
    pub fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::Relaxed)
    }

    /// Asks the processing thread to clear all buffered audio and converter
    /// state before its next block. The reported latency is unchanged.
    pub fn request_reset(&self) {
        self.shared.reset_requested.store(true, Ordering::Relaxed);
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            fifo_overwrites: self.shared.fifo_overwrites.load(Ordering::Relaxed),
            zero_padded_samples: self.shared.zero_padded_samples.load(Ordering::Relaxed),
            converter_underruns: self.shared.converter_underruns.load(Ordering::Relaxed),
            blocks_processed: self.shared.blocks_processed.load(Ordering::Relaxed),
        }
    }
}

/// Buffers and converter state for one prepared stream.
struct Session {
    sample_rate: u32,
    converter: RateConverter,
    adapter: FrameAdapter,
    /// Channel 0 of an interleaved block.
    scratch: Vec<f32>,
    blocks_processed: u64,
}

impl Session {
    fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            fifo_overwrites: self.adapter.overwritten(),
            zero_padded_samples: self.adapter.zero_padded(),
            converter_underruns: self.converter.underruns(),
            blocks_processed: self.blocks_processed,
        }
    }
}

/// Real-time denoising pipeline for one audio stream.
///
/// Accepts blocks of any size at any supported host sample rate, converts
/// them to 48 kHz, runs the model frame by frame and converts the result
/// back, with a fixed latency reported by [`Processor::prepare`].
///
/// Processing is mono: the first channel is denoised and copied into all
/// other channels.
///
/// # Example
///
/// ```rust
/// use alt_denoiser::{DenoiseError, DenoiseModel, ModelConfig, Processor};
///
/// struct Passthrough;
///
/// impl DenoiseModel for Passthrough {
///     fn frame_len(&self) -> usize {
///         480
///     }
///
///     fn process_frame(&mut self, input: &[f32], output: &mut [f32]) {
///         output.copy_from_slice(input);
///     }
///
///     fn set_attenuation_limit(&mut self, _limit_db: f32) {}
/// }
///
/// let mut processor =
///     Processor::new(|_: &ModelConfig| -> Result<Box<dyn DenoiseModel>, DenoiseError> {
///         Ok(Box::new(Passthrough))
///     });
///
/// let latency = processor.prepare(44_100, 512).unwrap();
/// println!("Latency: {latency} samples");
///
/// let mut left = vec![0.0f32; 512];
/// let mut right = vec![0.0f32; 512];
/// processor.process_planar(&mut [left.as_mut_slice(), right.as_mut_slice()]);
/// ```
pub struct Processor {
    factory: Box<dyn ModelFactory>,
    config: ProcessorConfig,
    model: Option<Box<dyn DenoiseModel>>,
    model_error: Option<DenoiseError>,
    session: Option<Session>,
    state: ProcessorState,
    /// Attenuation limit the model currently runs with.
    applied_attenuation: f32,
    latency: usize,
    context: ProcessorContext,
}

impl Processor {
    /// Creates an unprepared processor. The model is created by `factory`
    /// during [`Processor::prepare`].
    pub fn new(factory: impl ModelFactory + 'static) -> Self {
        let config = ProcessorConfig::default();
        Self {
            factory: Box::new(factory),
            context: ProcessorContext {
                shared: Arc::new(Shared::new(config.attenuation_limit_db)),
            },
            applied_attenuation: config.attenuation_limit_db,
            config,
            model: None,
            model_error: None,
            session: None,
            state: ProcessorState::Uninitialized,
            latency: 0,
        }
    }

    /// Replaces the pipeline configuration. Takes effect at the next
    /// [`Processor::prepare`]; the initial attenuation limit is published to
    /// the context immediately.
    pub fn with_config(mut self, config: ProcessorConfig) -> Self {
        self.context
            .shared
            .attenuation_limit
            .store(config.attenuation_limit_db, Ordering::Relaxed);
        self.config = config;
        self
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Creates a [`ProcessorContext`] for thread-safe parameter access and metering.
    pub fn context(&self) -> ProcessorContext {
        self.context.clone()
    }

    pub fn state(&self) -> ProcessorState {
        self.state
    }

    /// Returns `true` if a model is loaded and blocks will be denoised.
    pub fn is_ready(&self) -> bool {
        self.model.is_some() && self.session.is_some()
    }

    /// Why the model could not be created in the current session, if it could not.
    pub fn model_error(&self) -> Option<&DenoiseError> {
        self.model_error.as_ref()
    }

    /// Latency in host samples reported by the last successful [`Processor::prepare`].
    pub fn latency(&self) -> usize {
        self.latency
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.session.as_ref().map(|session| session.sample_rate)
    }

    /// Prepares the pipeline for a stream and returns its latency in host samples.
    ///
    /// Sizes every buffer for blocks of up to `max_num_frames` samples at
    /// `sample_rate` and creates the model if there is none yet. Calling it
    /// again, for example after a sample-rate change, rebuilds all buffers;
    /// a model that was created before is kept.
    ///
    /// A model that cannot be created does not make this fail: the processor
    /// silences its output and reports [`Processor::is_ready`] as `false`.
    ///
    /// On error the previous session is dropped as well, so the processor
    /// silences every block until a later call succeeds.
    ///
    /// # Warning
    /// Do not call from audio processing threads as this allocates memory.
    pub fn prepare(&mut self, sample_rate: u32, max_num_frames: usize) -> Result<usize, DenoiseError> {
        let (session, latency, frame_len) = match self.build_session(sample_rate, max_num_frames) {
            Ok(built) => built,
            Err(err) => {
                log::warn!("preparing {sample_rate} Hz with {max_num_frames}-sample blocks failed: {err}");
                self.session = None;
                self.latency = 0;
                self.state = ProcessorState::Uninitialized;

                let shared = &self.context.shared;
                shared.ready.store(false, Ordering::Relaxed);
                shared.latency.store(0, Ordering::Relaxed);
                return Err(err);
            }
        };

        self.session = Some(session);
        self.latency = latency;
        self.state = ProcessorState::Prepared;

        let shared = &self.context.shared;
        shared.latency.store(latency, Ordering::Relaxed);
        shared.ready.store(self.model.is_some(), Ordering::Relaxed);
        shared.reset_requested.store(false, Ordering::Relaxed);
        shared.input_level.set(0.0);
        shared.output_level.set(0.0);
        shared.publish(&Diagnostics::default());

        log::info!(
            "prepared denoiser: {sample_rate} Hz, up to {max_num_frames} samples per block, frame {frame_len}, latency {latency} samples"
        );

        Ok(latency)
    }

    /// Runs every fallible step of [`Processor::prepare`] without touching
    /// the current session. Returns the new session, its latency and the
    /// model frame length.
    fn build_session(
        &mut self,
        sample_rate: u32,
        max_num_frames: usize,
    ) -> Result<(Session, usize, usize), DenoiseError> {
        self.config.validate()?;
        let converter = RateConverter::new(sample_rate, max_num_frames, self.config.quality)?;

        self.ensure_model();

        let (frame_len, model_delay) = match &self.model {
            Some(model) => (model.frame_len(), model.delay()),
            None => (FALLBACK_FRAME_LEN, 0),
        };

        let adapter = FrameAdapter::new(frame_len, self.config.fifo_capacity)?;
        let required = converter.max_internal_block() + 2 * frame_len;
        if self.config.fifo_capacity < required {
            return Err(DenoiseError::InvalidConfiguration(format!(
                "FIFO capacity {} is below the {required} samples needed for {max_num_frames}-sample blocks at {sample_rate} Hz",
                self.config.fifo_capacity
            )));
        }

        // The resampler stages are content-aligned, so the round trip adds
        // only its primed silence, expressed at the host rate.
        let internal_delay = converter.latency_internal() + adapter.latency() + model_delay;
        let latency = if converter.is_identity() {
            internal_delay
        } else {
            let scaled = internal_delay as f64 * sample_rate as f64 / INTERNAL_SAMPLE_RATE as f64;
            scaled.round() as usize
        };

        let session = Session {
            sample_rate,
            converter,
            adapter,
            scratch: vec![0.0; max_num_frames],
            blocks_processed: 0,
        };
        Ok((session, latency, frame_len))
    }

    fn ensure_model(&mut self) {
        if self.model.is_some() {
            log::debug!("keeping existing denoising model");
            return;
        }

        let attenuation = self.context.shared.attenuation_limit.load(Ordering::Relaxed);
        let config = ModelConfig {
            attenuation_limit_db: attenuation,
            log_level: self.config.model_log_level.clone(),
        };

        match self.factory.create(&config) {
            Ok(model) => {
                self.model = Some(model);
                self.model_error = None;
                self.applied_attenuation = attenuation;
            }
            Err(err) => {
                log::error!("denoising model unavailable, output will be silenced: {err}");
                self.model_error = Some(err);
            }
        }
    }

    /// Denoises a block of planar audio in place.
    ///
    /// The first channel is denoised and copied into every other channel.
    /// If no model is available, or the processor is not prepared, all
    /// channels are silenced instead.
    ///
    /// The block may have any length; blocks longer than the size given to
    /// [`Processor::prepare`] are processed in pieces.
    ///
    /// Real-time safe: does not allocate, lock or block.
    pub fn process_planar<V: AsMut<[f32]>>(&mut self, audio: &mut [V]) {
        let Self {
            model,
            session,
            state,
            applied_attenuation,
            config,
            context,
            ..
        } = self;

        let (Some(model), Some(session)) = (model.as_deref_mut(), session.as_mut()) else {
            for channel in audio.iter_mut() {
                channel.as_mut().fill(0.0);
            }
            return;
        };

        let Some((first, rest)) = audio.split_first_mut() else {
            return;
        };
        let first = first.as_mut();

        *state = ProcessorState::Processing;
        let shared = &context.shared;

        if shared.reset_requested.swap(false, Ordering::Relaxed) {
            session.converter.reset();
            session.adapter.reset();
        }

        shared.input_level.update(first, config.level_smoothing);

        let target = shared.attenuation_limit.load(Ordering::Relaxed);
        if (target - *applied_attenuation).abs() > config.attenuation_epsilon_db {
            model.set_attenuation_limit(target);
            *applied_attenuation = target;
        }

        let bypass = shared.bypass.load(Ordering::Relaxed);
        let Session {
            converter, adapter, ..
        } = &mut *session;
        converter.process(first, |input, output| {
            adapter.process(&mut *model, bypass, input, output);
        });

        for channel in rest.iter_mut() {
            let channel = channel.as_mut();
            let n = channel.len().min(first.len());
            channel[..n].copy_from_slice(&first[..n]);
            channel[n..].fill(0.0);
        }

        shared.output_level.update(first, config.level_smoothing);

        session.blocks_processed += 1;
        shared.publish(&session.diagnostics());
    }

    /// Denoises a block of interleaved audio in place.
    ///
    /// Behaves like [`Processor::process_planar`]: the first channel is
    /// denoised and written to every channel. A buffer whose length is not
    /// a multiple of `num_channels` is silenced.
    pub fn process_interleaved(&mut self, audio: &mut [f32], num_channels: usize) {
        if num_channels == 0 || !audio.len().is_multiple_of(num_channels) {
            audio.fill(0.0);
            return;
        }

        let Some(session) = self.session.as_mut() else {
            audio.fill(0.0);
            return;
        };

        let mut scratch = std::mem::take(&mut session.scratch);
        let frames_per_chunk = scratch.len().max(1);

        for chunk in audio.chunks_mut(frames_per_chunk * num_channels) {
            let frames = chunk.len() / num_channels;
            let mono = &mut scratch[..frames];

            for (sample, frame) in mono.iter_mut().zip(chunk.chunks_exact(num_channels)) {
                *sample = frame[0];
            }

            self.process_planar(&mut [&mut *mono]);

            for (sample, frame) in mono.iter().zip(chunk.chunks_exact_mut(num_channels)) {
                frame.fill(*sample);
            }
        }

        if let Some(session) = self.session.as_mut() {
            session.scratch = scratch;
        }
    }

    /// Sets the attenuation limit in dB. Shorthand for
    /// [`ProcessorContext::set_parameter`] with [`ProcessorParameter::AttenuationLimit`].
    pub fn set_attenuation_limit(&self, limit_db: f32) -> Result<(), DenoiseError> {
        self.context
            .set_parameter(ProcessorParameter::AttenuationLimit, limit_db)
    }

    pub fn current_input_level(&self) -> f32 {
        self.context.input_level()
    }

    pub fn current_output_level(&self) -> f32 {
        self.context.output_level()
    }

    /// Clears buffered audio and converter state, keeping the configuration.
    ///
    /// Real-time safe. From another thread use
    /// [`ProcessorContext::request_reset`] instead.
    pub fn reset(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.converter.reset();
            session.adapter.reset();
        }
        self.context.shared.input_level.set(0.0);
        self.context.shared.output_level.set(0.0);
    }

    /// Destroys the model and frees all stream buffers.
    pub fn release(&mut self) {
        self.session = None;
        self.model = None;
        self.model_error = None;
        self.latency = 0;
        self.state = ProcessorState::Released;

        let shared = &self.context.shared;
        shared.ready.store(false, Ordering::Relaxed);
        shared.latency.store(0, Ordering::Relaxed);

        log::debug!("released denoiser resources");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Passthrough;

    impl DenoiseModel for Passthrough {
        fn frame_len(&self) -> usize {
            480
        }

        fn process_frame(&mut self, input: &[f32], output: &mut [f32]) {
            output.copy_from_slice(input);
        }

        fn set_attenuation_limit(&mut self, _limit_db: f32) {}
    }

    fn passthrough_processor() -> Processor {
        Processor::new(|_: &ModelConfig| -> Result<Box<dyn DenoiseModel>, DenoiseError> {
            Ok(Box::new(Passthrough))
        })
    }

    #[test]
    fn processor_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Processor>();
        assert_send::<ProcessorContext>();
    }

    #[test]
    fn invalid_configurations_fail_fast() {
        let mut processor = passthrough_processor().with_config(ProcessorConfig {
            fifo_capacity: 0,
            ..Default::default()
        });
        assert_eq!(processor.prepare(48_000, 512), Err(DenoiseError::InvalidCapacity));
        assert_eq!(processor.state(), ProcessorState::Uninitialized);

        let mut processor = passthrough_processor().with_config(ProcessorConfig {
            level_smoothing: 0.0,
            ..Default::default()
        });
        assert!(matches!(
            processor.prepare(48_000, 512),
            Err(DenoiseError::InvalidConfiguration(_))
        ));

        let mut processor = passthrough_processor();
        assert!(matches!(
            processor.prepare(48_000, 0),
            Err(DenoiseError::InvalidConfiguration(_))
        ));
        assert!(!processor.is_ready());
    }

    #[test]
    fn fifo_too_small_for_block_size_is_rejected() {
        let mut processor = passthrough_processor().with_config(ProcessorConfig {
            fifo_capacity: 2_000,
            ..Default::default()
        });
        assert!(matches!(
            processor.prepare(44_100, 4_096),
            Err(DenoiseError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn failed_reprepare_drops_previous_session() {
        let mut processor = passthrough_processor();
        assert_eq!(processor.prepare(48_000, 256), Ok(480));
        assert!(processor.is_ready());

        // The default FIFO cannot hold 60000-sample blocks.
        assert!(matches!(
            processor.prepare(48_000, 60_000),
            Err(DenoiseError::InvalidConfiguration(_))
        ));
        assert_eq!(processor.state(), ProcessorState::Uninitialized);
        assert!(!processor.is_ready());
        assert!(!processor.context().is_ready());
        assert_eq!(processor.latency(), 0);
        assert_eq!(processor.context().output_delay(), 0);
        assert_eq!(processor.sample_rate(), None);

        let mut block = vec![0.7f32; 256];
        processor.process_planar(&mut [block.as_mut_slice()]);
        assert!(block.iter().all(|&s| s == 0.0));
        assert_eq!(processor.state(), ProcessorState::Uninitialized);

        assert_eq!(processor.prepare(48_000, 256), Ok(480));
        assert!(processor.is_ready());
    }

    #[test]
    fn identity_rate_latency_is_one_frame() {
        let mut processor = passthrough_processor();
        assert_eq!(processor.prepare(48_000, 256), Ok(480));
        assert_eq!(processor.context().output_delay(), 480);
    }

    #[test]
    fn parameters_are_range_checked() {
        let processor = passthrough_processor();
        let context = processor.context();

        assert_eq!(
            context.set_parameter(ProcessorParameter::AttenuationLimit, 100.5),
            Err(DenoiseError::ParameterOutOfRange)
        );
        assert_eq!(
            context.set_parameter(ProcessorParameter::AttenuationLimit, f32::NAN),
            Err(DenoiseError::ParameterOutOfRange)
        );
        assert_eq!(
            context.set_parameter(ProcessorParameter::Bypass, -1.0),
            Err(DenoiseError::ParameterOutOfRange)
        );

        processor.set_attenuation_limit(12.5).unwrap();
        context.set_parameter(ProcessorParameter::Bypass, 1.0).unwrap();
        assert_eq!(context.parameter(ProcessorParameter::AttenuationLimit), 12.5);
        assert_eq!(context.parameter(ProcessorParameter::Bypass), 1.0);
    }

    #[test]
    fn unprepared_processor_silences_output() {
        let mut processor = passthrough_processor();
        let mut audio = vec![vec![0.7f32; 64]; 2];
        processor.process_planar(&mut audio);
        assert!(audio.iter().flatten().all(|&s| s == 0.0));

        let mut interleaved = vec![0.7f32; 128];
        processor.process_interleaved(&mut interleaved, 2);
        assert!(interleaved.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn state_transitions() {
        let mut processor = passthrough_processor();
        assert_eq!(processor.state(), ProcessorState::Uninitialized);

        processor.prepare(44_100, 128).unwrap();
        assert_eq!(processor.state(), ProcessorState::Prepared);

        let mut block = vec![0.0f32; 128];
        processor.process_planar(&mut [block.as_mut_slice()]);
        assert_eq!(processor.state(), ProcessorState::Processing);

        processor.release();
        assert_eq!(processor.state(), ProcessorState::Released);
        assert!(!processor.is_ready());
        assert_eq!(processor.context().output_delay(), 0);

        processor.prepare(96_000, 256).unwrap();
        assert_eq!(processor.state(), ProcessorState::Prepared);
        assert_eq!(processor.sample_rate(), Some(96_000));
        assert!(processor.is_ready());
    }

    #[test]
    fn mismatched_interleaved_length_is_silenced() {
        let mut processor = passthrough_processor();
        processor.prepare(48_000, 64).unwrap();

        let mut audio = vec![0.5f32; 7];
        processor.process_interleaved(&mut audio, 2);
        assert!(audio.iter().all(|&s| s == 0.0));
    }
}
