//! Host-rate <-> internal-rate conversion around a processing callback.

use crate::{error::DenoiseError, fifo::FrameFifo};

use rubato::{
    Resampler, SincFixedIn, SincFixedOut, SincInterpolationParameters, SincInterpolationType,
    WindowFunction,
};

/// Fixed processing rate expected by the denoising model.
pub const INTERNAL_SAMPLE_RATE: u32 = 48_000;

/// Lowest supported host sample rate in Hz.
pub const MIN_SAMPLE_RATE: u32 = 8_000;
/// Highest supported host sample rate in Hz.
pub const MAX_SAMPLE_RATE: u32 = 192_000;

/// Host samples the down-converter consumes per call. Its history only
/// stays aligned while the chunk size is constant, so host blocks are
/// queued and fed to it in pieces of this size.
const DOWN_CHUNK: usize = 64;

/// Extra silence in the up-conversion staging FIFO on top of the computed
/// worst-case lag of the down path. Absorbs rounding of the two
/// independent phase accumulators.
const STAGING_SLACK: usize = 8;

/// Interpolation quality of the asynchronous resamplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResamplerQuality {
    /// Short sinc, linear interpolation between sinc points.
    Fast,
    /// Medium sinc, linear interpolation between sinc points.
    Balanced,
    /// Long sinc, cubic interpolation between sinc points.
    #[default]
    High,
}

impl ResamplerQuality {
    /// Interpolation parameters for one resampler. Built per call since
    /// rubato takes them by value.
    fn parameters(self) -> SincInterpolationParameters {
        let (sinc_len, interpolation, oversampling_factor) = match self {
            ResamplerQuality::Fast => (64, SincInterpolationType::Linear, 128),
            ResamplerQuality::Balanced => (128, SincInterpolationType::Linear, 256),
            ResamplerQuality::High => (256, SincInterpolationType::Cubic, 256),
        };

        SincInterpolationParameters {
            sinc_len,
            f_cutoff: 0.95,
            interpolation,
            oversampling_factor,
            window: WindowFunction::BlackmanHarris2,
        }
    }
}

struct Resampling {
    /// Host samples waiting for a full down-converter chunk.
    pending: FrameFifo,
    /// One chunk popped from `pending`.
    down_input: Vec<f32>,
    /// Host rate -> internal rate, fixed chunk of [`DOWN_CHUNK`] host samples.
    down: SincFixedIn<f32>,
    /// Internal rate -> host rate, produces exactly one host block per call.
    up: SincFixedOut<f32>,
    /// Processed internal-rate samples waiting for the up-converter.
    staging: FrameFifo,
    staging_prime: usize,
    /// Scratch holding what `up` consumes in one call.
    up_input: Vec<f32>,
}

enum Mode {
    Identity,
    Resampling(Box<Resampling>),
}

/// Bidirectional sample-rate converter between the host rate and
/// [`INTERNAL_SAMPLE_RATE`].
///
/// Each call to [`RateConverter::process`] converts a host block down to a
/// variable number M of internal samples, hands them to a callback together
/// with an M-sample output region, then converts the filled region back into
/// the host block. The host block always comes back with its original length.
///
/// The down path emits whole chunks only, so M may be zero for tiny blocks.
/// The staging FIFO in front of the up-converter is primed with enough
/// silence to cover that lag plus the up-converter's look-ahead. The whole
/// round trip therefore delays audio by exactly
/// [`RateConverter::latency_internal`] internal samples, on top of whatever
/// the callback adds.
///
/// All buffers are sized in [`RateConverter::new`] for blocks of up to
/// `max_block` samples; `process` does not allocate.
pub struct RateConverter {
    host_rate: u32,
    max_block: usize,
    mode: Mode,
    internal_in: Vec<f32>,
    internal_out: Vec<f32>,
    underruns: u64,
}

impl RateConverter {
    /// Creates a converter for `host_rate` and host blocks of up to `max_block` samples.
    ///
    /// # Warning
    /// Allocates. Call during stream preparation, never from the audio thread.
    pub fn new(
        host_rate: u32,
        max_block: usize,
        quality: ResamplerQuality,
    ) -> Result<Self, DenoiseError> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&host_rate) {
            return Err(DenoiseError::InvalidConfiguration(format!(
                "sample rate {host_rate} Hz is outside {MIN_SAMPLE_RATE}..={MAX_SAMPLE_RATE} Hz"
            )));
        }
        if max_block == 0 {
            return Err(DenoiseError::InvalidConfiguration(
                "block size must be greater than zero".to_string(),
            ));
        }

        if host_rate == INTERNAL_SAMPLE_RATE {
            return Ok(Self {
                host_rate,
                max_block,
                mode: Mode::Identity,
                internal_in: vec![0.0; max_block],
                internal_out: vec![0.0; max_block],
                underruns: 0,
            });
        }

        let ratio = INTERNAL_SAMPLE_RATE as f64 / host_rate as f64;
        let down = SincFixedIn::<f32>::new(ratio, 1.0, quality.parameters(), DOWN_CHUNK, 1)?;
        let mut up =
            SincFixedOut::<f32>::new(1.0 / ratio, 1.0, quality.parameters(), max_block, 1)?;

        // A block can complete at most this many down-converter chunks, and
        // each call needs `output_frames_next` free samples to write into.
        let max_chunks = max_block.div_ceil(DOWN_CHUNK) + 1;
        let max_internal = max_chunks * down.output_frames_max();
        let up_input_max = up.input_frames_max();

        // With a one-sample chunk the up-converter asks for exactly its
        // interpolation look-ahead.
        up.set_chunk_size(1)?;
        let lookahead = up.input_frames_next();
        up.set_chunk_size(max_block)?;

        // Internal samples still held back by the chunked down path: up to
        // one partial chunk plus the end guard of the interpolator.
        let chunk_lag = ((DOWN_CHUNK as f64 + (1.0 / ratio).ceil()) * ratio).ceil() as usize;

        let staging_prime = lookahead + down.output_delay() + chunk_lag + STAGING_SLACK;
        let mut staging = FrameFifo::new(staging_prime + 2 * max_internal + up_input_max)?;
        staging.push_silence(staging_prime);

        Ok(Self {
            host_rate,
            max_block,
            mode: Mode::Resampling(Box::new(Resampling {
                pending: FrameFifo::new(DOWN_CHUNK + max_block)?,
                down_input: vec![0.0; DOWN_CHUNK],
                down,
                up,
                staging,
                staging_prime,
                up_input: vec![0.0; up_input_max],
            })),
            internal_in: vec![0.0; max_internal],
            internal_out: vec![0.0; max_internal],
            underruns: 0,
        })
    }

    pub fn host_rate(&self) -> u32 {
        self.host_rate
    }

    pub fn max_block(&self) -> usize {
        self.max_block
    }

    /// Largest M the callback can receive.
    pub fn max_internal_block(&self) -> usize {
        self.internal_in.len()
    }

    pub fn is_identity(&self) -> bool {
        matches!(self.mode, Mode::Identity)
    }

    /// Delay of the round trip in internal-rate samples, excluding whatever
    /// the callback itself adds.
    pub fn latency_internal(&self) -> usize {
        match &self.mode {
            Mode::Identity => 0,
            Mode::Resampling(r) => r.staging_prime,
        }
    }

    /// Number of times the up-converter found too few staged samples and
    /// zero-filled the shortfall.
    pub fn underruns(&self) -> u64 {
        self.underruns
    }

    /// Clears converter state as if the stream had just been prepared.
    pub fn reset(&mut self) {
        if let Mode::Resampling(r) = &mut self.mode {
            r.pending.clear();
            r.down.reset();
            r.up.reset();
            r.staging.clear();
            r.staging.push_silence(r.staging_prime);
        }
    }

    /// Converts `block` to the internal rate, runs `f(input, output)` on the
    /// converted samples and converts `output` back into `block`.
    ///
    /// `f` is called exactly once for blocks of up to `max_block` samples;
    /// longer blocks are split and `f` runs once per sub-block. On an
    /// internal resampler failure the affected block is silenced.
    pub fn process<F>(&mut self, block: &mut [f32], mut f: F)
    where
        F: FnMut(&[f32], &mut [f32]),
    {
        for chunk in block.chunks_mut(self.max_block) {
            if let Err(err) = self.process_chunk(chunk, &mut f) {
                log::debug!("rate conversion failed, silencing block: {err}");
                chunk.fill(0.0);
            }
        }
    }

    fn process_chunk<F>(&mut self, block: &mut [f32], f: &mut F) -> Result<(), DenoiseError>
    where
        F: FnMut(&[f32], &mut [f32]),
    {
        let n = block.len();

        let r = match &mut self.mode {
            Mode::Identity => {
                self.internal_in[..n].copy_from_slice(block);
                f(&self.internal_in[..n], block);
                return Ok(());
            }
            Mode::Resampling(r) => r,
        };

        r.pending.push(block);
        let mut m = 0;
        while r.pending.available() >= DOWN_CHUNK {
            r.pending.pop(&mut r.down_input)?;
            let next = r.down.output_frames_next();
            let (_, produced) = r.down.process_into_buffer(
                &[&r.down_input[..]],
                &mut [&mut self.internal_in[m..m + next]],
                None,
            )?;
            m += produced;
        }

        let output = &mut self.internal_out[..m];
        f(&self.internal_in[..m], output);
        r.staging.push(output);

        r.up.set_chunk_size(n)?;
        let needed = r.up.input_frames_next();
        let staged = r.staging.available().min(needed);
        r.staging.pop(&mut r.up_input[..staged])?;
        if staged < needed {
            r.up_input[staged..needed].fill(0.0);
            self.underruns += 1;
        }

        r.up.process_into_buffer(&[&r.up_input[..needed]], &mut [block], None)?;

        Ok(())
    }
}
