//! Bridges variable-size internal-rate blocks to fixed-size model frames.

use crate::{error::DenoiseError, fifo::FrameFifo, model::DenoiseModel};

/// Accumulates converted samples into model frames and hands the processed
/// frames back in whatever block size the caller asks for.
///
/// The output FIFO starts out holding one frame of silence. That frame is
/// the adapter's whole latency contribution: after a push of M samples at
/// least M processed samples are always available, so the read side never
/// has to pad and the delay does not depend on block sizes.
pub struct FrameAdapter {
    input: FrameFifo,
    output: FrameFifo,
    frame_in: Vec<f32>,
    frame_out: Vec<f32>,
    frame_len: usize,
    max_frames_per_call: usize,
    zero_padded: u64,
}

impl FrameAdapter {
    /// Allocates both FIFOs with `fifo_capacity` samples and primes the output.
    pub fn new(frame_len: usize, fifo_capacity: usize) -> Result<Self, DenoiseError> {
        if frame_len == 0 {
            return Err(DenoiseError::InvalidConfiguration(
                "model frame length must be greater than zero".to_string(),
            ));
        }
        if fifo_capacity < 2 * frame_len {
            return Err(DenoiseError::InvalidConfiguration(format!(
                "FIFO capacity {fifo_capacity} cannot hold two frames of {frame_len} samples"
            )));
        }

        let mut adapter = Self {
            input: FrameFifo::new(fifo_capacity)?,
            output: FrameFifo::new(fifo_capacity)?,
            frame_in: vec![0.0; frame_len],
            frame_out: vec![0.0; frame_len],
            frame_len,
            max_frames_per_call: fifo_capacity / frame_len,
            zero_padded: 0,
        };
        adapter.prime();
        Ok(adapter)
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Samples of delay the adapter adds.
    pub fn latency(&self) -> usize {
        self.frame_len
    }

    /// Samples lost to FIFO overwrite on either side.
    pub fn overwritten(&self) -> u64 {
        self.input.overwritten() + self.output.overwritten()
    }

    /// Output samples that had to be filled with silence.
    pub fn zero_padded(&self) -> u64 {
        self.zero_padded
    }

    /// Drops buffered audio and re-primes the output with one silent frame.
    pub fn reset(&mut self) {
        self.input.clear();
        self.prime();
    }

    fn prime(&mut self) {
        self.output.clear();
        self.output.push_silence(self.frame_len);
    }

    /// Pushes `input`, runs every complete frame through `model` (or copies
    /// it when `bypass` is set) and fills `output` with the oldest processed
    /// samples. Returns the number of frames run.
    ///
    /// `input` and `output` must have the same length.
    pub fn process(
        &mut self,
        model: &mut dyn DenoiseModel,
        bypass: bool,
        input: &[f32],
        output: &mut [f32],
    ) -> usize {
        self.input.push(input);

        let mut frames = 0;
        while self.input.available() >= self.frame_len && frames < self.max_frames_per_call {
            if self.input.pop(&mut self.frame_in).is_err() {
                break;
            }

            if bypass {
                self.frame_out.copy_from_slice(&self.frame_in);
            } else {
                model.process_frame(&self.frame_in, &mut self.frame_out);
            }

            self.output.push(&self.frame_out);
            frames += 1;
        }

        let ready = self.output.available().min(output.len());
        if self.output.pop(&mut output[..ready]).is_err() {
            output.fill(0.0);
            self.zero_padded += output.len() as u64;
            return frames;
        }

        if ready < output.len() {
            output[ready..].fill(0.0);
            self.zero_padded += (output.len() - ready) as u64;
        }

        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_LEN: usize = 480;

    /// Scales by a constant and counts frames.
    struct Scale {
        gain: f32,
        frames: usize,
    }

    impl DenoiseModel for Scale {
        fn frame_len(&self) -> usize {
            FRAME_LEN
        }

        fn process_frame(&mut self, input: &[f32], output: &mut [f32]) {
            assert_eq!(input.len(), FRAME_LEN);
            assert_eq!(output.len(), FRAME_LEN);
            for (o, i) in output.iter_mut().zip(input) {
                *o = i * self.gain;
            }
            self.frames += 1;
        }

        fn set_attenuation_limit(&mut self, _limit_db: f32) {}
    }

    fn ramp(start: usize, len: usize) -> Vec<f32> {
        (start..start + len).map(|i| (i + 1) as f32).collect()
    }

    #[test]
    fn rejects_bad_geometry() {
        assert!(FrameAdapter::new(0, 48_000).is_err());
        assert!(FrameAdapter::new(FRAME_LEN, FRAME_LEN).is_err());
    }

    #[test]
    fn cold_start_is_silent_until_first_frame() {
        let mut adapter = FrameAdapter::new(FRAME_LEN, 48_000).unwrap();
        let mut model = Scale {
            gain: 1.0,
            frames: 0,
        };

        let input = vec![1.0f32; 256];
        let mut output = vec![9.0f32; 256];
        let frames = adapter.process(&mut model, false, &input, &mut output);

        assert_eq!(frames, 0);
        assert!(output.iter().all(|&s| s == 0.0));
        assert_eq!(adapter.zero_padded(), 0);
    }

    #[test]
    fn output_is_input_delayed_by_one_frame() {
        let mut adapter = FrameAdapter::new(FRAME_LEN, 48_000).unwrap();
        let mut model = Scale {
            gain: 2.0,
            frames: 0,
        };

        let sizes = [7, 480, 1, 999, 333, 64, 1200, 13];
        let mut written = 0;
        let mut produced = Vec::new();
        for round in 0..24 {
            let n = sizes[round % sizes.len()];
            let input = ramp(written, n);
            written += n;

            let mut output = vec![0.0f32; n];
            adapter.process(&mut model, false, &input, &mut output);
            produced.extend_from_slice(&output);
        }

        assert!(produced[..FRAME_LEN].iter().all(|&s| s == 0.0));
        let expected: Vec<f32> = ramp(0, written - FRAME_LEN).iter().map(|s| s * 2.0).collect();
        assert_eq!(&produced[FRAME_LEN..], expected.as_slice());
        assert_eq!(model.frames, written / FRAME_LEN);
        assert_eq!(adapter.zero_padded(), 0);
        assert_eq!(adapter.overwritten(), 0);
    }

    #[test]
    fn bypass_skips_the_model() {
        let mut adapter = FrameAdapter::new(FRAME_LEN, 48_000).unwrap();
        let mut model = Scale {
            gain: 0.0,
            frames: 0,
        };

        let input = ramp(0, 2 * FRAME_LEN);
        let mut output = vec![0.0f32; 2 * FRAME_LEN];
        let frames = adapter.process(&mut model, true, &input, &mut output);

        assert_eq!(frames, 2);
        assert_eq!(model.frames, 0);
        assert_eq!(&output[FRAME_LEN..], &input[..FRAME_LEN]);
    }

    #[test]
    fn undersized_fifos_lose_audio_visibly() {
        let mut adapter = FrameAdapter::new(FRAME_LEN, 2 * FRAME_LEN).unwrap();
        let mut model = Scale {
            gain: 1.0,
            frames: 0,
        };

        let mut output = vec![0.0f32; 1500];
        let frames = adapter.process(&mut model, false, &ramp(0, 1500), &mut output);

        // 540 samples dropped on input, the primed frame dropped on output.
        assert_eq!(frames, 2);
        assert_eq!(adapter.overwritten(), 1020);
        assert_eq!(adapter.zero_padded(), 540);
        assert_eq!(&output[..2 * FRAME_LEN], ramp(540, 2 * FRAME_LEN).as_slice());
    }

    #[test]
    fn reset_discards_pending_audio() {
        let mut adapter = FrameAdapter::new(FRAME_LEN, 48_000).unwrap();
        let mut model = Scale {
            gain: 1.0,
            frames: 0,
        };

        let mut output = vec![0.0f32; 700];
        adapter.process(&mut model, false, &vec![1.0; 700], &mut output);
        adapter.reset();

        let mut output = vec![9.0f32; FRAME_LEN];
        adapter.process(&mut model, false, &vec![1.0; FRAME_LEN], &mut output);
        assert!(output.iter().all(|&s| s == 0.0));
    }
}
