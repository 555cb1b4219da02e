//! Reverb - Convolution Against a Synthetic Impulse
//!
//! The reverb convolves the signal with a decaying-noise impulse response.
//! A two-second impulse at 48 kHz is ~100k taps, far too many for direct
//! convolution, so the work is done in the frequency domain.
//!
//! # Uniformly Partitioned Convolution
//!
//! ```text
//! impulse:  [ h0 | h1 | h2 | ... | hP-1 ]   P partitions of B samples
//!
//! every B input samples:
//!   X_k   = FFT([x_{k-1} | x_k])             (2B points, overlap-save)
//!   Y_k   = Σ_p  X_{k-p} · H_p                (frequency-domain delay line)
//!   y_k   = last B samples of IFFT(Y_k)
//! ```
//!
//! Each H_p is the FFT of partition p zero-padded to 2B. Output for block k
//! is played during block k+1, so the reverb adds B samples of latency.
//!
//! # The Impulse
//!
//! ```text
//! length  = clamp(1.2 · size, 0.3, 6) seconds
//! h[i]    = noise · (1 - i/length)^6
//! ```
//!
//! Both channels get independent noise. The impulse is normalized the way a
//! browser convolver normalizes its buffer: scale by the inverse RMS power
//! of the whole response, a fixed -58 dB calibration and the ratio
//! 44100 / sample rate, so reverbs of different sizes sit at similar levels.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::dsp::random::DeterministicRandom;

/// Block size of the partitioned convolver (and its latency in samples).
pub const PARTITION: usize = 256;
const FFT_SIZE: usize = PARTITION * 2;

/// Convolver normalization constants.
const GAIN_CALIBRATION_DB: f32 = -58.0;
const GAIN_CALIBRATION_SAMPLE_RATE: f32 = 44_100.0;
const MIN_POWER: f32 = 0.000125;

/// Seconds of impulse for a size value.
pub fn impulse_seconds(size: f32) -> f32 {
    (1.2 * size).clamp(0.3, 6.0)
}

/// Two channels of exponentially decaying noise.
pub fn generate_impulse(size: f32, sample_rate: f32, rng: &mut DeterministicRandom) -> [Vec<f32>; 2] {
    let length = ((sample_rate * impulse_seconds(size)).floor() as usize).max(1);
    let mut channel = || -> Vec<f32> {
        (0..length)
            .map(|i| {
                let decay = (1.0 - i as f32 / length as f32).powi(6);
                rng.next_bipolar() * decay
            })
            .collect()
    };
    let left = channel();
    let right = channel();
    [left, right]
}

/// Scale applied to an impulse before partitioning.
pub fn normalization_scale(channels: &[Vec<f32>], sample_rate: f32) -> f32 {
    let length = channels.iter().map(Vec::len).max().unwrap_or(0);
    if length == 0 || channels.is_empty() {
        return 1.0;
    }
    let energy: f32 = channels.iter().flatten().map(|x| x * x).sum();
    let power = (energy / (channels.len() * length) as f32).sqrt().max(MIN_POWER);
    let calibration = 10.0_f32.powf(GAIN_CALIBRATION_DB * 0.05);
    (1.0 / power) * calibration * (GAIN_CALIBRATION_SAMPLE_RATE / sample_rate)
}

/// One channel of partitioned convolution.
struct Convolver {
    partitions: Vec<Vec<Complex<f32>>>,
    history: Vec<Vec<Complex<f32>>>,
    head: usize,
    input: Vec<f32>,
    output: Vec<f32>,
    silent_blocks: usize,
}

impl Convolver {
    fn new(impulse: &[f32], scale: f32, fft: &dyn Fft<f32>, scratch: &mut [Complex<f32>]) -> Self {
        let partitions: Vec<Vec<Complex<f32>>> = impulse
            .chunks(PARTITION)
            .map(|chunk| {
                let mut spectrum = vec![Complex::new(0.0, 0.0); FFT_SIZE];
                for (bin, &h) in spectrum.iter_mut().zip(chunk) {
                    bin.re = h * scale;
                }
                fft.process_with_scratch(&mut spectrum, scratch);
                spectrum
            })
            .collect();
        let count = partitions.len().max(1);

        Self {
            partitions,
            history: vec![vec![Complex::new(0.0, 0.0); FFT_SIZE]; count],
            head: 0,
            input: vec![0.0; FFT_SIZE],
            output: vec![0.0; PARTITION],
            silent_blocks: count + 1,
        }
    }

    fn process_block(
        &mut self,
        fft: &dyn Fft<f32>,
        ifft: &dyn Fft<f32>,
        acc: &mut [Complex<f32>],
        scratch: &mut [Complex<f32>],
    ) {
        let count = self.history.len();
        let silent = self.input[PARTITION..].iter().all(|&x| x == 0.0);
        self.silent_blocks = if silent { self.silent_blocks + 1 } else { 0 };

        let slot = &mut self.history[self.head];
        if silent && self.input[..PARTITION].iter().all(|&x| x == 0.0) {
            slot.fill(Complex::new(0.0, 0.0));
        } else {
            for (bin, &x) in slot.iter_mut().zip(&self.input) {
                *bin = Complex::new(x, 0.0);
            }
            fft.process_with_scratch(slot, scratch);
        }

        if self.silent_blocks > count {
            // every spectrum in the history is zero
            self.output.fill(0.0);
        } else {
            // real signals: only bins 0..=B are independent
            let half = PARTITION + 1;
            acc.fill(Complex::new(0.0, 0.0));
            for (p, h) in self.partitions.iter().enumerate() {
                let x = &self.history[(self.head + count - p) % count];
                for ((a, xb), hb) in acc[..half].iter_mut().zip(&x[..half]).zip(&h[..half]) {
                    *a += xb * hb;
                }
            }
            for k in 1..PARTITION {
                acc[FFT_SIZE - k] = acc[k].conj();
            }
            ifft.process_with_scratch(acc, scratch);
            let norm = 1.0 / FFT_SIZE as f32;
            for (out, y) in self.output.iter_mut().zip(&acc[PARTITION..]) {
                *out = y.re * norm;
            }
        }

        self.input.copy_within(PARTITION.., 0);
        self.head = (self.head + 1) % count;
    }

    fn reset(&mut self) {
        for spectrum in &mut self.history {
            spectrum.fill(Complex::new(0.0, 0.0));
        }
        self.input.fill(0.0);
        self.output.fill(0.0);
        self.head = 0;
        self.silent_blocks = self.history.len() + 1;
    }
}

/// Stereo convolution reverb (left input with impulse channel 0, right
/// with channel 1).
pub struct ConvolutionReverb {
    sample_rate: f32,
    size: f32,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
    acc: Vec<Complex<f32>>,
    channels: [Convolver; 2],
    pos: usize,
}

impl std::fmt::Debug for ConvolutionReverb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvolutionReverb")
            .field("sample_rate", &self.sample_rate)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl ConvolutionReverb {
    pub fn new(sample_rate: f32, size: f32, rng: &mut DeterministicRandom) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        let ifft = planner.plan_fft_inverse(FFT_SIZE);
        let scratch_len = fft
            .get_inplace_scratch_len()
            .max(ifft.get_inplace_scratch_len());
        let mut scratch = vec![Complex::new(0.0, 0.0); scratch_len];

        let impulse = generate_impulse(size, sample_rate, rng);
        let scale = normalization_scale(&impulse, sample_rate);
        let channels = [
            Convolver::new(&impulse[0], scale, fft.as_ref(), &mut scratch),
            Convolver::new(&impulse[1], scale, fft.as_ref(), &mut scratch),
        ];

        Self {
            sample_rate,
            size,
            fft,
            ifft,
            scratch,
            acc: vec![Complex::new(0.0, 0.0); FFT_SIZE],
            channels,
            pos: 0,
        }
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    /// Latency of the wet signal in samples.
    pub fn latency(&self) -> usize {
        PARTITION
    }

    /// Regenerate the impulse if `size` changed; returns whether it did.
    pub fn set_size(&mut self, size: f32, rng: &mut DeterministicRandom) -> bool {
        if (size - self.size).abs() <= f32::EPSILON {
            return false;
        }
        self.size = size;
        let impulse = generate_impulse(size, self.sample_rate, rng);
        self.load_impulse(&impulse);
        true
    }

    /// Replace the impulse response (normalized, then partitioned).
    pub fn load_impulse(&mut self, impulse: &[Vec<f32>; 2]) {
        let scale = normalization_scale(impulse, self.sample_rate);
        self.channels = [
            Convolver::new(&impulse[0], scale, self.fft.as_ref(), &mut self.scratch),
            Convolver::new(&impulse[1], scale, self.fft.as_ref(), &mut self.scratch),
        ];
        self.pos = 0;
    }

    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let pos = self.pos;
        let [l, r] = &mut self.channels;
        let out = (l.output[pos], r.output[pos]);
        l.input[PARTITION + pos] = left;
        r.input[PARTITION + pos] = right;

        self.pos += 1;
        if self.pos == PARTITION {
            self.pos = 0;
            for channel in self.channels.iter_mut() {
                channel.process_block(
                    self.fft.as_ref(),
                    self.ifft.as_ref(),
                    &mut self.acc,
                    &mut self.scratch,
                );
            }
        }
        out
    }

    pub fn reset(&mut self) {
        for channel in self.channels.iter_mut() {
            channel.reset();
        }
        self.pos = 0;
    }
}
