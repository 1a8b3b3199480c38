//! Ring-Buffered FFT Stage
//!
//! Accumulates the incoming audio in a ring buffer and periodically (about
//! 30 times a second) produces a Hann-windowed power spectrum of the
//! logically-last window. The plan, window and every working buffer are
//! allocated once at construction; the per-block path only copies, windows
//! and transforms.

use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

use crate::error::DspError;

/// Smallest and largest analysis windows ever used.
pub const MIN_WINDOW: usize = 8192;
pub const MAX_WINDOW: usize = 32768;

/// Spectrum production cadence.
const SPECTRA_PER_SECOND: f32 = 30.0;

/// Ring-buffered real-FFT power-spectrum stage.
pub struct RingFft {
    window_size: usize,
    rate: f32,
    hann: Vec<f32>,
    ring: Vec<f32>,
    write_pos: usize,
    since_fft: usize,
    samples_per_fft: usize,
    fft_in: Vec<f32>,
    fft_out: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    power: Vec<f32>,
    plan: Arc<dyn RealToComplex<f32>>,
}

impl RingFft {
    /// Build the stage for `rate`. The window is the smallest power of two
    /// at least max(`MIN_WINDOW`, rate / `rate_divisor`), capped at
    /// `MAX_WINDOW`.
    pub fn new(rate: f32, rate_divisor: f32) -> Result<Self, DspError> {
        if !(rate > 0.0) || !(rate_divisor > 0.0) {
            return Err(DspError::InvalidSampleRate(rate));
        }
        let target = ((rate / rate_divisor).ceil() as usize).max(MIN_WINDOW);
        let window_size = target.next_power_of_two().min(MAX_WINDOW);

        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(window_size);
        let fft_in = plan.make_input_vec();
        let fft_out = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();

        Ok(Self {
            window_size,
            rate,
            hann: amplitude_hann(window_size),
            ring: vec![0.0; window_size],
            write_pos: 0,
            since_fft: 0,
            samples_per_fft: (rate / SPECTRA_PER_SECOND) as usize,
            fft_in,
            fft_out,
            scratch,
            power: vec![0.0; window_size / 2],
            plan,
        })
    }

    /// Feed one block. Returns true when a fresh power spectrum was
    /// produced - at most once per block.
    pub fn run(&mut self, block: &[f32]) -> bool {
        debug_assert!(block.len() <= self.window_size);
        let n_siz = self.window_size;
        for (i, &x) in block.iter().enumerate() {
            self.ring[(self.write_pos + i) % n_siz] = x;
        }
        self.write_pos = (self.write_pos + block.len()) % n_siz;

        self.since_fft += block.len();
        if self.since_fft < self.samples_per_fft {
            return false;
        }
        self.since_fft = 0;
        self.analyze()
    }

    /// Assemble the logically-last window out of the ring (two copies
    /// around the wrap), apply the window and transform.
    fn analyze(&mut self) -> bool {
        let start = self.write_pos;
        let tail = self.window_size - start;
        self.fft_in[..tail].copy_from_slice(&self.ring[start..]);
        self.fft_in[tail..].copy_from_slice(&self.ring[..start]);

        for (x, &w) in self.fft_in.iter_mut().zip(self.hann.iter()) {
            *x *= w;
        }

        if self
            .plan
            .process_with_scratch(&mut self.fft_in, &mut self.fft_out, &mut self.scratch)
            .is_err()
        {
            return false;
        }

        // DC and Nyquist carry no usable pitch information
        let half = self.window_size / 2;
        self.power[0] = 0.0;
        for k in 1..half - 1 {
            self.power[k] = self.fft_out[k].norm_sqr();
        }
        self.power[half - 1] = 0.0;
        true
    }

    /// Most recent power spectrum, `window_size / 2` bins.
    pub fn power(&self) -> &[f32] {
        &self.power
    }

    /// Width of one bin in Hz.
    #[inline]
    pub fn bin_width(&self) -> f32 {
        self.rate / self.window_size as f32
    }

    /// Center frequency of bin `k`.
    #[inline]
    pub fn freq_of_bin(&self, k: usize) -> f32 {
        k as f32 * self.bin_width()
    }

    /// Bin index containing frequency `hz`.
    #[inline]
    pub fn bin_of_freq(&self, hz: f32) -> usize {
        (hz / self.bin_width()) as usize
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Clear the ring, the power buffer and the production counter.
    pub fn reset(&mut self) {
        self.ring.fill(0.0);
        self.power.fill(0.0);
        self.write_pos = 0;
        self.since_fft = 0;
    }
}

/// Hann window scaled so a sine of amplitude A reads as a power-spectrum
/// peak of about A squared. The raw Hann sum is window_size / 2; scaling by
/// 2 / sum makes bin magnitudes read as linear signal amplitude.
fn amplitude_hann(n: usize) -> Vec<f32> {
    let mut w: Vec<f32> = (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / n as f64).cos() as f32)
        .collect();
    let sum: f64 = w.iter().map(|&v| v as f64).sum();
    let scale = (2.0 / sum) as f32;
    for v in w.iter_mut() {
        *v *= scale;
    }
    w
}
