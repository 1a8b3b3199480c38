//! Tracking Band-Pass Filter
//!
//! Butterworth band-pass realized as a cascade of BiQuad sections, centered
//! on the frequency the detector is currently tracking. Cleaning the
//! waveform this way is what makes zero-crossing counting viable on real
//! instrument signals.

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type};

use crate::error::DspError;

/// Band-pass cascade tuned to one center frequency.
///
/// Order 2 runs a single section, order 4 two identical sections.
/// Q = fc / bw on each section.
pub struct BandpassFilter {
    stages: [DirectForm2Transposed<f32>; 2],
    cascade: usize,
}

impl BandpassFilter {
    /// Build a band-pass centered on `fc` with bandwidth `bw`.
    pub fn setup(rate: f32, fc: f32, bw: f32, order: u8) -> Result<Self, DspError> {
        let cascade = match order {
            2 => 1,
            4 => 2,
            other => return Err(DspError::InvalidFilterOrder(other)),
        };
        let coeffs = Self::coefficients(rate, fc, bw)?;
        Ok(Self {
            stages: [
                DirectForm2Transposed::<f32>::new(coeffs),
                DirectForm2Transposed::<f32>::new(coeffs),
            ],
            cascade,
        })
    }

    fn coefficients(rate: f32, fc: f32, bw: f32) -> Result<Coefficients<f32>, DspError> {
        let q = (fc / bw).max(0.1);
        Coefficients::<f32>::from_params(Type::BandPass, rate.hz(), fc.hz(), q).map_err(|_| {
            DspError::InvalidCoefficients {
                frequency: fc,
                sample_rate: rate,
            }
        })
    }

    /// Retarget the cascade and clear its delay lines. The caller is
    /// expected to discard a short warm-up of output samples afterwards.
    pub fn retune(&mut self, rate: f32, fc: f32, bw: f32) -> Result<(), DspError> {
        let coeffs = Self::coefficients(rate, fc, bw)?;
        for stage in self.stages.iter_mut() {
            stage.update_coefficients(coeffs);
            stage.reset_state();
        }
        Ok(())
    }

    /// Advance the cascade by one sample.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let mut y = self.stages[0].run(x);
        if self.cascade == 2 {
            y = self.stages[1].run(y);
        }
        y
    }

    /// Clear the delay lines without touching the coefficients.
    pub fn reset(&mut self) {
        for stage in self.stages.iter_mut() {
            stage.reset_state();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: f32 = 48000.0;

    /// Steady-state output RMS for a sine of `freq` through `filter`.
    fn response_rms(filter: &mut BandpassFilter, freq: f32) -> f32 {
        filter.reset();
        let settle = 4800;
        let measure = 9600;
        let mut acc = 0.0_f64;
        for i in 0..settle + measure {
            let t = i as f32 / RATE;
            let y = filter.process((2.0 * std::f32::consts::PI * freq * t).sin());
            if i >= settle {
                acc += (y as f64) * (y as f64);
            }
        }
        ((acc / measure as f64).sqrt()) as f32
    }

    #[test]
    fn test_rejects_bad_order() {
        assert!(BandpassFilter::setup(RATE, 440.0, 66.0, 3).is_err());
        assert!(BandpassFilter::setup(RATE, 440.0, 66.0, 0).is_err());
    }

    #[test]
    fn test_order_2_passes_center_rejects_octave() {
        let mut f = BandpassFilter::setup(RATE, 440.0, 66.0, 2).unwrap();
        let center = response_rms(&mut f, 440.0);
        let octave_up = response_rms(&mut f, 880.0);
        let octave_down = response_rms(&mut f, 220.0);
        assert!(octave_up / center < 0.3, "octave up leaked: {}", octave_up / center);
        assert!(octave_down / center < 0.3, "octave down leaked: {}", octave_down / center);
    }

    #[test]
    fn test_order_4_is_steeper() {
        let mut f2 = BandpassFilter::setup(RATE, 440.0, 66.0, 2).unwrap();
        let mut f4 = BandpassFilter::setup(RATE, 440.0, 66.0, 4).unwrap();
        let leak2 = response_rms(&mut f2, 880.0) / response_rms(&mut f2, 440.0);
        let leak4 = response_rms(&mut f4, 880.0) / response_rms(&mut f4, 440.0);
        assert!(leak4 < leak2 * 0.5, "order 4 not steeper: {} vs {}", leak4, leak2);
    }

    #[test]
    fn test_retune_moves_the_passband() {
        let mut f = BandpassFilter::setup(RATE, 440.0, 66.0, 2).unwrap();
        let before = response_rms(&mut f, 220.0);
        f.retune(RATE, 220.0, 33.0).unwrap();
        let after = response_rms(&mut f, 220.0);
        assert!(after > before * 2.0, "retune had no effect: {} -> {}", before, after);
    }

    #[test]
    fn test_output_stays_finite() {
        let mut f = BandpassFilter::setup(RATE, 100.0, 15.0, 4).unwrap();
        for i in 0..10_000 {
            let x = if i % 97 == 0 { 1.0 } else { -0.25 };
            let y = f.process(x);
            assert!(y.is_finite());
        }
    }
}
