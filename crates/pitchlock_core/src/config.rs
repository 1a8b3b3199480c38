//! Detector Configuration
//!
//! The original build shipped several variants of the same engine that
//! differed only in a handful of tuning constants. Those constants form one
//! construction-time record here; nothing else distinguishes the variants.

use serde::{Deserialize, Serialize};

use crate::error::DetectorError;

/// Operating mode, decoded from the host's mode port each block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    /// Full FFT + filter + DLL auto detection.
    Auto,
    /// Track a fixed frequency in Hz; the FFT stage is skipped.
    FixedFreq(f32),
    /// Track the equal-tempered frequency of a MIDI note.
    FixedNote(u8),
}

impl Mode {
    /// Decode the host's scalar mode port: positive values below 10 kHz are
    /// a frequency in Hz, -1..=-128 encode MIDI note `-1 - value`, anything
    /// else selects auto-detection.
    pub fn from_port(value: f32) -> Self {
        if value > 0.0 && value < 10_000.0 {
            Mode::FixedFreq(value)
        } else if (-128.0..=-1.0).contains(&value) {
            Mode::FixedNote((-1.0 - value) as u8)
        } else {
            Mode::Auto
        }
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Auto
    }
}

/// Construction-time variant record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// The FFT window targets `sample_rate / fft_rate_divisor` samples
    /// (rounded to a power of two within 8192..=32768).
    pub fft_rate_divisor: f32,
    /// Squared-RMS gate below which the pipeline is untracked (~-67 dBFS).
    pub rms_gate: f32,
    /// FFT peak threshold as a fraction of the squared input RMS.
    pub fft_threshold_factor: f32,
    /// Peak scan ceiling in Hz.
    pub fft_ceiling_hz: f32,
    /// Band-pass bandwidth floor in Hz.
    pub bandwidth_floor_hz: f32,
    /// Band-pass bandwidth as a fraction of the center frequency; a tad
    /// more than a semitone.
    pub bandwidth_factor: f32,
    /// Butterworth order, 2 or 4.
    pub filter_order: u8,
    /// Feed both edges of each period to the DLL (false: rising only).
    pub two_edge: bool,
    /// Post-filter gate as a fraction of the input RMS, below/above a
    /// 50 Hz center frequency.
    pub postfilter_ratio_low: f32,
    pub postfilter_ratio: f32,
    /// FFT note stability (in samples) before a proposal is adopted while
    /// the DLL is uninitialized.
    pub fft_adopt_samples: u32,
    /// Stability before a proposal that drifted away from the tracked
    /// frequency is adopted.
    pub fft_drift_samples: u32,
    /// Stability of `sample_rate / fft_force_divisor` samples adopts the
    /// proposal unconditionally, overtone guard included.
    pub fft_force_divisor: f32,
    /// Skip the filter/DLL stages and report the FFT peak directly.
    pub fft_only: bool,
    /// Run the note on/off decider and fill the MIDI event buffer.
    pub midi: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            fft_rate_divisor: 15.0,
            rms_gate: 2e-7,
            fft_threshold_factor: 1e-3,
            fft_ceiling_hz: 4000.0,
            bandwidth_floor_hz: 15.0,
            bandwidth_factor: 0.15,
            filter_order: 2,
            two_edge: true,
            postfilter_ratio_low: 0.003,
            postfilter_ratio: 0.01,
            fft_adopt_samples: 768,
            fft_drift_samples: 1536,
            fft_force_divisor: 8.0,
            fft_only: false,
            midi: false,
        }
    }
}

impl DetectorConfig {
    /// Spectrum-only variant: larger analysis window, no filter/DLL stage.
    pub fn fft_only() -> Self {
        Self {
            fft_rate_divisor: 8.0,
            fft_only: true,
            ..Self::default()
        }
    }

    /// MIDI variant: note on/off events instead of scalar outputs. The
    /// steeper cascade keeps out-of-band bursts from reaching the note
    /// decider.
    pub fn midi() -> Self {
        Self {
            fft_rate_divisor: 8.0,
            filter_order: 4,
            midi: true,
            ..Self::default()
        }
    }

    /// Validate the record before construction.
    pub fn validate(&self) -> Result<(), DetectorError> {
        if self.filter_order != 2 && self.filter_order != 4 {
            return Err(DetectorError::InvalidConfig(format!(
                "filter order {} (must be 2 or 4)",
                self.filter_order
            )));
        }
        if !(self.fft_rate_divisor > 0.0) {
            return Err(DetectorError::InvalidConfig(format!(
                "fft rate divisor {}",
                self.fft_rate_divisor
            )));
        }
        if !(self.rms_gate > 0.0) {
            return Err(DetectorError::InvalidConfig(format!("rms gate {}", self.rms_gate)));
        }
        if !(self.bandwidth_floor_hz > 0.0) || !(self.bandwidth_factor > 0.0) {
            return Err(DetectorError::InvalidConfig(format!(
                "bandwidth floor {} / factor {}",
                self.bandwidth_floor_hz, self.bandwidth_factor
            )));
        }
        if !(self.fft_force_divisor > 0.0) {
            return Err(DetectorError::InvalidConfig(format!(
                "fft force divisor {}",
                self.fft_force_divisor
            )));
        }
        Ok(())
    }
}
