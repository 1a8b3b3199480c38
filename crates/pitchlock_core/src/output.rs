//! Block Output Contract
//!
//! Control-rate values the host reads after each processed block. A UI
//! thread polling these through the host's port protocol sees each field
//! written exactly once per block.

/// Scalar outputs, refreshed at the end of every block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockOutput {
    /// Input level, 10*log10 of the squared RMS, clamped at -100 dB.
    pub rms_db: f32,
    /// Detected fundamental in Hz; 0 while no signal is tracked.
    pub freq_hz: f32,
    /// Scientific octave of the detected note, -1..9.
    pub octave: i32,
    /// Pitch class of the detected note, 0 = C .. 11 = B.
    pub pitch_class: u8,
    /// Deviation from the tempered note in cents.
    pub cents: f32,
    /// DLL phase error as a percentage of the expected period; -100 while
    /// no signal is tracked.
    pub phase_error_pct: f32,
    /// Seconds since the detector last lost lock; drives strobe displays.
    pub strobe: f32,
}

impl Default for BlockOutput {
    /// Priming values reported before the first block is processed.
    fn default() -> Self {
        Self {
            rms_db: -100.0,
            freq_hz: 0.0,
            octave: 4,
            pitch_class: 9,
            cents: 0.0,
            phase_error_pct: -100.0,
            strobe: 0.0,
        }
    }
}

/// One point of the UI spectrum snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrumPoint {
    /// Bin center frequency in Hz.
    pub freq: f32,
    /// Power at that bin.
    pub power: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priming_values() {
        let out = BlockOutput::default();
        assert_eq!(out.freq_hz, 0.0);
        assert_eq!(out.octave, 4);
        assert_eq!(out.pitch_class, 9);
        assert_eq!(out.phase_error_pct, -100.0);
    }
}
