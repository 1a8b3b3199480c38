//! DSP Error Types

use thiserror::Error;

/// Errors that can occur while configuring DSP components
#[derive(Error, Debug)]
pub enum DspError {
    #[error("Sample rate must be positive, got {0}")]
    InvalidSampleRate(f32),

    #[error("Invalid band-pass coefficients for center {frequency}Hz at sample rate {sample_rate}Hz")]
    InvalidCoefficients { frequency: f32, sample_rate: f32 },

    #[error("Unsupported filter order: {0} (must be 2 or 4)")]
    InvalidFilterOrder(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DspError::InvalidSampleRate(-1.0);
        assert!(err.to_string().contains("-1"));

        let err = DspError::InvalidCoefficients {
            frequency: 440.0,
            sample_rate: 48000.0,
        };
        assert!(err.to_string().contains("440"));
        assert!(err.to_string().contains("48000"));
    }
}
