//! Detector Error Types

use thiserror::Error;

/// Errors that can occur while constructing a detector. The per-block
/// processing path itself is infallible: signal-level faults are state
/// transitions, never errors.
#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Unsupported sample rate: {0} Hz (supported: 8000-192000)")]
    UnsupportedSampleRate(f32),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("DSP error: {0}")]
    Dsp(#[from] pitchlock_dsp::DspError),
}

/// Result type alias for detector construction
pub type DetectorResult<T> = Result<T, DetectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DetectorError::UnsupportedSampleRate(1000.0);
        assert!(err.to_string().contains("1000"));

        let err = DetectorError::InvalidConfig("filter order 3".into());
        assert!(err.to_string().contains("filter order 3"));
    }

    #[test]
    fn test_error_from_dsp() {
        let dsp_err = pitchlock_dsp::DspError::InvalidFilterOrder(3);
        let err: DetectorError = dsp_err.into();
        assert!(matches!(err, DetectorError::Dsp(_)));
    }
}
