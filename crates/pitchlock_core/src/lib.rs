//! Pitchlock Core - Detection Engine
//!
//! This crate provides the real-time pitch detection engine:
//! - Per-block orchestration of the DSP stages (FFT estimate, adaptive
//!   band-pass, phase-locked delay line)
//! - Note/cent/phase-error scalar outputs for the host
//! - Debounced MIDI note on/off decisions
//! - A construction-time variant configuration record
//!
//! # Architecture
//!
//! ```text
//! audio ──┬──▶ RMS gate ─────────────────────────────┐
//!         └──▶ ring FFT ──▶ overtone scan ──▶ note   │
//!                               │ (retune decision)  ▼
//!              band-pass ◀──────┴──▶ DLL ──▶ note map / MIDI decider
//! ```
//!
//! The host audio thread drives `Detector::process` one block at a time;
//! every output is written once per block. Nothing on that path allocates.

mod config;
mod detector;
mod error;
mod midi;
mod output;

pub use config::{DetectorConfig, Mode};
pub use detector::Detector;
pub use error::{DetectorError, DetectorResult};
pub use midi::{MidiDecider, MidiEvent, NOTE_OFF, NOTE_ON};
pub use output::{BlockOutput, SpectrumPoint};

// Re-export the DSP vocabulary the host glue usually wants alongside
pub use pitchlock_dsp::{NoteMapping, NOTE_NAMES};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_exports() {
        let config = DetectorConfig::default();
        let detector = Detector::new(48000.0, config);
        assert!(detector.is_ok());
    }
}
