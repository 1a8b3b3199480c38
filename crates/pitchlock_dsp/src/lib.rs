//! Pitchlock DSP - Signal-Processing Primitives
//!
//! The leaf transforms of the detection pipeline:
//! - Ring-buffered Hann/FFT power-spectrum stage (~30 spectra/s)
//! - Overtone-ladder fundamental finder over a power spectrum
//! - Butterworth band-pass tracking filter (BiQuad cascade)
//! - Second-order delay-locked loop over zero-crossing times
//! - One-pole RMS envelope for gating
//! - Equal-temperament note/cent mapping
//!
//! # Architecture
//!
//! Every type here is a pure state machine over its own sub-state: no
//! allocation after construction, no locks, no I/O. The `pitchlock_core`
//! orchestrator owns one of each and drives them in deterministic sample
//! order from the host's audio callback.

mod bandpass;
mod dll;
mod envelope;
mod error;
mod note;
mod overtone;
mod ring_fft;

pub use bandpass::BandpassFilter;
pub use dll::{CrossingEstimate, DelayLockedLoop};
pub use envelope::RmsEnvelope;
pub use error::DspError;
pub use note::{map_frequency, midi_note, note_frequency, NoteMapping, NOTE_NAMES};
pub use overtone::{find_fundamental, FundamentalPeak};
pub use ring_fft::{RingFft, MAX_WINDOW, MIN_WINDOW};
