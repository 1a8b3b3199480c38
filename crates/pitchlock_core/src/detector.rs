//! Detection Orchestrator
//!
//! Composes the DSP stages into the per-block state machine: the FFT
//! proposes a note, the band-pass isolates it, the DLL measures it, the
//! note mapper reports it. One instance owns all cross-block state and is
//! driven synchronously by the host audio thread; nothing on the block path
//! allocates, locks or performs I/O.

use tracing::{debug, trace};

use pitchlock_dsp::{
    find_fundamental, map_frequency, midi_note, note_frequency, BandpassFilter, DelayLockedLoop,
    RingFft, RmsEnvelope,
};

use crate::config::{DetectorConfig, Mode};
use crate::error::{DetectorError, DetectorResult};
use crate::midi::{MidiDecider, MidiEvent};
use crate::output::{BlockOutput, SpectrumPoint};

/// Tracking bounds; targets outside are treated as loss of signal.
const FREQ_MIN: f32 = 20.0;
const FREQ_MAX: f32 = 10_000.0;

/// Samples discarded after every filter retune.
const FILTER_WARMUP: u32 = 16;

/// Center frequency below which the stricter post-filter ratio applies.
const LOW_FC: f32 = 50.0;

/// FFT/tracked disagreement that counts as drift: max(5 Hz, 5%).
const DRIFT_MIN_HZ: f32 = 5.0;
const DRIFT_FACTOR: f32 = 0.05;

/// A proposal this close to twice the tracked frequency is taken for the
/// 1st overtone (often louder than the fundamental) and ignored until the
/// long-run counter trips.
const OVERTONE_GUARD_HZ: f32 = 10.0;

/// Spectrum snapshot limits: point cap, frequency ceiling, power floor
/// (~-92 dB).
const SPECTRUM_MAX_POINTS: usize = 512;
const SPECTRUM_CEILING_HZ: f32 = 3000.0;
const SPECTRUM_FLOOR: f32 = 6.3e-10;

/// MIDI events kept per block; anything beyond this in one block is
/// dropped rather than allocated for.
const MIDI_CAPACITY: usize = 64;

const RATE_MIN: f32 = 8000.0;
const RATE_MAX: f32 = 192_000.0;

/// The detection engine. One instance per audio stream.
pub struct Detector {
    rate: f32,
    config: DetectorConfig,
    mode: Mode,
    tuning: f32,

    tracked_fc: f32,
    freq_ceiling: f32,
    prev_sample: f32,
    input_rms: RmsEnvelope,
    filtered_rms: RmsEnvelope,
    filter: BandpassFilter,
    filter_warmup: u32,
    dll: DelayLockedLoop,
    monotonic_cnt: u64,

    ring_fft: RingFft,
    fft_note: i32,
    fft_note_count: u32,
    fft_force_samples: u32,

    midi_decider: MidiDecider,
    midi_events: Vec<MidiEvent>,

    spectrum_tap: bool,
    spectrum: Vec<SpectrumPoint>,
    spectrum_serial: u64,

    output: BlockOutput,
}

impl Detector {
    pub fn new(rate: f32, config: DetectorConfig) -> DetectorResult<Self> {
        if !(RATE_MIN..=RATE_MAX).contains(&rate) {
            return Err(DetectorError::UnsupportedSampleRate(rate));
        }
        config.validate()?;

        let ring_fft = RingFft::new(rate, config.fft_rate_divisor)?;
        // placeholder target; the first retune recomputes the cascade
        let filter = BandpassFilter::setup(rate, 440.0, 66.0, config.filter_order)?;
        let edges = if config.two_edge { 2 } else { 1 };

        Ok(Self {
            rate,
            mode: Mode::Auto,
            tuning: 440.0,
            tracked_fc: 0.0,
            freq_ceiling: FREQ_MAX.min(rate * 0.45),
            prev_sample: 0.0,
            input_rms: RmsEnvelope::new(rate),
            filtered_rms: RmsEnvelope::new(rate),
            filter,
            filter_warmup: 0,
            dll: DelayLockedLoop::new(rate as f64, edges),
            monotonic_cnt: 0,
            ring_fft,
            fft_note: -1,
            fft_note_count: 0,
            fft_force_samples: (rate / config.fft_force_divisor) as u32,
            midi_decider: MidiDecider::new(rate as f64),
            midi_events: Vec::with_capacity(MIDI_CAPACITY),
            spectrum_tap: false,
            spectrum: Vec::with_capacity(SPECTRUM_MAX_POINTS),
            spectrum_serial: 0,
            output: BlockOutput::default(),
            config,
        })
    }

    /// Reference tuning (A4), read from the host each block. Clamped to the
    /// port range.
    pub fn set_tuning(&mut self, hz: f32) {
        self.tuning = hz.clamp(220.0, 880.0);
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    /// Enable or disable the UI spectrum snapshot.
    pub fn set_spectrum_tap(&mut self, open: bool) {
        self.spectrum_tap = open;
    }

    pub fn sample_rate(&self) -> f32 {
        self.rate
    }

    /// Center frequency the filter/DLL are currently tuned to; 0 while
    /// untracked.
    pub fn tracked_freq(&self) -> f32 {
        self.tracked_fc
    }

    pub fn output(&self) -> &BlockOutput {
        &self.output
    }

    /// MIDI events of the most recent block, in nondecreasing frame order.
    pub fn midi_events(&self) -> &[MidiEvent] {
        &self.midi_events
    }

    /// Latest spectrum snapshot (empty unless the tap is open).
    pub fn spectrum(&self) -> &[SpectrumPoint] {
        &self.spectrum
    }

    /// Increments whenever the snapshot is refreshed, so a polling UI can
    /// skip stale frames.
    pub fn spectrum_serial(&self) -> u64 {
        self.spectrum_serial
    }

    /// Return to the untracked state and clear all signal history.
    pub fn reset(&mut self) {
        self.tracked_fc = 0.0;
        self.prev_sample = 0.0;
        self.input_rms.clear();
        self.filtered_rms.clear();
        self.filter.reset();
        self.filter_warmup = 0;
        self.dll.invalidate();
        self.monotonic_cnt = 0;
        self.ring_fft.reset();
        self.fft_note = -1;
        self.fft_note_count = 0;
        self.midi_decider.reset();
        self.midi_events.clear();
        self.spectrum.clear();
        self.output = BlockOutput::default();
    }

    /// Process one host block and refresh the scalar outputs.
    ///
    /// `output` receives a pass-through copy of the input; pass `None` when
    /// the host runs in-place and no copy is wanted.
    pub fn process(&mut self, input: &[f32], output: Option<&mut [f32]>) -> &BlockOutput {
        let n_samples = input.len();
        self.midi_events.clear();

        let tuning = self.tuning;
        let mut freq = match self.mode {
            Mode::Auto => self.tracked_fc,
            Mode::FixedFreq(f) => f,
            Mode::FixedNote(m) => note_frequency(m as i32, tuning),
        };
        let auto = matches!(self.mode, Mode::Auto);
        let mut fft_fresh = auto && self.ring_fft.run(input);
        if fft_fresh {
            self.publish_spectrum();
        }

        let mut detected_sum = 0.0_f64;
        let mut detected_count = 0u32;
        let mut fft_detected = 0.0_f32;

        for (n, &x) in input.iter().enumerate() {
            let rms_sq = self.input_rms.update(x);

            // 1) input gate
            if rms_sq < self.config.rms_gate {
                self.dll.invalidate();
                self.fft_note_count = 0;
                self.prev_sample = 0.0;
                self.midi_off(n as u32);
                continue;
            }

            // 2) fold a fresh spectrum into the tracking decision once,
            // on the first gated sample of the block
            if fft_fresh {
                fft_fresh = false;
                freq = self.arbitrate(freq, rms_sq, n_samples as u32, &mut fft_detected);
            }

            if self.config.fft_only {
                continue;
            }

            // 3) refuse to track insanity
            if !(FREQ_MIN..=self.freq_ceiling).contains(&freq) {
                self.dll.invalidate();
                self.prev_sample = 0.0;
                self.midi_off(n as u32);
                continue;
            }

            // 4) retarget filter and DLL when the decision changed
            if freq != self.tracked_fc && !self.retune(freq) {
                self.dll.invalidate();
                continue;
            }

            // 5) clean up the waveform for crossing detection
            let signal = self.filter.process(x);
            if self.filter_warmup > 0 {
                self.filter_warmup -= 1;
                self.filtered_rms.clear();
                self.midi_off(n as u32);
                continue;
            }

            // 6) reject signals without energy in the tracked band
            let post_sq = self.filtered_rms.update(signal);
            let ratio = if self.tracked_fc < LOW_FC {
                self.config.postfilter_ratio_low
            } else {
                self.config.postfilter_ratio
            };
            if post_sq < rms_sq * ratio {
                self.dll.invalidate();
                self.prev_sample = 0.0;
                self.midi_off(n as u32);
                continue;
            }

            // 7) zero crossings drive the DLL
            if self.is_crossing(signal) {
                let now = (self.monotonic_cnt + n as u64) as f64;
                if let Some(est) = self.dll.crossing(now) {
                    if est.freq.is_finite() && est.freq > 0.0 {
                        detected_sum += est.freq as f64;
                        detected_count += 1;
                        if self.config.midi {
                            self.midi_decider.note_on(
                                n as u32,
                                est.freq,
                                est.phase_error,
                                tuning,
                                &mut self.midi_events,
                            );
                        }
                    }
                }
            }
            self.prev_sample = signal;
        }

        if let Some(out) = output {
            debug_assert_eq!(out.len(), input.len());
            let n = out.len().min(input.len());
            out[..n].copy_from_slice(&input[..n]);
        }

        if self.config.fft_only && fft_detected > 0.0 {
            detected_sum = fft_detected as f64;
            detected_count = 1;
        }

        // phase stays meaningful across blocks only while the loop is locked
        if self.dll.is_initialized() {
            self.monotonic_cnt += n_samples as u64;
        } else {
            self.monotonic_cnt = 0;
        }

        if detected_count > 0 {
            let freq_avg = (detected_sum / detected_count as f64) as f32;
            if let Some(mapping) = map_frequency(freq_avg, tuning) {
                self.output.freq_hz = freq_avg;
                self.output.octave = mapping.octave;
                self.output.pitch_class = mapping.pitch_class;
                self.output.cents = mapping.cents;
                self.output.phase_error_pct = (100.0 * self.dll.phase_error()
                    * mapping.note_freq as f64
                    / self.rate as f64) as f32;
            }
        } else if !self.dll.is_initialized() {
            self.output.freq_hz = 0.0;
            self.output.phase_error_pct = -100.0;
        }
        // else: a short block with the loop still locked holds its values

        self.output.rms_db = self.input_rms.db();
        self.output.strobe = self.monotonic_cnt as f32 / self.rate;
        &self.output
    }

    /// Fold the latest spectrum into the tracking decision, returning the
    /// (possibly adjusted) target frequency.
    fn arbitrate(&mut self, freq: f32, rms_sq: f32, n_samples: u32, fft_detected: &mut f32) -> f32 {
        let threshold = self.config.rms_gate.max(rms_sq * self.config.fft_threshold_factor);
        let ceiling_bin = self.ring_fft.bin_of_freq(self.config.fft_ceiling_hz);
        let peak = find_fundamental(self.ring_fft.power(), threshold, ceiling_bin);
        let peak_freq = peak.map_or(0.0, |p| p.bin * self.ring_fft.bin_width());

        if peak_freq < FREQ_MIN {
            self.fft_note_count = 0;
            return freq;
        }

        let note = midi_note(peak_freq, self.tuning);
        let note_freq = note_frequency(note, self.tuning);
        if note == self.fft_note {
            self.fft_note_count = self.fft_note_count.saturating_add(n_samples);
        } else {
            self.fft_note_count = 0;
        }
        self.fft_note = note;
        trace!(peak_freq, note, count = self.fft_note_count, "fft proposal");

        if self.config.fft_only {
            // two consecutive agreeing spectra are enough for readout
            if self.fft_note_count > 0 {
                *fft_detected = peak_freq;
                self.dll.force_initialized();
            }
            return freq;
        }

        if !(0..128).contains(&note) || note_freq == freq {
            return freq;
        }
        let count = self.fft_note_count;
        let drift = (freq - note_freq).abs() > (freq * DRIFT_FACTOR).max(DRIFT_MIN_HZ);
        let overtone = (2.0 * freq - note_freq).abs() <= OVERTONE_GUARD_HZ;
        let adopt = (!self.dll.is_initialized() && count > self.config.fft_adopt_samples)
            || (count > self.config.fft_drift_samples && drift && !overtone)
            || count > self.fft_force_samples;
        if adopt {
            debug!(from = freq, to = note_freq, note, "fft adjust");
            return note_freq;
        }
        freq
    }

    /// Point the band-pass and the DLL at a new center frequency.
    fn retune(&mut self, freq: f32) -> bool {
        self.tracked_fc = freq;
        self.dll.tune(freq as f64);
        let bw = (freq * self.config.bandwidth_factor).max(self.config.bandwidth_floor_hz);
        debug!(fc = freq, bw, "retune band-pass");
        if self.filter.retune(self.rate, freq, bw).is_err() {
            // the clamp keeps targets realizable; losing tracking is the
            // safe response if one ever is not
            self.tracked_fc = 0.0;
            return false;
        }
        self.filter_warmup = FILTER_WARMUP;
        true
    }

    #[inline]
    fn is_crossing(&self, signal: f32) -> bool {
        let rising = signal >= 0.0 && self.prev_sample < 0.0;
        let falling = signal <= 0.0 && self.prev_sample > 0.0;
        rising || (self.config.two_edge && falling)
    }

    #[inline]
    fn midi_off(&mut self, frame: u32) {
        if self.config.midi {
            self.midi_decider.note_off(frame, &mut self.midi_events);
        }
    }

    /// Refresh the UI snapshot: up to 512 points below 3 kHz, culled at
    /// about -92 dB.
    fn publish_spectrum(&mut self) {
        if !self.spectrum_tap {
            return;
        }
        self.spectrum.clear();
        let bin_width = self.ring_fft.bin_width();
        let ceiling = self
            .ring_fft
            .bin_of_freq(SPECTRUM_CEILING_HZ)
            .min(self.ring_fft.power().len());
        for k in 1..ceiling {
            let power = self.ring_fft.power()[k];
            if power < SPECTRUM_FLOOR {
                continue;
            }
            if self.spectrum.len() == SPECTRUM_MAX_POINTS {
                break;
            }
            self.spectrum.push(SpectrumPoint {
                freq: k as f32 * bin_width,
                power,
            });
        }
        self.spectrum_serial += 1;
    }
}
