//! MIDI Note Decisions
//!
//! Turns the stream of per-crossing frequency estimates into debounced
//! note-on/note-off events. Dwell counters scale with the key: low notes
//! cross less often and need a longer look before a note-on, high notes
//! release faster on the way out.

use pitchlock_dsp::midi_note;

/// Status bytes of the only two messages ever produced.
pub const NOTE_ON: u8 = 0x90;
pub const NOTE_OFF: u8 = 0x80;

const VELOCITY: u8 = 127;

/// Crossings whose phase error exceeds this percentage of the expected
/// period are not trusted for note decisions.
const PHASE_ERROR_VETO_PCT: f64 = 30.0;

/// Candidate sentinel used while releasing; never collides with a key.
const RELEASING: u16 = 255;

/// A raw 3-byte MIDI message stamped with its in-block sample offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEvent {
    /// Sample offset within the current block.
    pub frame: u32,
    /// Standard 3-byte channel message.
    pub message: [u8; 3],
}

impl MidiEvent {
    fn note_on(frame: u32, key: u8) -> Self {
        Self {
            frame,
            message: [NOTE_ON, key, VELOCITY],
        }
    }

    fn note_off(frame: u32, key: u8) -> Self {
        Self {
            frame,
            message: [NOTE_OFF, key, 0],
        }
    }

    pub fn is_note_on(&self) -> bool {
        self.message[0] == NOTE_ON
    }

    pub fn is_note_off(&self) -> bool {
        self.message[0] == NOTE_OFF
    }

    pub fn key(&self) -> u8 {
        self.message[1]
    }
}

/// Debounced note on/off state machine.
pub struct MidiDecider {
    rate: f64,
    last_key: u8,
    last_vel: u8,
    candidate_key: u16,
    candidate_dwell: u32,
}

impl MidiDecider {
    pub fn new(rate: f64) -> Self {
        Self {
            rate,
            last_key: 0,
            last_vel: 0,
            candidate_key: RELEASING,
            candidate_dwell: 0,
        }
    }

    /// Feed one accepted crossing: `freq` in Hz, `phase_error` in samples.
    pub fn note_on(
        &mut self,
        frame: u32,
        freq: f32,
        phase_error: f64,
        tuning: f32,
        events: &mut Vec<MidiEvent>,
    ) {
        let key_number = midi_note(freq, tuning);
        if !(0..=127).contains(&key_number) {
            return;
        }
        if (100.0 * phase_error * freq as f64 / self.rate).abs() > PHASE_ERROR_VETO_PCT {
            return;
        }
        let key = key_number as u8;

        // first sighting of a key never fires
        if self.candidate_key != key as u16 {
            self.candidate_key = key as u16;
            self.candidate_dwell = 1;
            return;
        }
        if self.candidate_dwell < (127 - key as u32) / 5 {
            self.candidate_dwell += 1;
            return;
        }

        if self.last_key == key && self.last_vel == VELOCITY {
            return;
        }
        if self.last_vel != 0 && self.last_key != key {
            push(events, MidiEvent::note_off(frame, self.last_key));
        }
        push(events, MidiEvent::note_on(frame, key));
        self.last_key = key;
        self.last_vel = VELOCITY;
    }

    /// Called once per sample while the gates hold the pipeline untracked.
    pub fn note_off(&mut self, frame: u32, events: &mut Vec<MidiEvent>) {
        if self.last_vel == 0 {
            return;
        }
        // first miss after a sounding note starts the release dwell
        if self.candidate_key != RELEASING {
            self.candidate_key = RELEASING;
            self.candidate_dwell = 1;
            return;
        }
        if self.candidate_dwell < 9 * (200 - self.last_key as u32) {
            self.candidate_dwell += 1;
            return;
        }
        push(events, MidiEvent::note_off(frame, self.last_key));
        self.last_key = 0;
        self.last_vel = 0;
        self.candidate_dwell = 0;
    }

    pub fn reset(&mut self) {
        self.last_key = 0;
        self.last_vel = 0;
        self.candidate_key = RELEASING;
        self.candidate_dwell = 0;
    }
}

/// Append without ever growing past the reserved capacity.
#[inline]
fn push(events: &mut Vec<MidiEvent>, event: MidiEvent) {
    if events.len() < events.capacity() {
        events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: f64 = 48000.0;

    fn events() -> Vec<MidiEvent> {
        Vec::with_capacity(64)
    }

    /// Dwell calls needed before a note-on for `key` can fire: one sighting
    /// plus the key-scaled counter.
    fn on_calls(key: u32) -> u32 {
        (127 - key) / 5 + 2
    }

    #[test]
    fn test_note_on_after_dwell() {
        let mut decider = MidiDecider::new(RATE);
        let mut out = events();
        let calls = on_calls(69);
        for _ in 0..calls {
            decider.note_on(0, 440.0, 0.0, 440.0, &mut out);
        }
        assert_eq!(out.len(), 1);
        assert!(out[0].is_note_on());
        assert_eq!(out[0].key(), 69);
        assert_eq!(out[0].message[2], 127);
    }

    #[test]
    fn test_single_sighting_never_fires() {
        let mut decider = MidiDecider::new(RATE);
        let mut out = events();
        decider.note_on(0, 440.0, 0.0, 440.0, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_no_duplicate_note_on() {
        let mut decider = MidiDecider::new(RATE);
        let mut out = events();
        for _ in 0..on_calls(69) * 4 {
            decider.note_on(0, 440.0, 0.0, 440.0, &mut out);
        }
        assert_eq!(out.len(), 1, "sustained note must emit exactly one note-on");
    }

    #[test]
    fn test_phase_error_veto() {
        let mut decider = MidiDecider::new(RATE);
        let mut out = events();
        // 100 * 40 * 440 / 48000 = ~36% error, above the veto
        for _ in 0..200 {
            decider.note_on(0, 440.0, 40.0, 440.0, &mut out);
        }
        assert!(out.is_empty(), "vetoed crossings must not fire notes");
    }

    #[test]
    fn test_key_change_emits_off_then_on() {
        let mut decider = MidiDecider::new(RATE);
        let mut out = events();
        for _ in 0..on_calls(69) {
            decider.note_on(0, 440.0, 0.0, 440.0, &mut out);
        }
        for _ in 0..on_calls(71) {
            decider.note_on(10, 493.88, 0.0, 440.0, &mut out);
        }
        assert_eq!(out.len(), 3);
        assert!(out[1].is_note_off());
        assert_eq!(out[1].key(), 69);
        assert!(out[2].is_note_on());
        assert_eq!(out[2].key(), 71);
    }

    #[test]
    fn test_flapping_key_never_fires() {
        let mut decider = MidiDecider::new(RATE);
        let mut out = events();
        // alternate between two keys every few calls - dwell never completes
        for i in 0..400 {
            let freq = if (i / 4) % 2 == 0 { 440.0 } else { 466.16 };
            decider.note_on(0, freq, 0.0, 440.0, &mut out);
        }
        assert!(out.is_empty());
    }

    #[test]
    fn test_note_off_release_dwell() {
        let mut decider = MidiDecider::new(RATE);
        let mut out = events();
        for _ in 0..on_calls(69) {
            decider.note_on(0, 440.0, 0.0, 440.0, &mut out);
        }
        out.clear();

        let release = 9 * (200 - 69) + 2;
        for _ in 0..release {
            decider.note_off(0, &mut out);
        }
        assert_eq!(out.len(), 1);
        assert!(out[0].is_note_off());
        assert_eq!(out[0].key(), 69);

        // further off-calls with nothing sounding are silent
        for _ in 0..100 {
            decider.note_off(0, &mut out);
        }
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_short_dropout_does_not_release() {
        let mut decider = MidiDecider::new(RATE);
        let mut out = events();
        for _ in 0..on_calls(69) {
            decider.note_on(0, 440.0, 0.0, 440.0, &mut out);
        }
        out.clear();

        // a 10 ms dropout at 48 kHz is far below the release dwell
        for _ in 0..480 {
            decider.note_off(0, &mut out);
        }
        assert!(out.is_empty(), "short dropout must not release the note");
    }

    #[test]
    fn test_out_of_range_key_ignored() {
        let mut decider = MidiDecider::new(RATE);
        let mut out = events();
        for _ in 0..100 {
            decider.note_on(0, 5.0, 0.0, 440.0, &mut out);
        }
        assert!(out.is_empty());
    }

    #[test]
    fn test_capacity_is_never_exceeded() {
        let mut decider = MidiDecider::new(RATE);
        let mut out: Vec<MidiEvent> = Vec::with_capacity(2);
        for key in 30..90u32 {
            let freq = 440.0 * ((key as f32 - 69.0) / 12.0).exp2();
            for _ in 0..on_calls(key) {
                decider.note_on(0, freq, 0.0, 440.0, &mut out);
            }
        }
        assert_eq!(out.len(), 2);
        assert_eq!(out.capacity(), 2);
    }
}
