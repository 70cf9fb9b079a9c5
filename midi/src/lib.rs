#![warn(nonstandard_style, rust_2018_idioms, future_incompatible)]
//! A fixed-size transport-level MIDI message.
//!
//! This is the wire-side counterpart of `HiseEvent`: it only knows about the
//! bytes that travel over a MIDI cable, so it never needs more than three of
//! them. SysEx is not representable and is rejected at parse time.

mod filter;

pub use crate::filter::ChannelFilter;

use thiserror::Error;

/// Status bytes (upper nibble for channel messages, full byte for system messages).
pub mod status {
    pub const NOTE_OFF: u8 = 0x80;
    pub const NOTE_ON: u8 = 0x90;
    pub const POLY_AFTERTOUCH: u8 = 0xA0;
    pub const CONTROLLER: u8 = 0xB0;
    pub const PROGRAM_CHANGE: u8 = 0xC0;
    pub const CHANNEL_PRESSURE: u8 = 0xD0;
    pub const PITCH_WHEEL: u8 = 0xE0;
    pub const SYSEX: u8 = 0xF0;
    pub const QUARTER_FRAME: u8 = 0xF1;
    pub const SONG_POSITION: u8 = 0xF2;
    pub const SONG_SELECT: u8 = 0xF3;
    pub const START: u8 = 0xFA;
    pub const CONTINUE: u8 = 0xFB;
    pub const STOP: u8 = 0xFC;
}

pub const ALL_SOUND_OFF_CC: u8 = 120;
pub const ALL_NOTES_OFF_CC: u8 = 123;

pub const PITCH_WHEEL_CENTRE: u16 = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MidiError {
    #[error("empty MIDI message")]
    Empty,
    #[error("missing status byte (got data byte {0:#04x}); running status is not supported")]
    MissingStatus(u8),
    #[error("status {status:#04x} needs {expected} bytes, got {actual}")]
    Truncated {
        status: u8,
        expected: usize,
        actual: usize,
    },
    #[error("SysEx messages are not supported")]
    SysEx,
    #[error("MIDI channel {0} is outside 1..=16")]
    InvalidChannel(u8),
    #[error("data byte {0:#04x} has the status bit set")]
    InvalidDataByte(u8),
}

/// A single MIDI message of at most three bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MidiMessage {
    bytes: [u8; 3],
    len: u8,
}

fn expected_len(status_byte: u8) -> usize {
    match status_byte {
        0x80..=0xBF | 0xE0..=0xEF => 3,
        0xC0..=0xDF => 2,
        status::SONG_POSITION => 3,
        status::QUARTER_FRAME | status::SONG_SELECT => 2,
        _ => 1,
    }
}

fn channel_nibble(channel: u8) -> Result<u8, MidiError> {
    if (1..=16).contains(&channel) {
        Ok(channel - 1)
    } else {
        Err(MidiError::InvalidChannel(channel))
    }
}

impl MidiMessage {
    /// Parses a complete message. Bytes beyond the length implied by the
    /// status byte are ignored; data bytes with the top bit set are rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<MidiMessage, MidiError> {
        let status_byte = *bytes.first().ok_or(MidiError::Empty)?;

        if status_byte & 0x80 == 0 {
            return Err(MidiError::MissingStatus(status_byte));
        }

        if status_byte == status::SYSEX {
            return Err(MidiError::SysEx);
        }

        let expected = expected_len(status_byte);
        if bytes.len() < expected {
            return Err(MidiError::Truncated {
                status: status_byte,
                expected,
                actual: bytes.len(),
            });
        }

        if let Some(&data_byte) = bytes[1..expected].iter().find(|&&b| b & 0x80 != 0) {
            return Err(MidiError::InvalidDataByte(data_byte));
        }

        let mut raw = [0u8; 3];
        raw[..expected].copy_from_slice(&bytes[..expected]);

        Ok(MidiMessage {
            bytes: raw,
            len: expected as u8,
        })
    }

    fn channel_message(kind: u8, channel: u8, data1: u8, data2: u8) -> Result<Self, MidiError> {
        let status_byte = kind | channel_nibble(channel)?;
        Ok(MidiMessage {
            bytes: [status_byte, data1 & 0x7F, data2 & 0x7F],
            len: expected_len(status_byte) as u8,
        })
    }

    fn system_message(status_byte: u8, data1: u8, data2: u8) -> Self {
        MidiMessage {
            bytes: [status_byte, data1 & 0x7F, data2 & 0x7F],
            len: expected_len(status_byte) as u8,
        }
    }

    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Result<Self, MidiError> {
        Self::channel_message(status::NOTE_ON, channel, note, velocity)
    }

    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Result<Self, MidiError> {
        Self::channel_message(status::NOTE_OFF, channel, note, velocity)
    }

    pub fn controller(channel: u8, number: u8, value: u8) -> Result<Self, MidiError> {
        Self::channel_message(status::CONTROLLER, channel, number, value)
    }

    /// `value` is the 14-bit wheel position, 8192 being the centre.
    pub fn pitch_wheel(channel: u8, value: u16) -> Result<Self, MidiError> {
        let value = value.min(0x3FFF);
        Self::channel_message(
            status::PITCH_WHEEL,
            channel,
            (value & 0x7F) as u8,
            (value >> 7) as u8,
        )
    }

    /// Polyphonic (per-key) aftertouch.
    pub fn aftertouch(channel: u8, note: u8, amount: u8) -> Result<Self, MidiError> {
        Self::channel_message(status::POLY_AFTERTOUCH, channel, note, amount)
    }

    pub fn channel_pressure(channel: u8, pressure: u8) -> Result<Self, MidiError> {
        Self::channel_message(status::CHANNEL_PRESSURE, channel, pressure, 0)
    }

    pub fn program_change(channel: u8, program: u8) -> Result<Self, MidiError> {
        Self::channel_message(status::PROGRAM_CHANGE, channel, program, 0)
    }

    pub fn all_notes_off(channel: u8) -> Result<Self, MidiError> {
        Self::controller(channel, ALL_NOTES_OFF_CC, 0)
    }

    pub fn all_sound_off(channel: u8) -> Result<Self, MidiError> {
        Self::controller(channel, ALL_SOUND_OFF_CC, 0)
    }

    /// Song position pointer, in MIDI beats (sixteenth notes).
    pub fn song_position(midi_beats: u16) -> Self {
        let beats = midi_beats.min(0x3FFF);
        Self::system_message(
            status::SONG_POSITION,
            (beats & 0x7F) as u8,
            (beats >> 7) as u8,
        )
    }

    pub fn midi_start() -> Self {
        Self::system_message(status::START, 0, 0)
    }

    pub fn midi_continue() -> Self {
        Self::system_message(status::CONTINUE, 0, 0)
    }

    pub fn midi_stop() -> Self {
        Self::system_message(status::STOP, 0, 0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn status_byte(&self) -> u8 {
        self.bytes[0]
    }

    fn kind(&self) -> u8 {
        self.bytes[0] & 0xF0
    }

    fn is_channel_message(&self) -> bool {
        self.bytes[0] < status::SYSEX
    }

    /// The 1-based channel, or 0 for system messages.
    pub fn channel(&self) -> u8 {
        if self.is_channel_message() {
            (self.bytes[0] & 0x0F) + 1
        } else {
            0
        }
    }

    pub fn is_note_on(&self) -> bool {
        self.kind() == status::NOTE_ON && self.bytes[2] != 0
    }

    /// Note-off, including the note-on-with-velocity-zero form.
    pub fn is_note_off(&self) -> bool {
        self.kind() == status::NOTE_OFF || (self.kind() == status::NOTE_ON && self.bytes[2] == 0)
    }

    pub fn is_controller(&self) -> bool {
        self.kind() == status::CONTROLLER
    }

    pub fn is_controller_of_type(&self, number: u8) -> bool {
        self.is_controller() && self.bytes[1] == number
    }

    pub fn is_all_notes_off(&self) -> bool {
        self.is_controller_of_type(ALL_NOTES_OFF_CC)
    }

    pub fn is_all_sound_off(&self) -> bool {
        self.is_controller_of_type(ALL_SOUND_OFF_CC)
    }

    pub fn is_pitch_wheel(&self) -> bool {
        self.kind() == status::PITCH_WHEEL
    }

    pub fn is_aftertouch(&self) -> bool {
        self.kind() == status::POLY_AFTERTOUCH
    }

    pub fn is_channel_pressure(&self) -> bool {
        self.kind() == status::CHANNEL_PRESSURE
    }

    pub fn is_program_change(&self) -> bool {
        self.kind() == status::PROGRAM_CHANGE
    }

    pub fn is_song_position_pointer(&self) -> bool {
        self.bytes[0] == status::SONG_POSITION
    }

    pub fn is_midi_start(&self) -> bool {
        self.bytes[0] == status::START
    }

    pub fn is_midi_continue(&self) -> bool {
        self.bytes[0] == status::CONTINUE
    }

    pub fn is_midi_stop(&self) -> bool {
        self.bytes[0] == status::STOP
    }

    pub fn note_number(&self) -> u8 {
        self.bytes[1]
    }

    pub fn velocity(&self) -> u8 {
        self.bytes[2]
    }

    pub fn controller_number(&self) -> u8 {
        self.bytes[1]
    }

    pub fn controller_value(&self) -> u8 {
        self.bytes[2]
    }

    pub fn after_touch_value(&self) -> u8 {
        self.bytes[2]
    }

    pub fn channel_pressure_value(&self) -> u8 {
        self.bytes[1]
    }

    pub fn program_change_number(&self) -> u8 {
        self.bytes[1]
    }

    pub fn pitch_wheel_value(&self) -> u16 {
        u16::from(self.bytes[1]) | (u16::from(self.bytes[2]) << 7)
    }

    pub fn song_position_midi_beat(&self) -> u16 {
        u16::from(self.bytes[1]) | (u16::from(self.bytes[2]) << 7)
    }
}

/// Parses `bytes`, dropping anything the filter does not let through.
pub fn parse_midi(bytes: &[u8], filter: &ChannelFilter) -> Option<MidiMessage> {
    let message = MidiMessage::from_bytes(bytes).ok()?;

    if filter.accepts(&message) {
        Some(message)
    } else {
        None
    }
}
