//! The fixed-size event record that flows through the audio path.
//!
//! `HiseEvent` extends a MIDI message with everything the engine needs to
//! track a voice over its lifetime: an event id shared by a note-on and its
//! note-off, a sample timestamp, a transpose amount that is kept apart from
//! the note number, detune and gain trims, and a couple of state flags.
//! It owns no heap memory, so copying or clearing one is a plain byte copy.

use std::fmt;

use bitflags::bitflags;
use hise_midi::{MidiError, MidiMessage};
use hise_pitch::{decibels_to_gain, pitch_factor_from_semitones, EqualTemperament, Scale};
use thiserror::Error;

/// Pseudo controller number reported for pitch-bend events.
pub const PITCH_WHEEL_CC_NUMBER: u8 = 128;
/// Pseudo controller number reported for aftertouch events.
pub const AFTERTOUCH_CC_NUMBER: u8 = 129;

const MIN_GAIN_DB: i32 = -100;
const MAX_GAIN_DB: i32 = 36;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// The all-zero event. Downstream code treats it as a no-op.
    Empty = 0,
    NoteOn,
    NoteOff,
    Controller,
    PitchBend,
    /// Both polyphonic and channel aftertouch.
    Aftertouch,
    AllNotesOff,
    SongPosition,
    MidiStart,
    MidiStop,
    /// Fades the gain of every voice started by `event_id`.
    VolumeFade,
    /// Fades the pitch of every voice started by `event_id`.
    PitchFade,
    /// Fires a timer callback; the timer slot lives in the channel field.
    TimerEvent,
    ProgramChange,
}

impl EventType {
    pub const ALL: [EventType; 14] = [
        EventType::Empty,
        EventType::NoteOn,
        EventType::NoteOff,
        EventType::Controller,
        EventType::PitchBend,
        EventType::Aftertouch,
        EventType::AllNotesOff,
        EventType::SongPosition,
        EventType::MidiStart,
        EventType::MidiStop,
        EventType::VolumeFade,
        EventType::PitchFade,
        EventType::TimerEvent,
        EventType::ProgramChange,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Empty => "Empty",
            EventType::NoteOn => "NoteOn",
            EventType::NoteOff => "NoteOff",
            EventType::Controller => "Controller",
            EventType::PitchBend => "PitchBend",
            EventType::Aftertouch => "Aftertouch",
            EventType::AllNotesOff => "AllNotesOff",
            EventType::SongPosition => "SongPosition",
            EventType::MidiStart => "MidiStart",
            EventType::MidiStop => "MidiStop",
            EventType::VolumeFade => "VolumeFade",
            EventType::PitchFade => "PitchFade",
            EventType::TimerEvent => "TimerEvent",
            EventType::ProgramChange => "ProgramChange",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// State bits carried next to the event data.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventFlags: u8 {
        /// Processed but suppressed: consumers skip it, buffers keep it.
        const IGNORED = 1 << 0;
        /// Created inside the engine rather than received as MIDI input.
        const ARTIFICIAL = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("{0} events have no MIDI equivalent")]
    NoMidiEquivalent(EventType),
    #[error(transparent)]
    Midi(#[from] MidiError),
}

/// One real-time event.
///
/// Equality is field-wise, so two events compare equal only if they are
/// bit-identical. Use [`HiseEvent::matches_midi_data`] for the looser check.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HiseEvent {
    event_type: EventType,
    channel: u8,
    number: u8,
    value: u8,

    transpose_value: i8,
    gain: i8,
    semitones: i8,
    cents: i8,

    event_id: u16,
    start_offset: u16,

    timestamp: u32,
    flags: EventFlags,
}

impl Default for HiseEvent {
    fn default() -> HiseEvent {
        HiseEvent::EMPTY
    }
}

impl HiseEvent {
    /// The all-zero event.
    pub const EMPTY: HiseEvent = HiseEvent {
        event_type: EventType::Empty,
        channel: 0,
        number: 0,
        value: 0,
        transpose_value: 0,
        gain: 0,
        semitones: 0,
        cents: 0,
        event_id: 0,
        start_offset: 0,
        timestamp: 0,
        flags: EventFlags::empty(),
    };

    /// Creates a raw event. Everything else (transpose, detune, gain,
    /// timestamp, id, flags) starts out neutral.
    pub const fn new(event_type: EventType, number: u8, value: u8, channel: u8) -> HiseEvent {
        HiseEvent {
            event_type,
            channel,
            number,
            value,
            ..HiseEvent::EMPTY
        }
    }

    pub const fn note_on(channel: u8, number: u8, velocity: u8) -> HiseEvent {
        HiseEvent::new(EventType::NoteOn, number, velocity, channel)
    }

    pub const fn note_off(channel: u8, number: u8, velocity: u8) -> HiseEvent {
        HiseEvent::new(EventType::NoteOff, number, velocity, channel)
    }

    pub const fn controller(channel: u8, number: u8, value: u8) -> HiseEvent {
        HiseEvent::new(EventType::Controller, number, value, channel)
    }

    /// Converts a transport-level message. Messages without an equivalent
    /// (song select, clock, ...) become [`HiseEvent::EMPTY`].
    pub fn from_midi(message: &MidiMessage) -> HiseEvent {
        let (event_type, number, value) = if message.is_note_on() {
            (EventType::NoteOn, message.note_number(), message.velocity())
        } else if message.is_note_off() {
            (EventType::NoteOff, message.note_number(), message.velocity())
        } else if message.is_pitch_wheel() {
            let position = message.pitch_wheel_value();
            (
                EventType::PitchBend,
                (position & 0x7F) as u8,
                (position >> 7) as u8,
            )
        } else if message.is_all_notes_off() || message.is_all_sound_off() {
            (
                EventType::AllNotesOff,
                message.controller_number(),
                message.controller_value(),
            )
        } else if message.is_controller() {
            (
                EventType::Controller,
                message.controller_number(),
                message.controller_value(),
            )
        } else if message.is_aftertouch() {
            (
                EventType::Aftertouch,
                message.note_number(),
                message.after_touch_value(),
            )
        } else if message.is_channel_pressure() {
            (EventType::Aftertouch, 0, message.channel_pressure_value())
        } else if message.is_program_change() {
            (EventType::ProgramChange, message.program_change_number(), 0)
        } else if message.is_song_position_pointer() {
            let beat = message.song_position_midi_beat();
            (
                EventType::SongPosition,
                (beat & 0x7F) as u8,
                (beat >> 7) as u8,
            )
        } else if message.is_midi_start() || message.is_midi_continue() {
            (EventType::MidiStart, 0, 0)
        } else if message.is_midi_stop() {
            (EventType::MidiStop, 0, 0)
        } else {
            return HiseEvent::EMPTY;
        };

        HiseEvent::new(event_type, number, value, message.channel())
    }

    /// Converts back to a MIDI message. Note numbers include the transpose
    /// amount. This is lossy: detune, gain, ids and timestamps are dropped,
    /// and every `Aftertouch` event becomes polyphonic aftertouch, so channel
    /// pressure comes back as aftertouch on note 0.
    pub fn to_midi_message(&self) -> Result<MidiMessage, ConversionError> {
        let channel = self.channel;

        let message = match self.event_type {
            EventType::NoteOn => {
                MidiMessage::note_on(channel, self.transposed_note_number(), self.value)?
            }
            EventType::NoteOff => {
                MidiMessage::note_off(channel, self.transposed_note_number(), self.value)?
            }
            EventType::Controller => MidiMessage::controller(channel, self.number, self.value)?,
            EventType::PitchBend => MidiMessage::pitch_wheel(channel, self.pitch_wheel_value())?,
            EventType::Aftertouch => MidiMessage::aftertouch(channel, self.number, self.value)?,
            EventType::ProgramChange => MidiMessage::program_change(channel, self.number)?,
            EventType::AllNotesOff => MidiMessage::all_notes_off(channel)?,
            EventType::SongPosition => MidiMessage::song_position(self.song_position_midi_beat()),
            EventType::MidiStart => MidiMessage::midi_start(),
            EventType::MidiStop => MidiMessage::midi_stop(),
            unsupported @ (EventType::Empty
            | EventType::VolumeFade
            | EventType::PitchFade
            | EventType::TimerEvent) => {
                return Err(ConversionError::NoMidiEquivalent(unsupported))
            }
        };

        Ok(message)
    }

    fn transposed_note_number(&self) -> u8 {
        self.note_number_including_transpose_amount().clamp(0, 127) as u8
    }

    pub fn clear(&mut self) {
        *self = HiseEvent::EMPTY;
    }

    /// Clears a whole run of events in one go.
    pub fn clear_all(events: &mut [HiseEvent]) {
        events.fill(HiseEvent::EMPTY);
    }

    pub fn swap_with(&mut self, other: &mut HiseEvent) {
        std::mem::swap(self, other);
    }

    pub fn is_empty(&self) -> bool {
        self.event_type == EventType::Empty
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Changes the type without touching any other field.
    pub fn set_type(&mut self, event_type: EventType) {
        self.event_type = event_type;
    }

    pub fn type_as_str(&self) -> &'static str {
        self.event_type.as_str()
    }

    pub fn flags(&self) -> EventFlags {
        self.flags
    }

    pub fn is_ignored(&self) -> bool {
        self.flags.contains(EventFlags::IGNORED)
    }

    /// Ignored events stay in their buffer but are skipped by consumers.
    pub fn ignore_event(&mut self, should_be_ignored: bool) {
        self.flags.set(EventFlags::IGNORED, should_be_ignored);
    }

    pub fn set_artificial(&mut self) {
        self.flags.insert(EventFlags::ARTIFICIAL);
    }

    pub fn is_artificial(&self) -> bool {
        self.flags.contains(EventFlags::ARTIFICIAL)
    }

    /// 0 means no id has been assigned. Ids wrap at 65536, so a larger id
    /// does not imply a younger note.
    pub fn event_id(&self) -> u16 {
        self.event_id
    }

    pub fn set_event_id(&mut self, event_id: u16) {
        self.event_id = event_id;
    }

    pub fn transpose_amount(&self) -> i8 {
        self.transpose_value
    }

    /// Transposes the event without changing its note number, so the
    /// matching note-off keeps resolving against the original key.
    pub fn set_transpose_amount(&mut self, semitones: i8) {
        self.transpose_value = semitones;
    }

    pub fn note_number_including_transpose_amount(&self) -> i32 {
        i32::from(self.number) + i32::from(self.transpose_value)
    }

    pub fn coarse_detune(&self) -> i8 {
        self.semitones
    }

    pub fn set_coarse_detune(&mut self, semitones: i8) {
        self.semitones = semitones;
    }

    pub fn fine_detune(&self) -> i8 {
        self.cents
    }

    pub fn set_fine_detune(&mut self, cents: i8) {
        self.cents = cents;
    }

    /// Frequency ratio of the coarse and fine detune.
    pub fn pitch_factor(&self) -> f64 {
        if self.semitones == 0 && self.cents == 0 {
            return 1.0;
        }

        let detune = f64::from(self.semitones) + f64::from(self.cents) / 100.0;
        pitch_factor_from_semitones(detune)
    }

    /// Frequency in Hz including transpose and detune (A4 = 440 Hz).
    pub fn frequency(&self) -> f64 {
        let note = f64::from(self.note_number_including_transpose_amount());
        EqualTemperament::default().to_frequency(note) * self.pitch_factor()
    }

    /// Gain trim in decibels, clamped to -100..=36.
    pub fn set_gain(&mut self, decibels: i32) {
        self.gain = decibels.clamp(MIN_GAIN_DB, MAX_GAIN_DB) as i8;
    }

    pub fn gain(&self) -> i8 {
        self.gain
    }

    pub fn gain_factor(&self) -> f32 {
        decibels_to_gain(f32::from(self.gain))
    }

    pub fn create_volume_fade(event_id: u16, fade_time_ms: u16, target_decibels: i8) -> HiseEvent {
        let mut e = HiseEvent::new(EventType::VolumeFade, 0, 0, 1);
        e.set_event_id(event_id);
        e.set_gain(i32::from(target_decibels));
        e.set_fade_time(fade_time_ms);
        e.set_artificial();
        e
    }

    pub fn create_pitch_fade(
        event_id: u16,
        fade_time_ms: u16,
        coarse_semitones: i8,
        fine_cents: i8,
    ) -> HiseEvent {
        let mut e = HiseEvent::new(EventType::PitchFade, 0, 0, 1);
        e.set_event_id(event_id);
        e.set_coarse_detune(coarse_semitones);
        e.set_fine_detune(fine_cents);
        e.set_fade_time(fade_time_ms);
        e.set_artificial();
        e
    }

    pub fn create_timer_event(timer_index: u8, sample_offset: u32) -> HiseEvent {
        let mut e = HiseEvent::new(EventType::TimerEvent, 0, 0, timer_index);
        e.set_artificial();
        e.set_time_stamp(sample_offset);
        e
    }

    pub fn is_volume_fade(&self) -> bool {
        self.event_type == EventType::VolumeFade
    }

    pub fn is_pitch_fade(&self) -> bool {
        self.event_type == EventType::PitchFade
    }

    pub fn is_timer_event(&self) -> bool {
        self.event_type == EventType::TimerEvent
    }

    /// Fade length for volume and pitch fades (14 bits, milliseconds).
    pub fn fade_time(&self) -> u16 {
        self.pitch_wheel_value()
    }

    pub fn set_fade_time(&mut self, fade_time_ms: u16) {
        self.set_pitch_wheel_value(fade_time_ms);
    }

    pub fn timer_index(&self) -> u8 {
        self.channel
    }

    /// Compares type, channel, sounding note number and value. Timestamp,
    /// event id and flags are not taken into account.
    pub fn matches_midi_data(&self, other: &HiseEvent) -> bool {
        self.event_type == other.event_type
            && self.channel == other.channel
            && self.note_number_including_transpose_amount()
                == other.note_number_including_transpose_amount()
            && self.value == other.value
    }

    /// Sample offset from the start of the current block. Values past the
    /// block length schedule the event for a later block.
    pub fn time_stamp(&self) -> u32 {
        self.timestamp
    }

    pub fn set_time_stamp(&mut self, timestamp: u32) {
        self.timestamp = timestamp;
    }

    /// Moves the timestamp by `delta`, stopping at 0.
    pub fn add_to_time_stamp(&mut self, delta: i32) {
        self.timestamp = self.timestamp.saturating_add_signed(delta);
    }

    /// Snaps the timestamp to the nearest multiple of `ALIGNMENT` (ties round
    /// up). If that lands at or past `max_timestamp`, it steps back one raster.
    pub fn align_to_raster<const ALIGNMENT: u32>(&mut self, max_timestamp: u32) {
        debug_assert!(ALIGNMENT > 0);

        let odd = self.timestamp % ALIGNMENT;
        let mut aligned = self.timestamp - odd;

        if odd * 2 >= ALIGNMENT {
            aligned = aligned.saturating_add(ALIGNMENT);
        }

        if aligned >= max_timestamp {
            aligned = aligned.saturating_sub(ALIGNMENT);
        }

        self.timestamp = aligned;
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// There are 256 logical channels; only 1..=16 survive MIDI conversion.
    pub fn set_channel(&mut self, channel: u8) {
        self.channel = channel;
    }

    pub fn is_note_on(&self) -> bool {
        self.event_type == EventType::NoteOn
    }

    pub fn is_note_off(&self) -> bool {
        self.event_type == EventType::NoteOff
    }

    pub fn is_note_on_or_off(&self) -> bool {
        self.is_note_on() || self.is_note_off()
    }

    pub fn note_number(&self) -> u8 {
        self.number
    }

    pub fn set_note_number(&mut self, note_number: u8) {
        debug_assert!(self.is_note_on_or_off());
        self.number = note_number.min(127);
    }

    pub fn velocity(&self) -> u8 {
        self.value
    }

    pub fn float_velocity(&self) -> f32 {
        f32::from(self.value) / 127.0
    }

    pub fn set_velocity(&mut self, velocity: u8) {
        self.value = velocity;
    }

    pub fn is_pitch_wheel(&self) -> bool {
        self.event_type == EventType::PitchBend
    }

    pub fn pitch_wheel_value(&self) -> u16 {
        u16::from(self.number) | (u16::from(self.value) << 7)
    }

    pub fn set_pitch_wheel_value(&mut self, position: u16) {
        let position = position.min(0x3FFF);
        self.number = (position & 0x7F) as u8;
        self.value = (position >> 7) as u8;
    }

    /// Samples to skip when the voice starts (e.g. to jump past an attack).
    pub fn start_offset(&self) -> u16 {
        self.start_offset
    }

    pub fn set_start_offset(&mut self, start_offset: u16) {
        self.start_offset = start_offset;
    }

    pub fn is_channel_pressure(&self) -> bool {
        self.event_type == EventType::Aftertouch
    }

    pub fn channel_pressure_value(&self) -> u8 {
        self.value
    }

    pub fn set_channel_pressure_value(&mut self, pressure: u8) {
        self.value = pressure;
    }

    pub fn is_aftertouch(&self) -> bool {
        self.event_type == EventType::Aftertouch
    }

    pub fn after_touch_value(&self) -> u8 {
        self.value
    }

    pub fn set_after_touch_value(&mut self, note_number: u8, amount: u8) {
        self.number = note_number;
        self.value = amount;
    }

    pub fn is_controller(&self) -> bool {
        self.event_type == EventType::Controller
    }

    pub fn is_controller_of_type(&self, controller_number: u8) -> bool {
        self.is_controller() && self.number == controller_number
    }

    /// Pitch-bend and aftertouch report the pseudo numbers
    /// [`PITCH_WHEEL_CC_NUMBER`] and [`AFTERTOUCH_CC_NUMBER`].
    pub fn controller_number(&self) -> u8 {
        match self.event_type {
            EventType::PitchBend => PITCH_WHEEL_CC_NUMBER,
            EventType::Aftertouch => AFTERTOUCH_CC_NUMBER,
            _ => self.number,
        }
    }

    pub fn controller_value(&self) -> u8 {
        self.value
    }

    pub fn set_controller_number(&mut self, controller_number: u8) {
        self.number = controller_number;
    }

    pub fn set_controller_value(&mut self, value: u8) {
        self.value = value;
    }

    pub fn is_program_change(&self) -> bool {
        self.event_type == EventType::ProgramChange
    }

    pub fn program_change_number(&self) -> u8 {
        self.number
    }

    pub fn is_all_notes_off(&self) -> bool {
        self.event_type == EventType::AllNotesOff
    }

    pub fn is_midi_start(&self) -> bool {
        self.event_type == EventType::MidiStart
    }

    pub fn is_midi_stop(&self) -> bool {
        self.event_type == EventType::MidiStop
    }

    pub fn is_song_position_pointer(&self) -> bool {
        self.event_type == EventType::SongPosition
    }

    pub fn song_position_midi_beat(&self) -> u16 {
        self.pitch_wheel_value()
    }

    pub fn set_song_position_value(&mut self, position_in_midi_beats: u16) {
        self.set_pitch_wheel_value(position_in_midi_beats);
    }
}

impl From<&MidiMessage> for HiseEvent {
    fn from(message: &MidiMessage) -> HiseEvent {
        HiseEvent::from_midi(message)
    }
}

impl From<MidiMessage> for HiseEvent {
    fn from(message: MidiMessage) -> HiseEvent {
        HiseEvent::from_midi(&message)
    }
}

impl fmt::Display for HiseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, Number: {}, Value: {}, Channel: {}, Timestamp: {}, Event ID: {}",
            self.event_type,
            self.number,
            self.value,
            self.channel,
            self.timestamp,
            self.event_id
        )?;

        if self.is_artificial() {
            f.write_str(", artificial")?;
        }

        if self.is_ignored() {
            f.write_str(", ignored")?;
        }

        Ok(())
    }
}
