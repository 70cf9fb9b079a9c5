#![warn(nonstandard_style, rust_2018_idioms, future_incompatible)]
//! Correlates note-ons with their note-offs.
//!
//! Every incoming note-on gets a fresh 16-bit id, and the matching note-off
//! is stamped with the same id (and transpose amount) when it arrives.
//! Processors that generate their own notes register them here too, so
//! fades and choke messages can address any sounding note by id.

mod config;

pub use crate::config::HandlerConfig;

use bit_set::BitSet;
use hise_event::{
    EventType, HiseEvent, HiseEventBuffer, Skip, UnorderedStack, NUM_CHANNELS, NUM_NOTES,
};
use log::{debug, trace, warn};

/// Default size of the artificial note-on table.
pub const HISE_EVENT_ID_ARRAY_SIZE: usize = 16384;
/// How many note-ons on an already sounding key can be tracked at once.
pub const OVERLAP_STACK_SIZE: usize = 256;

/// Something that can be silenced together with the other members of its
/// choke group.
pub trait ChokeListener {
    /// 0 means the listener is not in any group.
    fn choke_group(&self) -> u32;

    /// Another member of the group started a note.
    fn choke_message_sent(&mut self, event: &HiseEvent);
}

impl<T: ChokeListener + ?Sized> ChokeListener for Box<T> {
    fn choke_group(&self) -> u32 {
        (**self).choke_group()
    }

    fn choke_message_sent(&mut self, event: &HiseEvent) {
        (**self).choke_message_sent(event)
    }
}

type NoteTable<T> = [[T; NUM_NOTES]; NUM_CHANNELS];

fn channel_index(channel: u8) -> usize {
    usize::from(channel).saturating_sub(1).min(NUM_CHANNELS - 1)
}

fn note_index(note_number: u8) -> usize {
    usize::from(note_number).min(NUM_NOTES - 1)
}

fn same_key(a: &HiseEvent, b: &HiseEvent) -> bool {
    a.channel() == b.channel() && a.note_number() == b.note_number()
}

pub struct EventIdHandler {
    real_note_on_events: Box<NoteTable<HiseEvent>>,
    last_artificial_event_ids: Box<NoteTable<u16>>,
    artificial_events: Box<[HiseEvent]>,
    current_event_id: u16,
    overlapping_note_ons: UnorderedStack<HiseEvent, OVERLAP_STACK_SIZE>,
    choke_listeners: BitSet,
}

impl Default for EventIdHandler {
    fn default() -> Self {
        EventIdHandler::new()
    }
}

impl EventIdHandler {
    pub fn new() -> EventIdHandler {
        EventIdHandler::with_config(HandlerConfig::new())
    }

    /// All allocation happens here; nothing afterwards touches the heap.
    pub fn with_config(config: HandlerConfig) -> EventIdHandler {
        EventIdHandler {
            real_note_on_events: Box::new([[HiseEvent::EMPTY; NUM_NOTES]; NUM_CHANNELS]),
            last_artificial_event_ids: Box::new([[0; NUM_NOTES]; NUM_CHANNELS]),
            artificial_events: vec![HiseEvent::EMPTY; config.slot_count()].into_boxed_slice(),
            current_event_id: config.first_id(),
            overlapping_note_ons: UnorderedStack::new(),
            choke_listeners: BitSet::new(),
        }
    }

    /// The id the next note-on will get.
    pub fn current_event_id(&self) -> u16 {
        self.current_event_id
    }

    fn next_event_id(&mut self) -> u16 {
        let id = self.current_event_id;

        self.current_event_id = match self.current_event_id.wrapping_add(1) {
            0 => 1,
            next => next,
        };

        id
    }

    fn artificial_slot(&self, event_id: u16) -> usize {
        usize::from(event_id) & (self.artificial_events.len() - 1)
    }

    /// Stamps ids on every note-on and note-off in `buffer`, in buffer order.
    ///
    /// Run once per block on incoming events, before anything artificial has
    /// been added. Note-offs without an open note-on get id 0 and are marked
    /// ignored.
    pub fn handle_event_ids(&mut self, buffer: &mut HiseEventBuffer) {
        let mut cursor = buffer.cursor_mut();

        while let Some(event) = cursor.next_event_mut(Skip::empty()) {
            debug_assert!(!event.is_artificial());

            match event.event_type() {
                EventType::AllNotesOff => self.forget_real_note_ons(),
                EventType::NoteOn => self.register_note_on(event),
                EventType::NoteOff => self.resolve_note_off(event),
                _ => {}
            }
        }
    }

    fn register_note_on(&mut self, event: &mut HiseEvent) {
        let id = self.next_event_id();
        event.set_event_id(id);

        let slot = &mut self.real_note_on_events[channel_index(event.channel())]
            [note_index(event.note_number())];

        if slot.is_empty() {
            *slot = *event;
        } else if !self.overlapping_note_ons.insert_without_search(*event) {
            warn!("too many overlapping note-ons, {} will not be resolved", event);
        }
    }

    fn resolve_note_off(&mut self, event: &mut HiseEvent) {
        let slot = &mut self.real_note_on_events[channel_index(event.channel())]
            [note_index(event.note_number())];

        let note_on = if slot.is_empty() {
            self.overlapping_note_ons
                .remove_first_where(|on| same_key(on, event))
        } else {
            Some(std::mem::take(slot))
        };

        match note_on {
            Some(on) => {
                event.set_event_id(on.event_id());
                event.set_transpose_amount(on.transpose_amount());
            }
            None => {
                debug!("note-off without a matching note-on: {}", event);
                event.set_event_id(0);
                event.ignore_event(true);
            }
        }
    }

    fn forget_real_note_ons(&mut self) {
        for channel in self.real_note_on_events.iter_mut() {
            HiseEvent::clear_all(channel);
        }

        self.overlapping_note_ons.clear();
    }

    /// Looks up the id a note-off should carry without changing any state.
    ///
    /// Returns 0 if a real note-off has no open note-on.
    pub fn get_event_id_for_note_off(&self, note_off: &HiseEvent) -> u16 {
        debug_assert!(note_off.is_note_off());

        let channel = channel_index(note_off.channel());
        let note = note_index(note_off.note_number());

        if note_off.is_artificial() {
            return match note_off.event_id() {
                0 => self.last_artificial_event_ids[channel][note],
                id => id,
            };
        }

        let slot = &self.real_note_on_events[channel][note];

        if !slot.is_empty() {
            return slot.event_id();
        }

        self.overlapping_note_ons
            .iter()
            .find(|on| same_key(on, note_off))
            .map_or(0, HiseEvent::event_id)
    }

    /// Registers a note-on generated inside the engine. It is marked
    /// artificial and gets the next id from the shared counter.
    pub fn push_artificial_note_on(&mut self, note_on: &mut HiseEvent) {
        debug_assert!(note_on.is_note_on());

        note_on.set_artificial();
        let id = self.next_event_id();
        note_on.set_event_id(id);

        self.store_artificial_note_on(note_on);
    }

    /// Puts back an artificial note-on that was popped earlier, keeping its id.
    pub fn reinsert_artificial_note_on(&mut self, note_on: &HiseEvent) {
        debug_assert!(note_on.is_note_on());
        debug_assert!(note_on.is_artificial());
        debug_assert!(note_on.event_id() != 0);

        self.store_artificial_note_on(note_on);
    }

    fn store_artificial_note_on(&mut self, note_on: &HiseEvent) {
        let slot = self.artificial_slot(note_on.event_id());
        self.artificial_events[slot] = *note_on;

        self.last_artificial_event_ids[channel_index(note_on.channel())]
            [note_index(note_on.note_number())] = note_on.event_id();
    }

    /// Returns the note-on that started `event_id`, or an empty event.
    ///
    /// Only artificial note-ons are removed. A real note-on is returned as a
    /// copy and stays open, so this does not end it: its note-off still
    /// resolves to the same id, and a second call returns it again.
    pub fn pop_note_on_from_event_id(&mut self, event_id: u16) -> HiseEvent {
        if event_id == 0 {
            return HiseEvent::EMPTY;
        }

        if self.is_artificial_event_id(event_id) {
            let slot = self.artificial_slot(event_id);
            return std::mem::take(&mut self.artificial_events[slot]);
        }

        self.real_note_ons()
            .find(|on| on.event_id() == event_id)
            .copied()
            .unwrap_or(HiseEvent::EMPTY)
    }

    fn real_note_ons(&self) -> impl Iterator<Item = &HiseEvent> + '_ {
        self.real_note_on_events
            .iter()
            .flatten()
            .filter(|on| !on.is_empty())
            .chain(self.overlapping_note_ons.iter())
    }

    pub fn is_artificial_event_id(&self, event_id: u16) -> bool {
        let stored = &self.artificial_events[self.artificial_slot(event_id)];
        !stored.is_empty() && stored.event_id() == event_id
    }

    /// Forgets every open note, real and artificial. The id counter keeps
    /// counting and choke listeners stay registered.
    pub fn reset(&mut self) {
        self.forget_real_note_ons();
        HiseEvent::clear_all(&mut self.artificial_events);

        for channel in self.last_artificial_event_ids.iter_mut() {
            channel.fill(0);
        }
    }

    /// Registers the listener at `index`. Returns `false` if it already was.
    pub fn add_choke_listener(&mut self, index: usize) -> bool {
        let added = self.choke_listeners.insert(index);

        if added {
            debug!("choke listener {} registered", index);
        }

        added
    }

    pub fn remove_choke_listener(&mut self, index: usize) -> bool {
        let removed = self.choke_listeners.remove(index);

        if removed {
            debug!("choke listener {} removed", index);
        }

        removed
    }

    pub fn is_choke_listener(&self, index: usize) -> bool {
        self.choke_listeners.contains(index)
    }

    /// Tells every registered listener sharing the source's choke group,
    /// except the source itself, that `event` was started. Returns how many
    /// listeners were notified.
    pub fn send_choke_message<L: ChokeListener>(
        &self,
        listeners: &mut [L],
        source: usize,
        event: &HiseEvent,
    ) -> usize {
        let group = match listeners.get(source) {
            Some(listener) => listener.choke_group(),
            None => return 0,
        };

        if group == 0 {
            return 0;
        }

        let mut num_notified = 0;

        for index in self.choke_listeners.iter() {
            if index == source {
                continue;
            }

            if let Some(listener) = listeners.get_mut(index) {
                if listener.choke_group() == group {
                    listener.choke_message_sent(event);
                    num_notified += 1;
                }
            }
        }

        trace!("choke group {}: notified {} listeners", group, num_notified);
        num_notified
    }
}
