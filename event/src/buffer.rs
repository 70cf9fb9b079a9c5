use std::fmt;
use std::ops::Index;

use bitflags::bitflags;
use hise_midi::MidiMessage;
use log::warn;

use crate::event::HiseEvent;

/// Number of events a `HiseEventBuffer` can hold.
pub const HISE_EVENT_BUFFER_SIZE: usize = 256;

bitflags! {
    /// Which events a cursor steps over.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Skip: u8 {
        const IGNORED = 1 << 0;
        const ARTIFICIAL = 1 << 1;
    }
}

impl Skip {
    fn skips(self, event: &HiseEvent) -> bool {
        (self.contains(Skip::IGNORED) && event.is_ignored())
            || (self.contains(Skip::ARTIFICIAL) && event.is_artificial())
    }
}

/// A fixed-capacity, timestamp-ordered list of events.
///
/// The storage lives inline, so nothing here allocates. Slots past
/// `num_used` are always empty events. When the buffer is full, further
/// events are dropped and a warning is logged.
#[derive(Clone)]
pub struct HiseEventBuffer {
    buffer: [HiseEvent; HISE_EVENT_BUFFER_SIZE],
    num_used: usize,
}

impl Default for HiseEventBuffer {
    fn default() -> HiseEventBuffer {
        HiseEventBuffer::new()
    }
}

impl PartialEq for HiseEventBuffer {
    fn eq(&self, other: &HiseEventBuffer) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for HiseEventBuffer {}

impl fmt::Debug for HiseEventBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl HiseEventBuffer {
    pub const fn new() -> HiseEventBuffer {
        HiseEventBuffer {
            buffer: [HiseEvent::EMPTY; HISE_EVENT_BUFFER_SIZE],
            num_used: 0,
        }
    }

    pub fn clear(&mut self) {
        HiseEvent::clear_all(&mut self.buffer[..self.num_used]);
        self.num_used = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.num_used == 0
    }

    pub fn len(&self) -> usize {
        self.num_used
    }

    pub fn num_used(&self) -> usize {
        self.num_used
    }

    pub fn is_full(&self) -> bool {
        self.num_used == HISE_EVENT_BUFFER_SIZE
    }

    pub fn as_slice(&self) -> &[HiseEvent] {
        &self.buffer[..self.num_used]
    }

    /// Mutable access to the used events. Changing timestamps through this
    /// can break the ordering; call `sort_timestamps` afterwards.
    pub fn as_mut_slice(&mut self) -> &mut [HiseEvent] {
        &mut self.buffer[..self.num_used]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HiseEvent> {
        self.as_slice().iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, HiseEvent> {
        self.as_mut_slice().iter_mut()
    }

    pub fn cursor(&self) -> EventIterator<'_> {
        EventIterator {
            buffer: self,
            index: 0,
            skip: Skip::empty(),
        }
    }

    pub fn cursor_mut(&mut self) -> EventIteratorMut<'_> {
        EventIteratorMut {
            buffer: self,
            index: 0,
        }
    }

    /// Inserts `event` after every event with a timestamp less than or equal
    /// to its own, so events sharing a timestamp keep their arrival order.
    /// Returns `false` if the buffer is full.
    pub fn add_event(&mut self, event: HiseEvent) -> bool {
        let added = self.insert_sorted(event);

        if !added {
            warn!("event buffer full, dropping {}", event);
        }

        added
    }

    fn insert_sorted(&mut self, event: HiseEvent) -> bool {
        if self.is_full() {
            return false;
        }

        let timestamp = event.time_stamp();
        let mut position = self.num_used;

        while position > 0 && self.buffer[position - 1].time_stamp() > timestamp {
            position -= 1;
        }

        self.insert_event_at_position(event, position);
        true
    }

    fn insert_event_at_position(&mut self, event: HiseEvent, position: usize) {
        debug_assert!(position <= self.num_used);
        debug_assert!(self.num_used < HISE_EVENT_BUFFER_SIZE);

        self.buffer.copy_within(position..self.num_used, position + 1);
        self.buffer[position] = event;
        self.num_used += 1;
    }

    /// Converts `message` and inserts it at `sample_number`. Messages without
    /// an event equivalent are skipped.
    pub fn add_midi_event(&mut self, message: &MidiMessage, sample_number: u32) -> bool {
        let mut event = HiseEvent::from_midi(message);

        if event.is_empty() {
            return false;
        }

        event.set_time_stamp(sample_number);
        self.add_event(event)
    }

    /// Appends a block of timestamped MIDI messages without sorting, the way
    /// a host hands them over. Returns how many events were added.
    pub fn add_midi_events<I>(&mut self, messages: I) -> usize
    where
        I: IntoIterator<Item = (u32, MidiMessage)>,
    {
        let mut num_added = 0;

        for (sample_number, message) in messages {
            let mut event = HiseEvent::from_midi(&message);

            if event.is_empty() {
                continue;
            }

            if self.is_full() {
                warn!("event buffer full, dropping the rest of the MIDI block");
                break;
            }

            event.set_time_stamp(sample_number);
            self.buffer[self.num_used] = event;
            self.num_used += 1;
            num_added += 1;
        }

        num_added
    }

    /// Appends every event of `other` without sorting.
    pub fn add_events(&mut self, other: &HiseEventBuffer) -> usize {
        let free = HISE_EVENT_BUFFER_SIZE - self.num_used;
        let num_to_copy = other.num_used.min(free);

        if num_to_copy < other.num_used {
            warn!(
                "event buffer full, dropping {} events",
                other.num_used - num_to_copy
            );
        }

        self.buffer[self.num_used..self.num_used + num_to_copy]
            .copy_from_slice(&other.buffer[..num_to_copy]);
        self.num_used += num_to_copy;

        num_to_copy
    }

    /// Makes this buffer an exact copy of `other`.
    pub fn copy_from(&mut self, other: &HiseEventBuffer) {
        if other.num_used < self.num_used {
            HiseEvent::clear_all(&mut self.buffer[other.num_used..self.num_used]);
        }

        self.buffer[..other.num_used].copy_from_slice(other.as_slice());
        self.num_used = other.num_used;
    }

    /// Returns the event at `index`, or an empty event if the slot is unused.
    pub fn get_event(&self, index: usize) -> HiseEvent {
        self.as_slice()
            .get(index)
            .copied()
            .unwrap_or(HiseEvent::EMPTY)
    }

    /// Removes the event at `index` and closes the gap.
    pub fn pop_event(&mut self, index: usize) -> HiseEvent {
        if index >= self.num_used {
            return HiseEvent::EMPTY;
        }

        let event = self.buffer[index];

        self.buffer.copy_within(index + 1..self.num_used, index);
        self.num_used -= 1;
        self.buffer[self.num_used] = HiseEvent::EMPTY;

        event
    }

    /// Stable in-place sort by timestamp.
    pub fn sort_timestamps(&mut self) {
        let events = self.as_mut_slice();

        for i in 1..events.len() {
            let mut j = i;

            while j > 0 && events[j - 1].time_stamp() > events[j].time_stamp() {
                events.swap(j - 1, j);
                j -= 1;
            }
        }
    }

    pub fn time_stamps_are_sorted(&self) -> bool {
        self.as_slice()
            .windows(2)
            .all(|pair| pair[0].time_stamp() <= pair[1].time_stamp())
    }

    pub fn min_time_stamp(&self) -> Option<u32> {
        self.iter().map(HiseEvent::time_stamp).min()
    }

    pub fn max_time_stamp(&self) -> Option<u32> {
        self.iter().map(HiseEvent::time_stamp).max()
    }

    /// Shifts every timestamp back by `delta`, stopping at 0.
    pub fn subtract_from_time_stamps(&mut self, delta: u32) {
        for event in self.iter_mut() {
            event.set_time_stamp(event.time_stamp().saturating_sub(delta));
        }
    }

    pub fn multiply_timestamps(&mut self, factor: u32) {
        for event in self.iter_mut() {
            event.set_time_stamp(event.time_stamp().saturating_mul(factor));
        }
    }

    pub fn align_events_to_raster<const ALIGNMENT: u32>(&mut self, max_timestamp: u32) {
        for event in self.iter_mut() {
            event.align_to_raster::<ALIGNMENT>(max_timestamp);
        }
    }

    /// Moves every event with a timestamp below `highest_timestamp` into
    /// `target`. Both buffers keep their relative order. If `target` fills
    /// up, the remaining events stay in `self`.
    pub fn move_events_below(&mut self, target: &mut HiseEventBuffer, highest_timestamp: u32) {
        self.move_events_where(target, |timestamp| timestamp < highest_timestamp);
    }

    /// Moves every event with a timestamp of at least `lowest_timestamp`
    /// into `target`.
    pub fn move_events_above(&mut self, target: &mut HiseEventBuffer, lowest_timestamp: u32) {
        self.move_events_where(target, |timestamp| timestamp >= lowest_timestamp);
    }

    fn move_events_where<F>(&mut self, target: &mut HiseEventBuffer, should_move: F)
    where
        F: Fn(u32) -> bool,
    {
        let mut num_kept = 0;
        let mut num_left_behind = 0;

        for i in 0..self.num_used {
            let event = self.buffer[i];

            if should_move(event.time_stamp()) {
                if target.insert_sorted(event) {
                    continue;
                }

                num_left_behind += 1;
            }

            self.buffer[num_kept] = event;
            num_kept += 1;
        }

        if num_left_behind > 0 {
            warn!(
                "target event buffer full, {} events stay in the source",
                num_left_behind
            );
        }

        HiseEvent::clear_all(&mut self.buffer[num_kept..self.num_used]);
        self.num_used = num_kept;
    }
}

impl Index<usize> for HiseEventBuffer {
    type Output = HiseEvent;

    fn index(&self, index: usize) -> &HiseEvent {
        &self.as_slice()[index]
    }
}

impl<'a> IntoIterator for &'a HiseEventBuffer {
    type Item = &'a HiseEvent;
    type IntoIter = std::slice::Iter<'a, HiseEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Read cursor over a buffer.
///
/// Each call can pass its own skip mask. Used as a std `Iterator`, it skips
/// whatever was set with [`EventIterator::skipping`].
pub struct EventIterator<'a> {
    buffer: &'a HiseEventBuffer,
    index: usize,
    skip: Skip,
}

impl<'a> EventIterator<'a> {
    pub fn skipping(mut self, skip: Skip) -> EventIterator<'a> {
        self.skip = skip;
        self
    }

    pub fn next_event_ref(&mut self, skip: Skip) -> Option<&'a HiseEvent> {
        let events = self.buffer.as_slice();

        while let Some(event) = events.get(self.index) {
            self.index += 1;

            if !skip.skips(event) {
                return Some(event);
            }
        }

        None
    }

    /// Returns a copy of the next event together with its sample position.
    pub fn next_event(&mut self, skip: Skip) -> Option<(HiseEvent, u32)> {
        self.next_event_ref(skip)
            .map(|event| (*event, event.time_stamp()))
    }
}

impl<'a> Iterator for EventIterator<'a> {
    type Item = &'a HiseEvent;

    fn next(&mut self) -> Option<&'a HiseEvent> {
        let skip = self.skip;
        self.next_event_ref(skip)
    }
}

/// Write cursor over a buffer. Each returned reference must be dropped before
/// the cursor advances, so flags can be changed in place while walking.
pub struct EventIteratorMut<'a> {
    buffer: &'a mut HiseEventBuffer,
    index: usize,
}

impl EventIteratorMut<'_> {
    pub fn next_event_mut(&mut self, skip: Skip) -> Option<&mut HiseEvent> {
        let num_used = self.buffer.num_used;

        while self.index < num_used {
            let index = self.index;
            self.index += 1;

            if !skip.skips(&self.buffer.buffer[index]) {
                return Some(&mut self.buffer.buffer[index]);
            }
        }

        None
    }
}
