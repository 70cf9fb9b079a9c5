use std::ops::Index;

use smallvec::SmallVec;

use crate::event::HiseEvent;

pub const EVENT_STACK_SIZE: usize = 16;

type StackStorage = SmallVec<[HiseEvent; EVENT_STACK_SIZE]>;

/// A small LIFO of events, typically the note-ons a voice is holding.
///
/// Pushing onto a full stack overwrites the top slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventStack {
    data: StackStorage,
}

impl EventStack {
    pub fn new() -> EventStack {
        EventStack {
            data: SmallVec::new(),
        }
    }

    pub fn push(&mut self, event: HiseEvent) {
        if self.data.len() == EVENT_STACK_SIZE {
            self.data[EVENT_STACK_SIZE - 1] = event;
        } else {
            self.data.push(event);
        }
    }

    /// Removes the top event, or returns an empty event if there is none.
    pub fn pop(&mut self) -> HiseEvent {
        self.data.pop().unwrap_or(HiseEvent::EMPTY)
    }

    pub fn peek(&self) -> Option<&HiseEvent> {
        self.data.last()
    }

    pub fn peek_mut(&mut self) -> Option<&mut HiseEvent> {
        self.data.last_mut()
    }

    /// First event (from the bottom) carrying `event_id`.
    pub fn peek_note_on_for_event_id(&self, event_id: u16) -> Option<HiseEvent> {
        self.data
            .iter()
            .find(|e| e.event_id() == event_id)
            .copied()
    }

    /// Like `peek_note_on_for_event_id`, but removes the match. The events
    /// above it move down one slot.
    pub fn pop_note_on_for_event_id(&mut self, event_id: u16) -> Option<HiseEvent> {
        let index = self.data.iter().position(|e| e.event_id() == event_id)?;
        Some(self.data.remove(index))
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn num_used(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Fixed-capacity set without ordering guarantees.
///
/// Elements live inline and removal swaps in the last element, so every
/// operation is allocation free. A full stack rejects new elements.
#[derive(Debug, Clone)]
pub struct UnorderedStack<T, const N: usize> {
    data: SmallVec<[T; N]>,
}

impl<T, const N: usize> Default for UnorderedStack<T, N> {
    fn default() -> Self {
        UnorderedStack {
            data: SmallVec::new(),
        }
    }
}

impl<T, const N: usize> UnorderedStack<T, N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.data.len() == N
    }

    /// Appends without checking for duplicates.
    pub fn insert_without_search(&mut self, element: T) -> bool {
        if self.is_full() {
            return false;
        }

        self.data.push(element);
        true
    }

    /// Removes the element at `index`; the last element takes its place.
    pub fn remove_element(&mut self, index: usize) -> Option<T> {
        if index < self.data.len() {
            Some(self.data.swap_remove(index))
        } else {
            None
        }
    }

    /// Removes the first element matching `predicate`.
    pub fn remove_first_where<F>(&mut self, predicate: F) -> Option<T>
    where
        F: FnMut(&T) -> bool,
    {
        let index = self.data.iter().position(predicate)?;
        self.remove_element(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl<T: PartialEq, const N: usize> UnorderedStack<T, N> {
    pub fn contains(&self, element: &T) -> bool {
        self.data.contains(element)
    }

    /// Inserts `element` unless an equal one is already present. Returns
    /// `false` if nothing was added.
    pub fn insert(&mut self, element: T) -> bool {
        if self.contains(&element) {
            return false;
        }

        self.insert_without_search(element)
    }

    pub fn remove(&mut self, element: &T) -> bool {
        self.remove_first_where(|e| e == element).is_some()
    }
}

impl<T, const N: usize> Index<usize> for UnorderedStack<T, N> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.data[index]
    }
}

impl<'a, T, const N: usize> IntoIterator for &'a UnorderedStack<T, N> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
