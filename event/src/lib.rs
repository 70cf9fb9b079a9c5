#![warn(nonstandard_style, rust_2018_idioms, future_incompatible)]
//! The real-time event model: a fixed-size event record, an ordered event
//! buffer with cursors, and the small stacks voices use to track notes.

pub mod buffer;
pub mod event;
pub mod stack;
pub mod utils;

pub use crate::buffer::{
    EventIterator, EventIteratorMut, HiseEventBuffer, Skip, HISE_EVENT_BUFFER_SIZE,
};
pub use crate::event::{
    ConversionError, EventFlags, EventType, HiseEvent, AFTERTOUCH_CC_NUMBER, PITCH_WHEEL_CC_NUMBER,
};
pub use crate::stack::{EventStack, UnorderedStack, EVENT_STACK_SIZE};
pub use crate::utils::{run_split_at_raster, SubBlock};

/// Number of MIDI channels tracked per table.
pub const NUM_CHANNELS: usize = 16;
/// Number of note numbers tracked per channel.
pub const NUM_NOTES: usize = 128;
