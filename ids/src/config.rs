use crate::HISE_EVENT_ID_ARRAY_SIZE;

/// Construction-time settings for an `EventIdHandler`.
///
/// ```ignore
/// const CONFIG: HandlerConfig = HandlerConfig::new().with_artificial_event_slots(1024);
/// let handler = EventIdHandler::with_config(CONFIG);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerConfig {
    /// Size of the artificial note-on table. Rounded up to a power of two.
    pub artificial_event_slots: usize,

    /// Id handed to the first note-on. 0 is reserved and maps to 1.
    pub first_event_id: u16,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerConfig {
    pub const fn new() -> Self {
        Self {
            artificial_event_slots: HISE_EVENT_ID_ARRAY_SIZE,
            first_event_id: 1,
        }
    }

    pub const fn with_artificial_event_slots(mut self, slots: usize) -> Self {
        self.artificial_event_slots = slots;
        self
    }

    pub const fn with_first_event_id(mut self, event_id: u16) -> Self {
        self.first_event_id = event_id;
        self
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.artificial_event_slots.max(1).next_power_of_two()
    }

    pub(crate) fn first_id(&self) -> u16 {
        self.first_event_id.max(1)
    }
}
