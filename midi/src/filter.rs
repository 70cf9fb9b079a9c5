use crate::MidiMessage;

/// Which of the 16 MIDI channels a processor listens to.
///
/// System messages carry no channel and always pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelFilter {
    enable_all_channels: bool,
    active_channels: u16,
}

impl Default for ChannelFilter {
    fn default() -> ChannelFilter {
        ChannelFilter {
            enable_all_channels: true,
            active_channels: 0,
        }
    }
}

impl ChannelFilter {
    /// A filter that only lets the given 0-based channel indices through.
    pub fn only(channel_indices: &[usize]) -> ChannelFilter {
        let mut filter = ChannelFilter {
            enable_all_channels: false,
            active_channels: 0,
        };

        for &index in channel_indices {
            filter.set_enable_midi_channel(index, true);
        }

        filter
    }

    pub fn set_enable_all_channels(&mut self, should_be_enabled: bool) {
        self.enable_all_channels = should_be_enabled;
    }

    pub fn are_all_channels_enabled(&self) -> bool {
        self.enable_all_channels
    }

    /// Indices outside 0..16 are ignored.
    pub fn set_enable_midi_channel(&mut self, channel_index: usize, should_be_enabled: bool) {
        if channel_index >= 16 {
            return;
        }

        if should_be_enabled {
            self.active_channels |= 1 << channel_index;
        } else {
            self.active_channels &= !(1 << channel_index);
        }
    }

    pub fn is_channel_enabled(&self, channel_index: usize) -> bool {
        channel_index < 16 && self.active_channels & (1 << channel_index) != 0
    }

    pub fn accepts(&self, message: &MidiMessage) -> bool {
        match message.channel() {
            0 => true,
            _ if self.enable_all_channels => true,
            channel => self.is_channel_enabled(channel as usize - 1),
        }
    }

    /// Packs the filter as bit 0 = all channels, bit `i + 1` = channel index `i`.
    pub fn export_data(&self) -> u32 {
        u32::from(self.enable_all_channels) | (u32::from(self.active_channels) << 1)
    }

    pub fn restore_from_data(&mut self, data: u32) {
        self.enable_all_channels = data & 1 != 0;
        self.active_channels = ((data >> 1) & 0xFFFF) as u16;
    }
}
