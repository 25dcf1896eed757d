//! # Sensor Channel Definitions
//!
//! The acquisition backend delivers one frame of `CHANNEL_COUNT` values per
//! poll, in a fixed order that matches the hardware's serial output. The
//! ordinals here are that wire order and must not be rearranged.

/// Number of sensor channels in every frame.
pub const CHANNEL_COUNT: usize = 7;

/// Identifier for one sensor channel, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    No2Multi,
    EthanolMulti,
    VocMulti,
    CoMulti,
    CoMics,
    EthanolMics,
    VocMics,
}

impl Channel {
    /// Stable name used in export headers and as the forwarding field key.
    pub fn name(&self) -> &'static str {
        match self {
            Channel::No2Multi => "NO2_multi",
            Channel::EthanolMulti => "C2H5OH_multi",
            Channel::VocMulti => "VOC_multi",
            Channel::CoMulti => "CO_multi",
            Channel::CoMics => "CO_mics",
            Channel::EthanolMics => "C2H5OH_mics",
            Channel::VocMics => "VOC_mics",
        }
    }

    /// Ordinal position of this channel within a frame.
    pub fn index(&self) -> usize {
        Channel::all().iter().position(|c| c == self).unwrap_or(0)
    }

    /// All channels in wire order.
    pub fn all() -> [Channel; CHANNEL_COUNT] {
        [
            Channel::No2Multi,
            Channel::EthanolMulti,
            Channel::VocMulti,
            Channel::CoMulti,
            Channel::CoMics,
            Channel::EthanolMics,
            Channel::VocMics,
        ]
    }

    /// Channel names in wire order, for export headers.
    pub fn names() -> Vec<&'static str> {
        Channel::all().iter().map(|c| c.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names_in_wire_order() {
        let names = Channel::names();
        assert_eq!(names.len(), CHANNEL_COUNT);
        assert_eq!(names[0], "NO2_multi");
        assert_eq!(names[3], "CO_multi");
        assert_eq!(names[6], "VOC_mics");
    }

    #[test]
    fn test_channel_index_matches_position() {
        for (i, channel) in Channel::all().iter().enumerate() {
            assert_eq!(channel.index(), i);
        }
    }
}
