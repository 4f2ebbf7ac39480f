use crate::frame_types::*;

#[inline]
/// Mini helper to check, whether a bit is set or not.
fn flag_is_set(data: u8, bit: u8) -> bool {
    data & (1 << bit) != 0
}

/// The very first two bytes of every frame contain the FrameControl header.
///
/// First byte:
///
/// - **bit_0-1**: Protocol version, always 0.
/// - **bit_2-3**: [FrameType]
/// - **bit_4-7**: [FrameSubType]
///
/// Second byte (Flags):
/// - **bit_0** `to_ds`
/// - **bit_1** `from_ds`
/// - **bit_2** `more_frag`
/// - **bit_3** `retry`
/// - **bit_4** `power_mgmt`
/// - **bit_5** `more_data`
/// - **bit_6** `protected`
/// - **bit_7** `order`
#[derive(Clone, Copy, Debug)]
pub struct FrameControl {
    pub protocol_version: u8,
    pub frame_type: FrameType,
    pub frame_subtype: FrameSubType,
    pub flags: u8,
}

impl FrameControl {
    pub fn new(frame_type: FrameType, frame_subtype: FrameSubType, flags: u8) -> FrameControl {
        FrameControl {
            protocol_version: 0,
            frame_type,
            frame_subtype,
            flags,
        }
    }

    pub fn to_ds(&self) -> bool {
        flag_is_set(self.flags, 0)
    }

    pub fn from_ds(&self) -> bool {
        flag_is_set(self.flags, 1)
    }

    pub fn more_frag(&self) -> bool {
        flag_is_set(self.flags, 2)
    }

    pub fn retry(&self) -> bool {
        flag_is_set(self.flags, 3)
    }

    pub fn protected(&self) -> bool {
        flag_is_set(self.flags, 6)
    }

    pub fn encode(&self) -> [u8; 2] {
        let type_bits = match self.frame_type {
            FrameType::Management => 0,
            FrameType::Control => 1,
            FrameType::Data => 2,
            FrameType::Unknown => 3,
        };
        let first = (self.frame_subtype.to_bits() << 4) | (type_bits << 2) | (self.protocol_version & 0b11);
        [first, self.flags]
    }
}
