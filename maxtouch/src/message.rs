//! Messages read from the message processor.

/// Payload bytes following the report id in every message.
pub const MESSAGE_PAYLOAD_LEN: usize = 9;

/// A message as read from the message processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Message {
    /// Identifies the object (and instance) that generated the message.
    pub report_id: u8,
    /// Object-specific payload.
    pub data: [u8; MESSAGE_PAYLOAD_LEN],
}

impl Message {
    /// Size of one message on the wire.
    pub const LEN: usize = 1 + MESSAGE_PAYLOAD_LEN;

    /// Parses a message.
    pub fn parse(raw: &[u8; Self::LEN]) -> Self {
        let mut data = [0u8; MESSAGE_PAYLOAD_LEN];
        data.copy_from_slice(&raw[1..]);
        Self {
            report_id: raw[0],
            data,
        }
    }
}

/// What a report id refers to, according to the touchscreen's report ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportTarget {
    /// Screen status: aggregate information about all contacts.
    ScreenStatus,
    /// The reserved id that follows the screen status.
    Reserved,
    /// An update for one contact slot.
    Contact(usize),
    /// Not a touchscreen report id this driver tracks.
    Unknown,
}

/// Touch event reported for a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchEvent {
    /// The contact moved.
    Move,
    /// Suppression of the contact was lifted.
    Unsup,
    /// The contact was suppressed.
    Sup,
    /// A new contact touched down.
    Down,
    /// The contact lifted off.
    Up,
    /// A contact touched down and was suppressed straight away.
    DownSup,
    /// A contact touched down and lifted off within one acquisition.
    DownUp,
    /// Any other code, with no transition of its own.
    Other(u8),
}

impl From<u8> for TouchEvent {
    fn from(code: u8) -> Self {
        match code {
            1 => Self::Move,
            2 => Self::Unsup,
            3 => Self::Sup,
            4 => Self::Down,
            5 => Self::Up,
            8 => Self::DownSup,
            9 => Self::DownUp,
            other => Self::Other(other),
        }
    }
}

impl TouchEvent {
    /// Whether the event ends the contact.
    pub fn lifts_tip(self) -> bool {
        matches!(self, Self::Up | Self::Unsup | Self::DownUp)
    }

    /// Whether the event marks the contact as suppressed.
    pub fn suppresses(self) -> bool {
        matches!(self, Self::Sup | Self::DownSup)
    }
}

/// A contact update from the touchscreen object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchMessage {
    /// What happened to the contact.
    pub event: TouchEvent,
    /// Reported X position.
    pub x: u16,
    /// Reported Y position.
    pub y: u16,
}

impl TouchMessage {
    /// Decodes the payload of a contact message.
    pub fn decode(data: &[u8; MESSAGE_PAYLOAD_LEN]) -> Self {
        Self {
            event: TouchEvent::from(data[0] & 0x0F),
            x: u16::from_le_bytes([data[1], data[2]]),
            y: u16::from_le_bytes([data[3], data[4]]),
        }
    }
}

/// The screen status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenStatus {
    /// Raw status byte.
    pub status: u8,
    /// Number of contacts currently reported, when the aux data is enabled.
    pub touches: u8,
}

impl ScreenStatus {
    /// Decodes the payload of a screen status message.
    pub fn decode(data: &[u8; MESSAGE_PAYLOAD_LEN]) -> Self {
        Self {
            status: data[0],
            touches: data[1],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_contact_payload() {
        let message = Message::parse(&[6, 0x94, 0x34, 0x12, 0x78, 0x56, 0, 0, 0, 0]);
        assert_eq!(message.report_id, 6);
        let touch = TouchMessage::decode(&message.data);
        assert_eq!(touch.event, TouchEvent::Down);
        assert_eq!(touch.x, 0x1234);
        assert_eq!(touch.y, 0x5678);
    }

    #[test]
    fn event_uses_low_nibble_only() {
        assert_eq!(TouchEvent::from(0x95 & 0x0F), TouchEvent::Up);
        assert_eq!(TouchMessage::decode(&[0xF1, 0, 0, 0, 0, 0, 0, 0, 0]).event, TouchEvent::Move);
    }

    #[test]
    fn vendor_codes_have_no_transition() {
        for code in [0, 6, 7, 10, 15] {
            let event = TouchEvent::from(code);
            assert_eq!(event, TouchEvent::Other(code));
            assert!(!event.lifts_tip());
            assert!(!event.suppresses());
        }
    }

    #[test]
    fn decodes_screen_status() {
        let status = ScreenStatus::decode(&[0x80, 3, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(status.touches, 3);
        assert_eq!(status.status, 0x80);
    }
}
