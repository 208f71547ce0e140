//! Persistent contact state.
//!
//! A [`Digitizer`] is owned by the caller and threaded through every poll. Each
//! message touches at most one slot; everything else carries over unchanged.

use crate::message::{Message, ReportTarget, ScreenStatus, TouchEvent, TouchMessage};
use crate::object::TouchReportIds;

/// One tracked contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Finger {
    /// Cleared while the controller suppresses the contact.
    pub confidence: bool,
    /// Set while the contact touches the sensor.
    pub tip: bool,
    /// Last reported X position.
    pub x: u16,
    /// Last reported Y position.
    pub y: u16,
}

impl Finger {
    /// Applies a contact update.
    ///
    /// An `Up` keeps the last position seen before lift-off.
    pub fn apply(self, touch: &TouchMessage) -> Self {
        let mut finger = self;
        if touch.event == TouchEvent::Down {
            finger.tip = true;
        }
        if touch.event.lifts_tip() {
            finger.tip = false;
        }
        finger.confidence = !touch.event.suppresses();
        if touch.event != TouchEvent::Up {
            finger.x = touch.x;
            finger.y = touch.y;
        }
        finger
    }
}

/// Snapshot of all `N` contact slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Digitizer<const N: usize = 5> {
    fingers: [Finger; N],
}

impl<const N: usize> Default for Digitizer<N> {
    fn default() -> Self {
        Self {
            fingers: [Finger::default(); N],
        }
    }
}

impl<const N: usize> Digitizer<N> {
    /// All slots idle.
    pub fn new() -> Self {
        Self::default()
    }

    /// The contact slots, indexed by contact id.
    pub fn fingers(&self) -> &[Finger; N] {
        &self.fingers
    }

    /// Number of slots with the tip down.
    pub fn active_contacts(&self) -> usize {
        self.fingers.iter().filter(|finger| finger.tip).count()
    }

    /// Folds one message into the snapshot.
    pub fn apply(mut self, report_ids: &TouchReportIds<N>, message: &Message) -> Self {
        match report_ids.target(message.report_id) {
            ReportTarget::ScreenStatus => {
                let status = ScreenStatus::decode(&message.data);
                log::trace!("Screen status: {status:?}");
            }
            ReportTarget::Reserved => {
                log::trace!("Ignoring reserved report id {}", message.report_id);
            }
            ReportTarget::Contact(contact) => match self.fingers.get_mut(contact) {
                Some(finger) => {
                    let touch = TouchMessage::decode(&message.data);
                    log::trace!("Contact {contact}: {touch:?}");
                    *finger = finger.apply(&touch);
                }
                None => {
                    log::warn!("Contact id {contact} out of range, message dropped");
                }
            },
            ReportTarget::Unknown => {
                log::warn!(
                    "Unhandled report id {} (contacts {:?})",
                    message.report_id,
                    report_ids.subsequent()
                );
            }
        }
        self
    }

    /// Folds a batch of messages into the snapshot, in order.
    pub fn fold<'a, I>(self, report_ids: &TouchReportIds<N>, messages: I) -> Self
    where
        I: IntoIterator<Item = &'a Message>,
    {
        messages
            .into_iter()
            .fold(self, |digitizer, message| digitizer.apply(report_ids, message))
    }
}
