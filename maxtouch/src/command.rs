//! Command processor (T6) operations.

use crate::bus::RegisterBus;

/// Time the controller needs to come back after a reset, in ms.
pub const RESET_TIME_MS: u32 = 200;

/// A command accepted by the command processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Restart the controller.
    Reset,
    /// Store the current configuration in non-volatile memory.
    BackupNv,
    /// Recalibrate the sensor.
    Calibrate,
    /// Have every object report its current state.
    ReportAll,
}

impl Command {
    /// Offset of the command's register within the command processor.
    pub fn offset(self) -> u16 {
        match self {
            Self::Reset => 0,
            Self::BackupNv => 1,
            Self::Calibrate => 2,
            Self::ReportAll => 3,
        }
    }

    /// Value that triggers the command.
    pub fn value(self) -> u8 {
        match self {
            Self::BackupNv => 0x55,
            Self::Reset | Self::Calibrate | Self::ReportAll => 0x01,
        }
    }
}

/// Sends `command` to the command processor at `address`.
pub fn send<B: RegisterBus>(bus: &mut B, address: u16, command: Command) -> Result<(), B::Error> {
    log::debug!("T6 command {command:?}");
    bus.write_register(address.saturating_add(command.offset()), &[command.value()])
}
