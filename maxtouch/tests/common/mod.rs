//! An in-memory controller on a fake I2C bus.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use maxtouch::bus::DEFAULT_I2C_ADDRESS;

pub const T5_ADDRESS: u16 = 0x0100;
pub const T100_ADDRESS: u16 = 0x0200;
pub const T6_ADDRESS: u16 = 0x0300;
pub const T7_ADDRESS: u16 = 0x0310;
pub const T8_ADDRESS: u16 = 0x0320;
pub const T44_ADDRESS: u16 = 0x0340;
pub const T46_ADDRESS: u16 = 0x0350;

pub const MEMORY_SIZE: usize = 0x0400;

/// An object table entry as sent by the controller.
pub fn entry(code: u8, address: u16, size_minus_one: u8, report_ids: u8) -> [u8; 6] {
    let [msb, lsb] = address.to_be_bytes();
    [code, msb, lsb, size_minus_one, 0, report_ids]
}

/// T5, T100, T6, T7, T8, T44, T46 in that order.
///
/// T5 owns report id 1, so the touchscreen starts at 2 and its contacts at 4.
pub fn standard_table() -> Vec<[u8; 6]> {
    vec![
        entry(5, T5_ADDRESS, 10, 1),
        entry(100, T100_ADDRESS, 59, 7),
        entry(6, T6_ADDRESS, 5, 1),
        entry(7, T7_ADDRESS, 3, 0),
        entry(8, T8_ADDRESS, 14, 0),
        entry(44, T44_ADDRESS, 0, 0),
        entry(46, T46_ADDRESS, 9, 0),
    ]
}

/// A contact message: event in the low nibble, little-endian X then Y.
pub fn touch_message(report_id: u8, event: u8, x: u16, y: u16) -> [u8; 10] {
    let [x_lo, x_hi] = x.to_le_bytes();
    let [y_lo, y_hi] = y.to_le_bytes();
    [report_id, 0x80 | event, x_lo, x_hi, y_lo, y_hi, 0, 0, 0, 0]
}

#[derive(Debug)]
pub struct DeviceState {
    pub memory: Vec<u8>,
    pub messages: VecDeque<[u8; 10]>,
    pub fail_reads: Vec<u16>,
    pub fail_writes: Vec<u16>,
    /// Fails the n-th message read from now on, once.
    pub fail_message_read: Option<usize>,
    pub writes: Vec<(u16, Vec<u8>)>,
    pub reads: usize,
}

impl DeviceState {
    pub fn written(&self, register: u16) -> Option<&[u8]> {
        self.writes
            .iter()
            .find(|(address, _)| *address == register)
            .map(|(_, data)| data.as_slice())
    }
}

#[derive(Debug, Clone)]
pub struct FakeController {
    pub state: Rc<RefCell<DeviceState>>,
}

impl FakeController {
    pub fn new(table: &[[u8; 6]]) -> Self {
        let mut memory = vec![0u8; MEMORY_SIZE];
        memory[..7].copy_from_slice(&[166, 16, 0x20, 0xAA, 24, 14, table.len() as u8]);
        for (index, raw) in table.iter().enumerate() {
            let offset = 7 + index * 6;
            memory[offset..offset + 6].copy_from_slice(raw);
        }
        Self {
            state: Rc::new(RefCell::new(DeviceState {
                memory,
                messages: VecDeque::new(),
                fail_reads: Vec::new(),
                fail_writes: Vec::new(),
                fail_message_read: None,
                writes: Vec::new(),
                reads: 0,
            })),
        }
    }

    pub fn queue(&self, messages: &[[u8; 10]]) {
        let mut state = self.state.borrow_mut();
        state.messages.extend(messages.iter().copied());
        state.memory[T44_ADDRESS as usize] = messages.len() as u8;
    }
}

impl ErrorType for FakeController {
    type Error = ErrorKind;
}

impl I2c for FakeController {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), ErrorKind> {
        if address != DEFAULT_I2C_ADDRESS {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        let mut state = self.state.borrow_mut();
        let mut header = Vec::new();
        let mut payload = Vec::new();

        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => {
                    for &byte in bytes.iter() {
                        if header.len() < 2 {
                            header.push(byte);
                        } else {
                            payload.push(byte);
                        }
                    }
                }
                Operation::Read(buf) => {
                    let register = u16::from_le_bytes([header[0], header[1]]);
                    state.reads += 1;
                    if state.fail_reads.contains(&register) {
                        return Err(ErrorKind::Other);
                    }
                    if register == T5_ADDRESS {
                        if let Some(remaining) = state.fail_message_read {
                            state.fail_message_read = remaining.checked_sub(1);
                            if remaining == 0 {
                                return Err(ErrorKind::Other);
                            }
                        }
                        let message = state.messages.pop_front().unwrap_or([0xFF; 10]);
                        buf.copy_from_slice(&message[..buf.len()]);
                    } else {
                        let start = register as usize;
                        buf.copy_from_slice(&state.memory[start..start + buf.len()]);
                    }
                }
            }
        }

        if !payload.is_empty() {
            let register = u16::from_le_bytes([header[0], header[1]]);
            if state.fail_writes.contains(&register) {
                return Err(ErrorKind::Other);
            }
            let start = register as usize;
            state.memory[start..start + payload.len()].copy_from_slice(&payload);
            state.writes.push((register, payload));
        }
        Ok(())
    }
}

/// Records the requested delays instead of waiting.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    pub total_ns: u64,
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}
