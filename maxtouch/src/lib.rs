//! A blocking, `no_std` driver for maXTouch capacitive multi-touch controllers.
//!
//! The controller does not keep its registers at fixed addresses. Instead it
//! publishes an object table listing where each functional object lives and
//! which report ids its messages carry. This driver walks that table once,
//! configures the objects it found, and then decodes the message stream into a
//! per-contact [`Digitizer`] snapshot.
//!
//! # Usage
//!
//! Any blocking I2C peripheral implementing `embedded_hal::i2c::I2c` will do.
//! The caller owns the digitizer state and threads it through every poll, for
//! example from the handler of the controller's CHG line.
//!
//! ```
//! use embedded_hal::i2c::I2c;
//! use maxtouch::{Digitizer, SensorConfig, TouchController};
//!
//! fn read_touch<I: I2c>(i2c: I) {
//!     let mut touch: TouchController<_> = TouchController::new(i2c, SensorConfig::new(106, 68));
//!     touch.initialize();
//!
//!     let mut digitizer = Digitizer::new();
//!     loop {
//!         digitizer = touch.poll(digitizer);
//!         for (slot, finger) in digitizer.fingers().iter().enumerate() {
//!             if finger.tip {
//!                 log::info!("Contact {slot} at {},{}", finger.x, finger.y);
//!             }
//!         }
//!     }
//! }
//! ```

#![cfg_attr(not(test), no_std)]

pub mod bus;
pub mod command;
pub mod config;
pub mod digitizer;
pub mod err;
pub mod message;
pub mod object;
pub mod touch;

pub use bus::{I2cBus, RegisterBus};
pub use config::SensorConfig;
pub use digitizer::{Digitizer, Finger};
pub use err::Error;
pub use touch::TouchController;
