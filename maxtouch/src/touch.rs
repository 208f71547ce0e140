//! The controller driver.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{I2c, SevenBitAddress};

use crate::bus::{I2cBus, RegisterBus};
use crate::command::{self, Command, RESET_TIME_MS};
use crate::config::{self, SensorConfig};
use crate::digitizer::Digitizer;
use crate::err::Error;
use crate::message::Message;
use crate::object::{self, ObjectLayout, ObjectType};

/// Most contact slots the touchscreen object can report.
pub const MAX_FINGERS: usize = 10;

/// A maXTouch controller tracking up to `N` contacts.
pub struct TouchController<B, const N: usize = 5> {
    bus: B,
    sensor: SensorConfig,
    layout: Option<ObjectLayout<N>>,
}

impl<I2cType: I2c<SevenBitAddress>, const N: usize> TouchController<I2cBus<I2cType>, N> {
    /// Creates a new `TouchController` on an I2C peripheral.
    ///
    /// # Arguments
    ///
    /// * `i2c` - A blocking I2C peripheral implementing `embedded_hal::i2c::I2c`.
    /// * `sensor` - Physical description of the sensor, including the device address.
    pub fn new(i2c: I2cType, sensor: SensorConfig) -> Self {
        Self::with_bus(I2cBus::new(i2c, sensor.address), sensor)
    }
}

impl<B: RegisterBus, const N: usize> TouchController<B, N> {
    /// Creates a new `TouchController` on any register bus.
    pub fn with_bus(bus: B, sensor: SensorConfig) -> Self {
        const { assert!(N >= 1 && N <= MAX_FINGERS, "1 to 10 contact slots") };
        Self {
            bus,
            sensor,
            layout: None,
        }
    }

    /// Discovers the object layout and writes the configuration.
    ///
    /// Never fails: an unreadable information block leaves every object absent,
    /// and failures on single entries or objects only disable those.
    pub fn initialize(&mut self) {
        self.layout = object::discover(&mut self.bus);
        match &self.layout {
            Some(layout) => config::write_configuration(&mut self.bus, layout, &self.sensor),
            None => log::warn!("No object table, touch controller left unconfigured"),
        }
    }

    /// The layout found by [`initialize`](Self::initialize).
    pub fn layout(&self) -> Option<&ObjectLayout<N>> {
        self.layout.as_ref()
    }

    /// The sensor configuration in use.
    pub fn sensor(&self) -> &SensorConfig {
        &self.sensor
    }

    /// Reads the pending messages and folds them into `previous`.
    ///
    /// Without a message count object this returns `previous` unchanged. A bus
    /// failure ends the cycle early and returns the state as updated so far.
    pub fn poll(&mut self, previous: Digitizer<N>) -> Digitizer<N> {
        let Some(layout) = &self.layout else {
            return previous;
        };
        let (Some(count_address), Some(processor_address)) = (
            layout.address(ObjectType::MessageCount),
            layout.address(ObjectType::MessageProcessor),
        ) else {
            return previous;
        };

        let mut count = [0u8; 1];
        if let Err(err) = self.bus.read_register(count_address, &mut count) {
            log::warn!("Error reading the message count: {err:?}");
            return previous;
        }

        let mut digitizer = previous;
        for index in 0..count[0] {
            let mut raw = [0u8; Message::LEN];
            if let Err(err) = self.bus.read_register(processor_address, &mut raw) {
                log::warn!("Error reading message {index} of {}: {err:?}", count[0]);
                break;
            }
            let message = Message::parse(&raw);
            digitizer = match layout.touch_report_ids() {
                Some(report_ids) => digitizer.apply(report_ids, &message),
                None => {
                    log::trace!("Dropping message {message:?}, no touchscreen object");
                    digitizer
                }
            };
        }
        digitizer
    }

    fn command_processor(&self) -> Result<u16, Error<B::Error>> {
        self.layout
            .as_ref()
            .and_then(|layout| layout.address(ObjectType::CommandProcessor))
            .ok_or(Error::ObjectAbsent(ObjectType::CommandProcessor))
    }

    fn touchscreen(&self) -> Result<u16, Error<B::Error>> {
        self.layout
            .as_ref()
            .and_then(|layout| layout.address(ObjectType::MultipleTouchScreen))
            .ok_or(Error::ObjectAbsent(ObjectType::MultipleTouchScreen))
    }

    /// Resets the controller and waits for it to restart.
    ///
    /// The controller comes back with its stored configuration; call
    /// [`initialize`](Self::initialize) again to reapply the driver's.
    pub fn reset<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<B::Error>> {
        let address = self.command_processor()?;
        command::send(&mut self.bus, address, Command::Reset)?;
        delay.delay_ms(RESET_TIME_MS);
        Ok(())
    }

    /// Recalibrates the sensor.
    pub fn calibrate(&mut self) -> Result<(), Error<B::Error>> {
        let address = self.command_processor()?;
        Ok(command::send(&mut self.bus, address, Command::Calibrate)?)
    }

    /// Stores the current configuration in non-volatile memory.
    pub fn backup(&mut self) -> Result<(), Error<B::Error>> {
        let address = self.command_processor()?;
        Ok(command::send(&mut self.bus, address, Command::BackupNv)?)
    }

    /// Asks every object to report its current state.
    pub fn report_all(&mut self) -> Result<(), Error<B::Error>> {
        let address = self.command_processor()?;
        Ok(command::send(&mut self.bus, address, Command::ReportAll)?)
    }

    /// Changes the reporting resolution.
    pub fn set_cpi(&mut self, cpi: u16) -> Result<(), Error<B::Error>> {
        let address = self.touchscreen()?;
        config::write_resolution(&mut self.bus, address, &self.sensor, cpi)?;
        self.sensor.cpi = cpi;
        Ok(())
    }

    /// Reads the reporting resolution back from the controller.
    pub fn read_cpi(&mut self) -> Result<u32, Error<B::Error>> {
        let address = self.touchscreen()?;
        config::read_resolution(&mut self.bus, address, &self.sensor)
    }

    /// Releases the bus.
    pub fn release(self) -> B {
        self.bus
    }
}
