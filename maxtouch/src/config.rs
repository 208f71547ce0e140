//! Configuration of the discovered objects.
//!
//! Every present object gets its own record, written independently of the
//! others. A failure on one object is logged and leaves that object as the
//! device had it; the remaining objects are still configured.

use embedded_hal::i2c::SevenBitAddress;

use crate::bus::{RegisterBus, DEFAULT_I2C_ADDRESS};
use crate::err::Error;
use crate::object::{InformationBlock, ObjectLayout, ObjectType};

/// Reporting resolution used unless configured otherwise.
pub const DEFAULT_CPI: u16 = 600;

/// Divides, rounding halves up.
fn divide_round(numerator: u64, denominator: u64) -> Option<u64> {
    numerator.checked_add(denominator / 2)?.checked_div(denominator)
}

/// Number of samples spanning `distance_mm` at `cpi` counts per inch.
///
/// `samples = round(cpi * distance_mm * 10 / 254)`, halves rounded up.
pub fn cpi_to_samples(cpi: u32, distance_mm: u32) -> Option<u32> {
    let numerator = u64::from(cpi) * u64::from(distance_mm) * 10;
    u32::try_from(divide_round(numerator, 254)?).ok()
}

/// Inverse of [`cpi_to_samples`]. `None` for a zero distance.
pub fn samples_to_cpi(samples: u32, distance_mm: u32) -> Option<u32> {
    let numerator = u64::from(samples) * 254;
    u32::try_from(divide_round(numerator, u64::from(distance_mm) * 10)?).ok()
}

/// Physical description of the sensor and the driver's tuning choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorConfig {
    /// 7-bit I2C address of the controller.
    pub address: SevenBitAddress,
    /// Width of the sensor in mm.
    pub width_mm: u16,
    /// Height of the sensor in mm.
    pub height_mm: u16,
    /// Reporting resolution in counts per inch.
    pub cpi: u16,
    /// Touch threshold.
    pub touch_threshold: u8,
    /// Single transmit gain for mutual capacitance measurements.
    pub gain: u8,
    /// Dual transmit gain. 255 lets the controller calibrate it.
    pub dx_gain: u8,
    /// X lines in use, when fewer than the controller has.
    pub matrix_x_size: Option<u8>,
    /// Y lines in use, when fewer than the controller has.
    pub matrix_y_size: Option<u8>,
    /// Mirror the X axis.
    pub invert_x: bool,
}

impl SensorConfig {
    /// Configuration for a `width_mm` x `height_mm` sensor using every matrix line.
    pub fn new(width_mm: u16, height_mm: u16) -> Self {
        Self {
            address: DEFAULT_I2C_ADDRESS,
            width_mm,
            height_mm,
            cpi: DEFAULT_CPI,
            touch_threshold: 18,
            gain: 4,
            dx_gain: 255,
            matrix_x_size: None,
            matrix_y_size: None,
            invert_x: false,
        }
    }

    /// X lines in use.
    pub fn x_lines(&self, info: &InformationBlock) -> u8 {
        self.matrix_x_size.unwrap_or(info.matrix_x_size)
    }

    /// Y lines in use.
    pub fn y_lines(&self, info: &InformationBlock) -> u8 {
        self.matrix_y_size.unwrap_or(info.matrix_y_size)
    }

    /// X and Y range registers for `cpi`.
    ///
    /// The touchscreen reports with X and Y swapped, so the X range spans the
    /// sensor height and the Y range its width.
    pub fn ranges(&self, cpi: u16) -> Option<(u16, u16)> {
        let x_range = cpi_to_samples(u32::from(cpi), u32::from(self.height_mm))?;
        let y_range = cpi_to_samples(u32::from(cpi), u32::from(self.width_mm))?;
        Some((u16::try_from(x_range).ok()?, u16::try_from(y_range).ok()?))
    }
}

/// Enable pipelining in active mode.
pub const T7_CFG_ACTVPIPEEN: u8 = 1 << 6;
/// Enable pipelining in idle mode.
pub const T7_CFG_IDLEPIPEEN: u8 = 1 << 7;

/// T7 power configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerConfig {
    /// Acquisition interval in idle mode, in ms.
    pub idle_acq_int: u8,
    /// Acquisition interval in active mode, in ms.
    pub active_acq_int: u8,
    /// Time before dropping from active to idle mode, in 200 ms units.
    pub active_to_idle_timeout: u8,
    /// `T7_CFG_*` flags.
    pub cfg: u8,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            idle_acq_int: 32,
            active_acq_int: 10,
            active_to_idle_timeout: 50,
            cfg: T7_CFG_ACTVPIPEEN | T7_CFG_IDLEPIPEEN,
        }
    }
}

impl PowerConfig {
    /// Size of the record on the wire.
    pub const LEN: usize = 4;

    /// Encodes the record.
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        [
            self.idle_acq_int,
            self.active_acq_int,
            self.active_to_idle_timeout,
            self.cfg,
        ]
    }
}

/// T8 acquisition configuration. All zero leaves the controller on its defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AcquisitionConfig {
    /// Charge time of each burst, in 1/4 microseconds.
    pub charge_time: u8,
    /// Interval between drift compensation steps while touched, in 200 ms units.
    pub touch_drift: u8,
    /// Interval between drift compensation steps while untouched, in 200 ms units.
    pub drift_step: u8,
    /// Time a touch may last before recalibration, in 200 ms units. Zero disables it.
    pub touch_auto_cal: u8,
    /// Measurement synchronisation source.
    pub sync: u8,
    /// Time recalibration stays suspended after a touch, in 200 ms units.
    pub anti_touch_cal_suspend_time: u8,
    /// Touch count above which recalibration is suspended.
    pub anti_touch_cal_suspend_threshold: u8,
    /// Anti-touch count that forces a recalibration.
    pub anti_touch_force_cal_threshold: u8,
    /// Anti-touch to touch ratio that forces a recalibration.
    pub anti_touch_force_cal_ratio: u8,
    /// Measurements the controller may run.
    pub measure_allow: u8,
    /// Measurements run by default in idle mode.
    pub measure_idle_default: u8,
    /// Measurements run by default in active mode.
    pub measure_active_default: u8,
    /// Reference mode.
    pub ref_mode: u8,
    /// Acquisition configuration flags.
    pub cfg: u8,
}

impl AcquisitionConfig {
    /// Size of the record on the wire.
    pub const LEN: usize = 15;

    /// Encodes the record. Byte 1 is reserved and written as zero.
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        [
            self.charge_time,
            0,
            self.touch_drift,
            self.drift_step,
            self.touch_auto_cal,
            self.sync,
            self.anti_touch_cal_suspend_time,
            self.anti_touch_cal_suspend_threshold,
            self.anti_touch_force_cal_threshold,
            self.anti_touch_force_cal_ratio,
            self.measure_allow,
            self.measure_idle_default,
            self.measure_active_default,
            self.ref_mode,
            self.cfg,
        ]
    }
}

/// T46 capacitive touch engine configuration. All zero keeps the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CteConfig {
    /// Control flags.
    pub ctrl: u8,
    /// Sync pulses per X line in idle mode.
    pub idle_syncs_per_x: u8,
    /// Sync pulses per X line in active mode.
    pub active_syncs_per_x: u8,
    /// ADC conversions per sync pulse.
    pub adcs_per_sync: u8,
    /// Pulses per ADC conversion.
    pub pulses_per_adc: u8,
    /// X line slew rate.
    pub x_slew: u8,
    /// Delay after a sync pulse, little-endian on the wire.
    pub sync_delay: u16,
    /// X line drive voltage.
    pub x_voltage: u8,
}

impl CteConfig {
    /// Size of the record on the wire.
    pub const LEN: usize = 10;

    /// Encodes the record. Byte 1 is reserved and written as zero.
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let [delay_lo, delay_hi] = self.sync_delay.to_le_bytes();
        [
            self.ctrl,
            0,
            self.idle_syncs_per_x,
            self.active_syncs_per_x,
            self.adcs_per_sync,
            self.pulses_per_adc,
            self.x_slew,
            delay_lo,
            delay_hi,
            self.x_voltage,
        ]
    }
}

/// Enable the touchscreen object.
pub const T100_CTRL_ENABLE: u8 = 1 << 0;
/// Enable message reporting.
pub const T100_CTRL_RPTEN: u8 = 1 << 1;
/// Swap X and Y.
pub const T100_CFG_SWITCHXY: u8 = 1 << 5;
/// Invert the Y axis.
pub const T100_CFG_INVERTY: u8 = 1 << 6;
/// Invert the X axis.
pub const T100_CFG_INVERTX: u8 = 1 << 7;
/// Screen status aux data: number of reported touches.
pub const T100_SCRAUX_NUMTCH: u8 = 1 << 0;

mod t100 {
    pub const CTRL: usize = 0;
    pub const CFG1: usize = 1;
    pub const SCRAUX: usize = 2;
    pub const NUMTCH: usize = 6;
    pub const XSIZE: usize = 9;
    pub const XPITCH: usize = 10;
    pub const XRANGE: usize = 13;
    pub const YSIZE: usize = 20;
    pub const YPITCH: usize = 21;
    pub const YRANGE: usize = 24;
    pub const GAIN: usize = 28;
    pub const DXGAIN: usize = 29;
    pub const TCHTHR: usize = 30;
    pub const MRGTHR: usize = 35;
    pub const MRGHYST: usize = 37;
    pub const MOVFILTER: usize = 44;
    pub const MOVSMOOTH: usize = 45;
    pub const MOVHYSTI: usize = 47;
    pub const MOVHYSTN: usize = 49;
}

/// T100 touchscreen configuration.
///
/// Kept as the raw record read from the device so bytes the driver does not
/// tune are written back untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchScreenConfig {
    raw: [u8; Self::LEN],
}

impl TouchScreenConfig {
    /// Size of the record on the wire.
    pub const LEN: usize = 60;

    /// Wraps a record read from the device.
    pub fn from_bytes(raw: [u8; Self::LEN]) -> Self {
        Self { raw }
    }

    /// The record as it will be written.
    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.raw
    }

    fn set_u16(&mut self, offset: usize, value: u16) {
        self.raw[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    fn u16_at(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.raw[offset], self.raw[offset + 1]])
    }

    /// `T100_CTRL_*` flags.
    pub fn ctrl(&self) -> u8 {
        self.raw[t100::CTRL]
    }

    /// `T100_CFG_*` flags.
    pub fn cfg1(&self) -> u8 {
        self.raw[t100::CFG1]
    }

    /// Number of contacts reported.
    pub fn num_touches(&self) -> u8 {
        self.raw[t100::NUMTCH]
    }

    /// X range register.
    pub fn x_range(&self) -> u16 {
        self.u16_at(t100::XRANGE)
    }

    /// Y range register.
    pub fn y_range(&self) -> u16 {
        self.u16_at(t100::YRANGE)
    }

    /// Sets the X and Y range registers.
    pub fn set_ranges(&mut self, x_range: u16, y_range: u16) {
        self.set_u16(t100::XRANGE, x_range);
        self.set_u16(t100::YRANGE, y_range);
    }

    /// Overrides the tuned subset of the record for `num_touches` contacts.
    pub fn tune(
        &mut self,
        sensor: &SensorConfig,
        info: &InformationBlock,
        num_touches: u8,
        (x_range, y_range): (u16, u16),
    ) {
        let x_lines = sensor.x_lines(info);
        let y_lines = sensor.y_lines(info);
        let pitch = |mm: u16, lines: u8| {
            mm.checked_div(u16::from(lines))
                .map_or(0, |pitch| u8::try_from(pitch).unwrap_or(u8::MAX))
        };

        self.raw[t100::CTRL] = T100_CTRL_RPTEN | T100_CTRL_ENABLE;
        // X and Y are swapped, so mirroring X means inverting the device's Y.
        self.raw[t100::CFG1] = if sensor.invert_x {
            T100_CFG_SWITCHXY | T100_CFG_INVERTY
        } else {
            T100_CFG_SWITCHXY
        };
        self.raw[t100::SCRAUX] = T100_SCRAUX_NUMTCH;
        self.raw[t100::NUMTCH] = num_touches;
        self.raw[t100::XSIZE] = x_lines;
        self.raw[t100::YSIZE] = y_lines;
        self.raw[t100::XPITCH] = pitch(sensor.width_mm, x_lines);
        self.raw[t100::YPITCH] = pitch(sensor.height_mm, y_lines);
        self.raw[t100::GAIN] = sensor.gain;
        self.raw[t100::DXGAIN] = sensor.dx_gain;
        self.raw[t100::TCHTHR] = sensor.touch_threshold;
        self.raw[t100::MRGTHR] = 5;
        self.raw[t100::MRGHYST] = 5;
        // Smoothing tails off at higher speeds.
        self.raw[t100::MOVSMOOTH] = 224;
        // Low nibble is the speed response; higher reduces lag and smoothing.
        self.raw[t100::MOVFILTER] = 4 & 0x0F;
        // Large values make the pointer stick before it starts moving.
        self.set_u16(t100::MOVHYSTI, 6);
        self.set_u16(t100::MOVHYSTN, 4);
        self.set_ranges(x_range, y_range);
    }
}

fn write_record<B: RegisterBus>(
    bus: &mut B,
    layout_address: Option<u16>,
    record: &[u8],
) -> Result<bool, Error<B::Error>> {
    match layout_address {
        Some(address) => {
            bus.write_register(address, record)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

fn read_touchscreen<B: RegisterBus>(
    bus: &mut B,
    address: u16,
) -> Result<TouchScreenConfig, Error<B::Error>> {
    let mut raw = [0u8; TouchScreenConfig::LEN];
    bus.read_register(address, &mut raw)?;
    Ok(TouchScreenConfig::from_bytes(raw))
}

/// Read-modify-writes the touchscreen configuration.
pub fn configure_touchscreen<B: RegisterBus>(
    bus: &mut B,
    address: u16,
    info: &InformationBlock,
    sensor: &SensorConfig,
    num_touches: u8,
) -> Result<(), Error<B::Error>> {
    let ranges = sensor
        .ranges(sensor.cpi)
        .ok_or(Error::InvalidResolution)?;
    let mut record = read_touchscreen(bus, address)?;
    record.tune(sensor, info, num_touches, ranges);
    bus.write_register(address, record.as_bytes())?;
    Ok(())
}

/// Changes the reporting resolution of the touchscreen, leaving the rest of its
/// configuration alone.
pub fn write_resolution<B: RegisterBus>(
    bus: &mut B,
    address: u16,
    sensor: &SensorConfig,
    cpi: u16,
) -> Result<(), Error<B::Error>> {
    let (x_range, y_range) = sensor.ranges(cpi).ok_or(Error::InvalidResolution)?;
    let mut record = read_touchscreen(bus, address)?;
    record.set_ranges(x_range, y_range);
    bus.write_register(address, record.as_bytes())?;
    Ok(())
}

/// Reads the reporting resolution back from the touchscreen's X range.
pub fn read_resolution<B: RegisterBus>(
    bus: &mut B,
    address: u16,
    sensor: &SensorConfig,
) -> Result<u32, Error<B::Error>> {
    let record = read_touchscreen(bus, address)?;
    samples_to_cpi(u32::from(record.x_range()), u32::from(sensor.height_mm))
        .ok_or(Error::InvalidResolution)
}

/// Writes the configuration of every object present in `layout`.
///
/// Absent objects are skipped. A failing object is logged and the others are
/// still written.
pub fn write_configuration<B: RegisterBus, const N: usize>(
    bus: &mut B,
    layout: &ObjectLayout<N>,
    sensor: &SensorConfig,
) {
    let blocks: [(ObjectType, &[u8]); 3] = [
        (ObjectType::PowerConfig, &PowerConfig::default().to_bytes()),
        (
            ObjectType::AcquisitionConfig,
            &AcquisitionConfig::default().to_bytes(),
        ),
        (ObjectType::CteConfig, &CteConfig::default().to_bytes()),
    ];
    for (object, record) in blocks {
        match write_record(bus, layout.address(object), record) {
            Ok(true) => log::debug!("T{} configured", object.code()),
            Ok(false) => log::debug!("T{} not present, skipped", object.code()),
            Err(err) => log::warn!("T{} configuration failed: {err:?}", object.code()),
        }
    }

    let touchscreen = ObjectType::MultipleTouchScreen;
    if let Some(address) = layout.address(touchscreen) {
        let num_touches = u8::try_from(N).unwrap_or(u8::MAX);
        match configure_touchscreen(bus, address, layout.info(), sensor, num_touches) {
            Ok(()) => log::debug!("T{} configured", touchscreen.code()),
            Err(err) => log::warn!("T{} configuration failed: {err:?}", touchscreen.code()),
        }
    }
}
