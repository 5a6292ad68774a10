//! OBD-II PID Definitions and Response Decoding
//!
//! Every mode 01 parameter is described by a [`ParameterDescriptor`]: its
//! PID, payload width, decode formula and unit. Reading a parameter is one
//! exchange followed by one table-driven decode step.

use crate::mode;
use serde::Serialize;

/// Standard OBD-II PIDs for Mode 01 (current data)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum Pid {
    EngineLoad = 0x04,
    CoolantTemp = 0x05,
    ShortFuelTrimBank1 = 0x06,
    LongFuelTrimBank1 = 0x07,
    ShortFuelTrimBank2 = 0x08,
    LongFuelTrimBank2 = 0x09,
    FuelPressure = 0x0A,
    IntakeManifoldPressure = 0x0B,
    Rpm = 0x0C,
    Speed = 0x0D,
    TimingAdvance = 0x0E,
    IntakeAirTemp = 0x0F,
    Maf = 0x10,
    ThrottlePosition = 0x11,
    O2Bank1Sensor1 = 0x14,
    O2Bank1Sensor2 = 0x15,
    O2Bank1Sensor3 = 0x16,
    O2Bank1Sensor4 = 0x17,
    O2Bank2Sensor1 = 0x18,
    O2Bank2Sensor2 = 0x19,
    O2Bank2Sensor3 = 0x1A,
    O2Bank2Sensor4 = 0x1B,
    AuxInputStatus = 0x1E,
    RunTime = 0x1F,
    DistanceWithMil = 0x21,
    FuelRailPressureRelative = 0x22,
    FuelRailPressureAbsolute = 0x23,
    O2Sensor1WideRangeVoltage = 0x24,
    O2Sensor2WideRangeVoltage = 0x25,
    O2Sensor3WideRangeVoltage = 0x26,
    O2Sensor4WideRangeVoltage = 0x27,
    O2Sensor5WideRangeVoltage = 0x28,
    O2Sensor6WideRangeVoltage = 0x29,
    O2Sensor7WideRangeVoltage = 0x2A,
    O2Sensor8WideRangeVoltage = 0x2B,
    CommandedEgr = 0x2C,
    EgrError = 0x2D,
    CommandedEvapPurge = 0x2E,
    FuelLevel = 0x2F,
    WarmUpsSinceClear = 0x30,
    DistanceSinceClear = 0x31,
    EvapVaporPressure = 0x32,
    BarometricPressure = 0x33,
    O2Sensor1WideRangeCurrent = 0x34,
    O2Sensor2WideRangeCurrent = 0x35,
    O2Sensor3WideRangeCurrent = 0x36,
    O2Sensor4WideRangeCurrent = 0x37,
    O2Sensor5WideRangeCurrent = 0x38,
    O2Sensor6WideRangeCurrent = 0x39,
    O2Sensor7WideRangeCurrent = 0x3A,
    O2Sensor8WideRangeCurrent = 0x3B,
    CatalystTempBank1Sensor1 = 0x3C,
    CatalystTempBank2Sensor1 = 0x3D,
    CatalystTempBank1Sensor2 = 0x3E,
    CatalystTempBank2Sensor2 = 0x3F,
    ControlModuleVoltage = 0x42,
    AbsoluteLoad = 0x43,
    CommandedEquivalenceRatio = 0x44,
    RelativeThrottlePosition = 0x45,
    AmbientAirTemp = 0x46,
    AbsoluteThrottlePositionB = 0x47,
    AbsoluteThrottlePositionC = 0x48,
    AcceleratorPedalPositionD = 0x49,
    AcceleratorPedalPositionE = 0x4A,
    AcceleratorPedalPositionF = 0x4B,
    CommandedThrottleActuator = 0x4C,
}

impl Pid {
    /// Every supported PID, in ascending order
    pub const ALL: [Pid; 66] = [
        Pid::EngineLoad,
        Pid::CoolantTemp,
        Pid::ShortFuelTrimBank1,
        Pid::LongFuelTrimBank1,
        Pid::ShortFuelTrimBank2,
        Pid::LongFuelTrimBank2,
        Pid::FuelPressure,
        Pid::IntakeManifoldPressure,
        Pid::Rpm,
        Pid::Speed,
        Pid::TimingAdvance,
        Pid::IntakeAirTemp,
        Pid::Maf,
        Pid::ThrottlePosition,
        Pid::O2Bank1Sensor1,
        Pid::O2Bank1Sensor2,
        Pid::O2Bank1Sensor3,
        Pid::O2Bank1Sensor4,
        Pid::O2Bank2Sensor1,
        Pid::O2Bank2Sensor2,
        Pid::O2Bank2Sensor3,
        Pid::O2Bank2Sensor4,
        Pid::AuxInputStatus,
        Pid::RunTime,
        Pid::DistanceWithMil,
        Pid::FuelRailPressureRelative,
        Pid::FuelRailPressureAbsolute,
        Pid::O2Sensor1WideRangeVoltage,
        Pid::O2Sensor2WideRangeVoltage,
        Pid::O2Sensor3WideRangeVoltage,
        Pid::O2Sensor4WideRangeVoltage,
        Pid::O2Sensor5WideRangeVoltage,
        Pid::O2Sensor6WideRangeVoltage,
        Pid::O2Sensor7WideRangeVoltage,
        Pid::O2Sensor8WideRangeVoltage,
        Pid::CommandedEgr,
        Pid::EgrError,
        Pid::CommandedEvapPurge,
        Pid::FuelLevel,
        Pid::WarmUpsSinceClear,
        Pid::DistanceSinceClear,
        Pid::EvapVaporPressure,
        Pid::BarometricPressure,
        Pid::O2Sensor1WideRangeCurrent,
        Pid::O2Sensor2WideRangeCurrent,
        Pid::O2Sensor3WideRangeCurrent,
        Pid::O2Sensor4WideRangeCurrent,
        Pid::O2Sensor5WideRangeCurrent,
        Pid::O2Sensor6WideRangeCurrent,
        Pid::O2Sensor7WideRangeCurrent,
        Pid::O2Sensor8WideRangeCurrent,
        Pid::CatalystTempBank1Sensor1,
        Pid::CatalystTempBank2Sensor1,
        Pid::CatalystTempBank1Sensor2,
        Pid::CatalystTempBank2Sensor2,
        Pid::ControlModuleVoltage,
        Pid::AbsoluteLoad,
        Pid::CommandedEquivalenceRatio,
        Pid::RelativeThrottlePosition,
        Pid::AmbientAirTemp,
        Pid::AbsoluteThrottlePositionB,
        Pid::AbsoluteThrottlePositionC,
        Pid::AcceleratorPedalPositionD,
        Pid::AcceleratorPedalPositionE,
        Pid::AcceleratorPedalPositionF,
        Pid::CommandedThrottleActuator,
    ];

    /// Get the PID hex value
    pub fn as_hex(&self) -> u8 {
        *self as u8
    }

    /// Look up a PID by its hex value
    pub fn from_hex(value: u8) -> Option<Pid> {
        CATALOGUE
            .iter()
            .map(|descriptor| descriptor.pid)
            .find(|pid| pid.as_hex() == value)
    }

    /// Look up a PID by its catalogue name (e.g. "rpm")
    pub fn from_name(name: &str) -> Option<Pid> {
        CATALOGUE
            .iter()
            .find(|descriptor| descriptor.name.eq_ignore_ascii_case(name))
            .map(|descriptor| descriptor.pid)
    }

    /// Descriptor for this PID
    pub fn descriptor(&self) -> &'static ParameterDescriptor {
        CATALOGUE
            .iter()
            .find(|descriptor| descriptor.pid == *self)
            .unwrap_or_else(|| unreachable!("every Pid has a catalogue entry"))
    }

    /// Get the number of response bytes for this PID
    pub fn response_bytes(&self) -> usize {
        self.descriptor().width()
    }

    /// Get the sampling priority (higher = more frequent)
    pub fn sampling_priority(&self) -> u8 {
        match self {
            Pid::Rpm | Pid::Speed | Pid::CoolantTemp | Pid::EngineLoad => 10,
            Pid::Maf | Pid::ThrottlePosition | Pid::IntakeManifoldPressure => 5,
            _ => 2,
        }
    }
}

/// Affine transform `raw * multiplier / divisor + offset`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub multiplier: f64,
    pub divisor: f64,
    pub offset: f64,
}

impl Scale {
    pub const fn new(multiplier: f64, divisor: f64, offset: f64) -> Self {
        Self {
            multiplier,
            divisor,
            offset,
        }
    }

    pub fn apply(&self, raw: f64) -> f64 {
        raw * self.multiplier / self.divisor + self.offset
    }
}

const IDENTITY: Scale = Scale::new(1.0, 1.0, 0.0);
const PERCENT: Scale = Scale::new(100.0, 255.0, 0.0);
/// (A - 128) * 100 / 128
const TRIM: Scale = Scale::new(100.0, 128.0, -100.0);
const TEMPERATURE: Scale = Scale::new(1.0, 1.0, -40.0);
const EQUIVALENCE_RATIO: Scale = Scale::new(2.0, 65536.0, 0.0);

/// Decode formula applied to the payload bytes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decoder {
    /// One byte A
    Byte(Scale),
    /// Big-endian pair A*256 + B
    Word(Scale),
    /// Big-endian pair read as two's complement
    SignedWord(Scale),
    /// A single bit of one payload byte
    Flag { byte: usize, bit: u8 },
    /// A and B scaled independently
    BytePair(Scale, Scale),
    /// AB and CD scaled independently
    WordPair(Scale, Scale),
}

impl Decoder {
    /// Number of payload bytes the formula consumes
    pub fn width(&self) -> usize {
        match self {
            Decoder::Byte(_) => 1,
            Decoder::Word(_) | Decoder::SignedWord(_) | Decoder::BytePair(..) => 2,
            Decoder::Flag { byte, .. } => byte + 1,
            Decoder::WordPair(..) => 4,
        }
    }

    /// Apply the formula; `None` when `bytes` is narrower than [`Decoder::width`]
    pub fn decode(&self, bytes: &[u8]) -> Option<PhysicalValue> {
        if bytes.len() < self.width() {
            return None;
        }
        let value = match *self {
            Decoder::Byte(scale) => PhysicalValue::Scalar(scale.apply(bytes[0] as f64)),
            Decoder::Word(scale) => PhysicalValue::Scalar(scale.apply(word(bytes[0], bytes[1]) as f64)),
            Decoder::SignedWord(scale) => {
                let raw = i16::from_be_bytes([bytes[0], bytes[1]]);
                PhysicalValue::Scalar(scale.apply(raw as f64))
            }
            Decoder::Flag { byte, bit } => PhysicalValue::Flag(get_bit(bytes[byte], bit)),
            Decoder::BytePair(first, second) => {
                PhysicalValue::Pair(first.apply(bytes[0] as f64), second.apply(bytes[1] as f64))
            }
            Decoder::WordPair(first, second) => PhysicalValue::Pair(
                first.apply(word(bytes[0], bytes[1]) as f64),
                second.apply(word(bytes[2], bytes[3]) as f64),
            ),
        };
        Some(value)
    }
}

fn word(high: u8, low: u8) -> u16 {
    u16::from_be_bytes([high, low])
}

/// Test bit `position` (0 = least significant) of `byte`
pub fn get_bit(byte: u8, position: u8) -> bool {
    position < 8 && (byte >> position) & 1 == 1
}

/// Decoded physical value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PhysicalValue {
    Scalar(f64),
    Flag(bool),
    /// Two quantities from one PID (e.g. O2 voltage and trim)
    Pair(f64, f64),
}

impl PhysicalValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            PhysicalValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            PhysicalValue::Flag(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_pair(&self) -> Option<(f64, f64)> {
        match self {
            PhysicalValue::Pair(a, b) => Some((*a, *b)),
            _ => None,
        }
    }
}

/// Static description of one parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterDescriptor {
    pub pid: Pid,
    /// Short identifier, used in configuration
    pub name: &'static str,
    pub mode: u8,
    pub decoder: Decoder,
    /// Unit of the (first) decoded value
    pub unit: &'static str,
    /// Documented range of the (first) decoded value
    pub min: f64,
    pub max: f64,
}

impl ParameterDescriptor {
    pub fn width(&self) -> usize {
        self.decoder.width()
    }

    pub fn decode(&self, bytes: &[u8]) -> Option<PhysicalValue> {
        self.decoder.decode(bytes)
    }
}

const fn param(
    pid: Pid,
    name: &'static str,
    decoder: Decoder,
    unit: &'static str,
    min: f64,
    max: f64,
) -> ParameterDescriptor {
    ParameterDescriptor {
        pid,
        name,
        mode: mode::CURRENT_DATA,
        decoder,
        unit,
        min,
        max,
    }
}

const O2_SENSOR: Decoder = Decoder::BytePair(Scale::new(1.0, 200.0, 0.0), TRIM);
const O2_WIDE_RANGE_VOLTAGE: Decoder = Decoder::WordPair(EQUIVALENCE_RATIO, Scale::new(8.0, 65536.0, 0.0));
const O2_WIDE_RANGE_CURRENT: Decoder = Decoder::WordPair(EQUIVALENCE_RATIO, Scale::new(1.0, 256.0, -128.0));
const CATALYST_TEMPERATURE: Decoder = Decoder::Word(Scale::new(1.0, 10.0, -40.0));

/// Every supported mode 01 parameter
pub static CATALOGUE: &[ParameterDescriptor] = &[
    param(Pid::EngineLoad, "engine_load", Decoder::Byte(PERCENT), "%", 0.0, 100.0),
    param(Pid::CoolantTemp, "coolant_temp", Decoder::Byte(TEMPERATURE), "°C", -40.0, 215.0),
    param(Pid::ShortFuelTrimBank1, "short_fuel_trim_bank1", Decoder::Byte(TRIM), "%", -100.0, 99.21875),
    param(Pid::LongFuelTrimBank1, "long_fuel_trim_bank1", Decoder::Byte(TRIM), "%", -100.0, 99.21875),
    param(Pid::ShortFuelTrimBank2, "short_fuel_trim_bank2", Decoder::Byte(TRIM), "%", -100.0, 99.21875),
    param(Pid::LongFuelTrimBank2, "long_fuel_trim_bank2", Decoder::Byte(TRIM), "%", -100.0, 99.21875),
    param(Pid::FuelPressure, "fuel_pressure", Decoder::Byte(Scale::new(3.0, 1.0, 0.0)), "kPa", 0.0, 765.0),
    param(Pid::IntakeManifoldPressure, "intake_manifold_pressure", Decoder::Byte(IDENTITY), "kPa", 0.0, 255.0),
    param(Pid::Rpm, "rpm", Decoder::Word(Scale::new(1.0, 4.0, 0.0)), "rpm", 0.0, 16383.75),
    param(Pid::Speed, "speed", Decoder::Byte(IDENTITY), "km/h", 0.0, 255.0),
    param(Pid::TimingAdvance, "timing_advance", Decoder::Byte(Scale::new(1.0, 2.0, -64.0)), "°", -64.0, 63.5),
    param(Pid::IntakeAirTemp, "intake_air_temp", Decoder::Byte(TEMPERATURE), "°C", -40.0, 215.0),
    param(Pid::Maf, "maf", Decoder::Word(Scale::new(1.0, 100.0, 0.0)), "g/s", 0.0, 655.35),
    param(Pid::ThrottlePosition, "throttle_position", Decoder::Byte(PERCENT), "%", 0.0, 100.0),
    param(Pid::O2Bank1Sensor1, "o2_b1s1", O2_SENSOR, "V", 0.0, 1.275),
    param(Pid::O2Bank1Sensor2, "o2_b1s2", O2_SENSOR, "V", 0.0, 1.275),
    param(Pid::O2Bank1Sensor3, "o2_b1s3", O2_SENSOR, "V", 0.0, 1.275),
    param(Pid::O2Bank1Sensor4, "o2_b1s4", O2_SENSOR, "V", 0.0, 1.275),
    param(Pid::O2Bank2Sensor1, "o2_b2s1", O2_SENSOR, "V", 0.0, 1.275),
    param(Pid::O2Bank2Sensor2, "o2_b2s2", O2_SENSOR, "V", 0.0, 1.275),
    param(Pid::O2Bank2Sensor3, "o2_b2s3", O2_SENSOR, "V", 0.0, 1.275),
    param(Pid::O2Bank2Sensor4, "o2_b2s4", O2_SENSOR, "V", 0.0, 1.275),
    param(Pid::AuxInputStatus, "aux_input_status", Decoder::Flag { byte: 0, bit: 0 }, "", 0.0, 1.0),
    param(Pid::RunTime, "run_time", Decoder::Word(IDENTITY), "s", 0.0, 65535.0),
    param(Pid::DistanceWithMil, "distance_with_mil", Decoder::Word(IDENTITY), "km", 0.0, 65535.0),
    param(Pid::FuelRailPressureRelative, "fuel_rail_pressure_relative", Decoder::Word(Scale::new(79.0, 1000.0, 0.0)), "kPa", 0.0, 5177.265),
    param(Pid::FuelRailPressureAbsolute, "fuel_rail_pressure_absolute", Decoder::Word(Scale::new(10.0, 1.0, 0.0)), "kPa", 0.0, 655350.0),
    param(Pid::O2Sensor1WideRangeVoltage, "o2_s1_wr_voltage", O2_WIDE_RANGE_VOLTAGE, "ratio", 0.0, 2.0),
    param(Pid::O2Sensor2WideRangeVoltage, "o2_s2_wr_voltage", O2_WIDE_RANGE_VOLTAGE, "ratio", 0.0, 2.0),
    param(Pid::O2Sensor3WideRangeVoltage, "o2_s3_wr_voltage", O2_WIDE_RANGE_VOLTAGE, "ratio", 0.0, 2.0),
    param(Pid::O2Sensor4WideRangeVoltage, "o2_s4_wr_voltage", O2_WIDE_RANGE_VOLTAGE, "ratio", 0.0, 2.0),
    param(Pid::O2Sensor5WideRangeVoltage, "o2_s5_wr_voltage", O2_WIDE_RANGE_VOLTAGE, "ratio", 0.0, 2.0),
    param(Pid::O2Sensor6WideRangeVoltage, "o2_s6_wr_voltage", O2_WIDE_RANGE_VOLTAGE, "ratio", 0.0, 2.0),
    param(Pid::O2Sensor7WideRangeVoltage, "o2_s7_wr_voltage", O2_WIDE_RANGE_VOLTAGE, "ratio", 0.0, 2.0),
    param(Pid::O2Sensor8WideRangeVoltage, "o2_s8_wr_voltage", O2_WIDE_RANGE_VOLTAGE, "ratio", 0.0, 2.0),
    param(Pid::CommandedEgr, "commanded_egr", Decoder::Byte(PERCENT), "%", 0.0, 100.0),
    param(Pid::EgrError, "egr_error", Decoder::Byte(TRIM), "%", -100.0, 99.21875),
    param(Pid::CommandedEvapPurge, "commanded_evap_purge", Decoder::Byte(PERCENT), "%", 0.0, 100.0),
    param(Pid::FuelLevel, "fuel_level", Decoder::Byte(PERCENT), "%", 0.0, 100.0),
    param(Pid::WarmUpsSinceClear, "warm_ups_since_clear", Decoder::Byte(IDENTITY), "count", 0.0, 255.0),
    param(Pid::DistanceSinceClear, "distance_since_clear", Decoder::Word(IDENTITY), "km", 0.0, 65535.0),
    param(Pid::EvapVaporPressure, "evap_vapor_pressure", Decoder::SignedWord(Scale::new(1.0, 4.0, 0.0)), "Pa", -8192.0, 8191.75),
    param(Pid::BarometricPressure, "barometric_pressure", Decoder::Byte(IDENTITY), "kPa", 0.0, 255.0),
    param(Pid::O2Sensor1WideRangeCurrent, "o2_s1_wr_current", O2_WIDE_RANGE_CURRENT, "ratio", 0.0, 2.0),
    param(Pid::O2Sensor2WideRangeCurrent, "o2_s2_wr_current", O2_WIDE_RANGE_CURRENT, "ratio", 0.0, 2.0),
    param(Pid::O2Sensor3WideRangeCurrent, "o2_s3_wr_current", O2_WIDE_RANGE_CURRENT, "ratio", 0.0, 2.0),
    param(Pid::O2Sensor4WideRangeCurrent, "o2_s4_wr_current", O2_WIDE_RANGE_CURRENT, "ratio", 0.0, 2.0),
    param(Pid::O2Sensor5WideRangeCurrent, "o2_s5_wr_current", O2_WIDE_RANGE_CURRENT, "ratio", 0.0, 2.0),
    param(Pid::O2Sensor6WideRangeCurrent, "o2_s6_wr_current", O2_WIDE_RANGE_CURRENT, "ratio", 0.0, 2.0),
    param(Pid::O2Sensor7WideRangeCurrent, "o2_s7_wr_current", O2_WIDE_RANGE_CURRENT, "ratio", 0.0, 2.0),
    param(Pid::O2Sensor8WideRangeCurrent, "o2_s8_wr_current", O2_WIDE_RANGE_CURRENT, "ratio", 0.0, 2.0),
    param(Pid::CatalystTempBank1Sensor1, "catalyst_temp_b1s1", CATALYST_TEMPERATURE, "°C", -40.0, 6513.5),
    param(Pid::CatalystTempBank2Sensor1, "catalyst_temp_b2s1", CATALYST_TEMPERATURE, "°C", -40.0, 6513.5),
    param(Pid::CatalystTempBank1Sensor2, "catalyst_temp_b1s2", CATALYST_TEMPERATURE, "°C", -40.0, 6513.5),
    param(Pid::CatalystTempBank2Sensor2, "catalyst_temp_b2s2", CATALYST_TEMPERATURE, "°C", -40.0, 6513.5),
    param(Pid::ControlModuleVoltage, "control_module_voltage", Decoder::Word(Scale::new(1.0, 1000.0, 0.0)), "V", 0.0, 65.535),
    param(Pid::AbsoluteLoad, "absolute_load", Decoder::Word(PERCENT), "%", 0.0, 25700.0),
    param(Pid::CommandedEquivalenceRatio, "commanded_equivalence_ratio", Decoder::Word(EQUIVALENCE_RATIO), "ratio", 0.0, 2.0),
    param(Pid::RelativeThrottlePosition, "relative_throttle_position", Decoder::Byte(PERCENT), "%", 0.0, 100.0),
    param(Pid::AmbientAirTemp, "ambient_air_temp", Decoder::Byte(TEMPERATURE), "°C", -40.0, 215.0),
    param(Pid::AbsoluteThrottlePositionB, "absolute_throttle_position_b", Decoder::Byte(PERCENT), "%", 0.0, 100.0),
    param(Pid::AbsoluteThrottlePositionC, "absolute_throttle_position_c", Decoder::Byte(PERCENT), "%", 0.0, 100.0),
    param(Pid::AcceleratorPedalPositionD, "accelerator_pedal_position_d", Decoder::Byte(PERCENT), "%", 0.0, 100.0),
    param(Pid::AcceleratorPedalPositionE, "accelerator_pedal_position_e", Decoder::Byte(PERCENT), "%", 0.0, 100.0),
    param(Pid::AcceleratorPedalPositionF, "accelerator_pedal_position_f", Decoder::Byte(PERCENT), "%", 0.0, 100.0),
    param(Pid::CommandedThrottleActuator, "commanded_throttle_actuator", Decoder::Byte(PERCENT), "%", 0.0, 100.0),
];

/// Response from a PID query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    /// The PID that was queried
    pub pid: u8,
    pub name: &'static str,
    /// Timestamp when the response was received (Unix ms)
    pub timestamp_ms: u64,
    /// Decoded value
    pub value: PhysicalValue,
    pub unit: &'static str,
    /// Raw bytes from the response
    pub raw_bytes: Vec<u8>,
}

impl Reading {
    /// Decode `raw_bytes` with the descriptor of `pid`.
    ///
    /// Returns `None` when the payload is narrower than the descriptor width.
    pub fn decode(pid: Pid, raw_bytes: Vec<u8>, timestamp_ms: u64) -> Option<Self> {
        let descriptor = pid.descriptor();
        let value = descriptor.decode(&raw_bytes)?;
        Some(Self {
            pid: pid.as_hex(),
            name: descriptor.name,
            timestamp_ms,
            value,
            unit: descriptor.unit,
            raw_bytes,
        })
    }
}
