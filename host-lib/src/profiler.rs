//! Driver for the power profiler
//!
//! Implements the subset of the Power Profiler Kit 2's serial protocol that
//! the test stand needs: selecting source-meter mode, setting the source
//! voltage, toggling power to the device under test, and streaming current
//! samples. The profiler reports raw ADC frames; decoding them requires the
//! per-device calibration modifiers, which are read from the device once
//! when it is opened.


use std::{
    io,
    thread,
    time::{
        Duration,
        Instant,
    },
};

use log::debug;
use serialport::{
    self,
    SerialPort,
    SerialPortType,
};

use crate::{
    measure::SampleSource,
    Error,
};


/// USB vendor ID the profiler enumerates with
const USB_VID: u16 = 0x1915;

/// USB product ID the profiler enumerates with
const USB_PID: u16 = 0xc00a;

/// Product string the profiler enumerates with
const USB_PRODUCT: &str = "PPK2";

/// Baud rate of the profiler's port
///
/// The port is CDC-ACM, so the rate is nominal.
const BAUD_RATE: u32 = 9600;

/// Timeout of individual reads from the profiler
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// How long to wait for the calibration metadata before giving up
const METADATA_TIMEOUT: Duration = Duration::from_secs(2);

/// Terminator of the calibration metadata
const METADATA_END: &str = "END";

// Opcodes of the profiler's serial protocol
const CMD_AVERAGE_START:      u8 = 0x06;
const CMD_AVERAGE_STOP:       u8 = 0x07;
const CMD_DEVICE_RUNNING_SET: u8 = 0x0c;
const CMD_REGULATOR_SET:      u8 = 0x0d;
const CMD_SET_POWER_MODE:     u8 = 0x11;
const CMD_GET_META_DATA:      u8 = 0x19;

/// Power mode argument that selects the built-in source meter
const POWER_MODE_SOURCE_METER: u8 = 0x02;

/// Lowest voltage the source regulator supports, in millivolts
const VDD_MIN_MV: u16 = 800;

/// Highest voltage the source regulator supports, in millivolts
const VDD_MAX_MV: u16 = 5000;

/// Length of one sample frame, in bytes
const FRAME_LEN: usize = 4;

/// Scale factor from ADC counts to amperes, before calibration
const ADC_MULT: f64 = 1.8 / 163840.;


/// The power profiler
///
/// Sources voltage to the device under test and streams the current it
/// draws. One instance owns the profiler's serial port for as long as it
/// lives.
pub struct Profiler {
    port:    Box<dyn SerialPort>,
    decoder: SampleDecoder,
}

impl Profiler {
    /// List the serial ports of all attached profilers
    ///
    /// Profilers are recognized by their USB identity.
    pub fn list_devices() -> Result<Vec<String>, ProfilerListError> {
        let ports = serialport::available_ports()
            .map_err(|err| ProfilerListError(err))?;

        let mut devices = Vec::new();
        for port in ports {
            if let SerialPortType::UsbPort(usb) = &port.port_type {
                if is_profiler(usb.vid, usb.pid, usb.product.as_deref()) {
                    devices.push(port.port_name.clone());
                }
            }
        }

        Ok(devices)
    }

    /// Open a profiler
    ///
    /// `path` is the path to the serial device file, normally one of the
    /// entries returned by [`Profiler::list_devices`].
    pub fn new(path: &str) -> Result<Self, ProfilerInitError> {
        let port = serialport::new(path, BAUD_RATE)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|err| ProfilerInitError(err))?;

        Ok(
            Self {
                port,
                decoder: SampleDecoder::new(),
            }
        )
    }

    /// Read the calibration modifiers from the profiler
    ///
    /// Must be called before samples are decoded. Modifiers the device
    /// doesn't report keep their uncalibrated defaults.
    pub fn read_modifiers(&mut self) -> Result<(), ProfilerMetadataError> {
        self.read_modifiers_inner()
            .map_err(|err| ProfilerMetadataError(err))
    }

    fn read_modifiers_inner(&mut self) -> Result<(), Error> {
        self.write_command(&[CMD_GET_META_DATA])?;

        let mut blob  = Vec::new();
        let     start = Instant::now();

        loop {
            let available = self.port.bytes_to_read()? as usize;
            if available > 0 {
                let offset = blob.len();
                blob.resize(offset + available, 0);
                self.port.read_exact(&mut blob[offset..])?;
            }

            let text = String::from_utf8_lossy(&blob);
            if text.contains(METADATA_END) {
                self.decoder.modifiers = Modifiers::parse(&text);
                debug!("Profiler modifiers: {:?}", self.decoder.modifiers);

                return Ok(());
            }

            if start.elapsed() > METADATA_TIMEOUT {
                return Err(io::Error::from(io::ErrorKind::TimedOut).into());
            }

            thread::sleep(Duration::from_millis(50));
        }
    }

    /// Select source-meter mode
    ///
    /// In this mode the profiler powers the device under test itself and
    /// measures the current drawn from that supply.
    pub fn use_source_meter(&mut self) -> Result<(), ProfilerCommandError> {
        self.write_command(&[CMD_SET_POWER_MODE, POWER_MODE_SOURCE_METER])
            .map_err(|err| ProfilerCommandError(err))
    }

    /// Set the voltage sourced to the device under test
    ///
    /// The value is clamped to the range the regulator supports. The voltage
    /// enters the calibration polynomial, so it has to be set before samples
    /// are decoded.
    pub fn set_source_voltage(&mut self, millivolts: u16)
        -> Result<(), ProfilerCommandError>
    {
        let millivolts = millivolts.clamp(VDD_MIN_MV, VDD_MAX_MV);

        self.write_command(&regulator_command(millivolts))
            .map_err(|err| ProfilerCommandError(err))?;
        self.decoder.source_voltage_mv = millivolts;

        Ok(())
    }

    /// Switch power to the device under test on
    pub fn power_on(&mut self) -> Result<(), ProfilerCommandError> {
        self.write_command(&[CMD_DEVICE_RUNNING_SET, 1])
            .map_err(|err| ProfilerCommandError(err))
    }

    /// Switch power to the device under test off
    pub fn power_off(&mut self) -> Result<(), ProfilerCommandError> {
        self.write_command(&[CMD_DEVICE_RUNNING_SET, 0])
            .map_err(|err| ProfilerCommandError(err))
    }

    fn write_command(&mut self, command: &[u8]) -> Result<(), io::Error> {
        self.port.write_all(command)?;
        self.port.flush()?;

        Ok(())
    }

    fn read_chunk(&mut self) -> Result<Vec<u8>, Error> {
        let available = self.port.bytes_to_read()? as usize;
        if available == 0 {
            return Ok(Vec::new());
        }

        let mut chunk = vec![0; available];
        self.port.read_exact(&mut chunk)?;

        Ok(chunk)
    }
}

impl SampleSource for Profiler {
    type Error = ProfilerSampleError;

    fn start_sampling(&mut self) -> Result<(), Self::Error> {
        self.decoder.pending.clear();

        self.write_command(&[CMD_AVERAGE_START])
            .map_err(|err| ProfilerSampleError(err.into()))
    }

    fn take_samples(&mut self) -> Result<Vec<f64>, Self::Error> {
        let chunk = self.read_chunk()
            .map_err(|err| ProfilerSampleError(err))?;

        Ok(self.decoder.decode(&chunk))
    }

    fn stop_sampling(&mut self) -> Result<(), Self::Error> {
        self.write_command(&[CMD_AVERAGE_STOP])
            .map_err(|err| ProfilerSampleError(err.into()))
    }
}


/// Decoder for the profiler's sample stream
///
/// Keeps the calibration state, plus a partial trailing frame between
/// chunks. The stream is a plain sequence of 4-byte frames and chunk
/// boundaries fall wherever the USB transfers happen to cut it.
#[derive(Debug)]
struct SampleDecoder {
    modifiers:         Modifiers,
    source_voltage_mv: u16,
    pending:           Vec<u8>,
}

impl SampleDecoder {
    fn new() -> Self {
        Self {
            modifiers:         Modifiers::default(),
            source_voltage_mv: 0,
            pending:           Vec::new(),
        }
    }

    /// Decode a chunk of raw sample bytes into currents, in microamps
    fn decode(&mut self, chunk: &[u8]) -> Vec<f64> {
        self.pending.extend_from_slice(chunk);

        let mut samples = Vec::with_capacity(self.pending.len() / FRAME_LEN);
        let mut offset  = 0;

        while offset + FRAME_LEN <= self.pending.len() {
            let frame = u32::from_le_bytes([
                self.pending[offset],
                self.pending[offset + 1],
                self.pending[offset + 2],
                self.pending[offset + 3],
            ]);
            samples.push(self.decode_frame(frame));

            offset += FRAME_LEN;
        }

        self.pending.drain(..offset);

        samples
    }

    /// Convert one sample frame into a current, in microamps
    ///
    /// The frame carries a 14-bit ADC reading and the 3-bit measurement
    /// range it was taken in. The range selects the calibration modifiers
    /// to apply.
    fn decode_frame(&self, frame: u32) -> f64 {
        let adc   = f64::from((frame & 0x3fff) * 4);
        let range = ((frame >> 14) & 0x7).min(4) as usize;

        let m   = &self.modifiers;
        let vdd = f64::from(self.source_voltage_mv) / 1000.;

        let without_gain = (adc - m.o[range]) * (ADC_MULT / m.r[range]);
        let amps = m.ug[range]
            * (without_gain * (m.gs[range] * without_gain + m.gi[range])
                + (m.s[range] * vdd + m.i[range]));

        amps * 1e6
    }
}


/// Per-range calibration modifiers of a profiler
///
/// Each modifier has one value per measurement range. The defaults are the
/// values assumed for an uncalibrated device; a real device reports its own
/// in its metadata.
#[derive(Clone, Debug)]
struct Modifiers {
    r:  [f64; 5],
    gs: [f64; 5],
    gi: [f64; 5],
    o:  [f64; 5],
    s:  [f64; 5],
    i:  [f64; 5],
    ug: [f64; 5],
}

impl Modifiers {
    /// Parse the metadata blob the profiler sends
    ///
    /// The blob is a sequence of `KEY: value` pairs, terminated by `END`.
    /// Unknown keys, and values that fail to parse, are skipped; the
    /// affected modifiers keep their defaults.
    fn parse(text: &str) -> Self {
        let mut modifiers = Self::default();

        let tokens: Vec<&str> = text.split_whitespace().collect();
        for pair in tokens.windows(2) {
            let key = match pair[0].strip_suffix(':') {
                Some(key) => key,
                None      => continue,
            };
            let value = match pair[1].parse::<f64>() {
                Ok(value) => value,
                Err(_)    => continue,
            };
            let (name, index) = match split_key(key) {
                Some(parsed) => parsed,
                None         => continue,
            };

            if index >= 5 {
                continue;
            }

            let slot = match name {
                "R"  => &mut modifiers.r,
                "GS" => &mut modifiers.gs,
                "GI" => &mut modifiers.gi,
                "O"  => &mut modifiers.o,
                "S"  => &mut modifiers.s,
                "I"  => &mut modifiers.i,
                "UG" => &mut modifiers.ug,
                _    => continue,
            };
            slot[index] = value;
        }

        modifiers
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Self {
            r:  [1031.64, 101.65, 10.15, 0.94, 0.043],
            gs: [1.; 5],
            gi: [1.; 5],
            o:  [0.; 5],
            s:  [0.; 5],
            i:  [0.; 5],
            ug: [1.; 5],
        }
    }
}


/// Whether a USB device's identity matches the profiler
fn is_profiler(vid: u16, pid: u16, product: Option<&str>) -> bool {
    let matches_ids     = vid == USB_VID && pid == USB_PID;
    let matches_product = product
        .map(|product| product.contains(USB_PRODUCT))
        .unwrap_or(false);

    matches_ids || matches_product
}

/// Build the regulator command for an already clamped voltage
fn regulator_command(millivolts: u16) -> [u8; 3] {
    let [high, low] = millivolts.to_be_bytes();

    [CMD_REGULATOR_SET, high, low]
}

/// Split a metadata key like `R0` into its name and range index
fn split_key(key: &str) -> Option<(&str, usize)> {
    let index = key.chars().last()?.to_digit(10)?;
    let name  = &key[..key.len() - 1];

    Some((name, index as usize))
}


/// Error listing the attached profilers
#[derive(Debug)]
pub struct ProfilerListError(pub serialport::Error);

/// Error opening the profiler
#[derive(Debug)]
pub struct ProfilerInitError(pub serialport::Error);

/// Error sending a control command to the profiler
#[derive(Debug)]
pub struct ProfilerCommandError(pub io::Error);

/// Error reading the calibration metadata from the profiler
#[derive(Debug)]
pub struct ProfilerMetadataError(pub Error);

/// Error in the sampling path of the profiler
#[derive(Debug)]
pub struct ProfilerSampleError(pub Error);
