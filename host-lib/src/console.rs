//! Serial console of the device under test


use std::{
    io,
    thread,
    time::{
        Duration,
        Instant,
    },
};

use serialport::{
    self,
    SerialPort,
};

use crate::Error;


/// Baud rate of the console
///
/// This is hardcoded, as all firmware samples the test stand flashes
/// configure their console this way.
const BAUD_RATE: u32 = 115200;


/// The serial console of the device under test
///
/// The firmware samples expose a line-based shell on this port. The shell
/// doesn't frame its replies in any way, so the only way to read a response
/// is to collect everything that arrives within some window of time.
pub struct Console {
    port:           Box<dyn SerialPort>,
    drain_interval: Duration,
}

impl Console {
    /// Open the console
    ///
    /// `path` is the path to the serial device file. `read_timeout` bounds
    /// individual reads, `drain_interval` is how long [`Console::collect`]
    /// sleeps between drains of the receive buffer.
    pub fn new(path: &str, read_timeout: Duration, drain_interval: Duration)
        -> Result<Self, ConsoleInitError>
    {
        let port = serialport::new(path, BAUD_RATE)
            .timeout(read_timeout)
            .open()
            .map_err(|err| ConsoleInitError(err))?;

        Ok(
            Self {
                port,
                drain_interval,
            }
        )
    }

    /// Send a shell command to the device
    ///
    /// Appends the line ending the shell expects. The reply, if any, has to
    /// be picked up with [`Console::collect`].
    pub fn send_command(&mut self, command: &str)
        -> Result<(), ConsoleSendError>
    {
        self.send_command_inner(command)
            .map_err(|err| ConsoleSendError(err))
    }

    fn send_command_inner(&mut self, command: &str) -> Result<(), io::Error> {
        self.port.write_all(command.as_bytes())?;
        self.port.write_all(b"\r\n")?;
        self.port.flush()?;

        Ok(())
    }

    /// Collect everything the device prints within the given window
    ///
    /// Returns once the window has elapsed, regardless of how much data
    /// arrived. Invalid UTF-8 is replaced, not rejected, as the console
    /// occasionally garbles a byte right after reset.
    pub fn collect(&mut self, window: Duration)
        -> Result<String, ConsoleReadError>
    {
        self.collect_inner(window)
            .map_err(|err| ConsoleReadError(err))
    }

    fn collect_inner(&mut self, window: Duration) -> Result<String, Error> {
        let mut output = Vec::new();
        let     start  = Instant::now();

        while start.elapsed() < window {
            thread::sleep(self.drain_interval);

            while self.port.bytes_to_read()? > 0 {
                let mut buf = [0; 256];

                let len = self.port.read(&mut buf)?;
                output.extend_from_slice(&buf[..len]);
            }
        }

        Ok(String::from_utf8_lossy(&output).into_owned())
    }
}


/// Error opening the console
#[derive(Debug)]
pub struct ConsoleInitError(pub serialport::Error);

/// Error sending a command through the console
#[derive(Debug)]
pub struct ConsoleSendError(pub io::Error);

/// Error collecting output from the console
#[derive(Debug)]
pub struct ConsoleReadError(pub Error);
