use std::io;


pub type Result<T = ()> = core::result::Result<T, Error>;


/// Low-level error shared by this library's modules
///
/// The operations in this library wrap this in their own error types, so
/// callers can tell which operation failed. This type only shows up in the
/// fields of those wrapper types.
#[derive(Debug)]
pub enum Error {
    /// An I/O error occured
    Io(io::Error),

    /// An error originated from the serial port
    Serial(serialport::Error),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serialport::Error> for Error {
    fn from(err: serialport::Error) -> Self {
        Self::Serial(err)
    }
}
