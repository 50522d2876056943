//! The Wi-Fi shell of the device under test
//!
//! The firmware samples expose the Zephyr shell with the Wi-Fi command set
//! on the device's console. The shell doesn't frame its replies; a command
//! is paired with a wait window, and its outcome is classified by scanning
//! the transcript for the marker the firmware prints.


use std::time::Duration;

use host_lib::console::{
    Console,
    ConsoleReadError,
    ConsoleSendError,
};
use log::debug;


/// Default window to wait for a command's output
const DEFAULT_COMMAND_WINDOW: Duration = Duration::from_secs(1);

/// Window to wait for the connect flow to finish
///
/// Covers association plus DHCP against a real access point.
const CONNECT_WINDOW: Duration = Duration::from_secs(10);

/// Window to wait for the TWT negotiation to finish
const TWT_SETUP_WINDOW: Duration = Duration::from_secs(3);

/// Marker the supplicant prints once a connection is up
const CONNECTED_MARKER: &str = "CTRL-EVENT-CONNECTED";

/// Marker printed when the access point accepts a TWT flow
const TWT_ACCEPT_MARKER: &str = "TWT accept";

/// Marker printed when the TWT flows were torn down
const TWT_TEARDOWN_MARKER: &str = "success";


/// The Wi-Fi shell of the device under test
///
/// Borrows the device's console from the test stand for the duration of one
/// command exchange.
pub struct WifiShell<'r> {
    console: &'r mut Console,
}

impl<'r> WifiShell<'r> {
    pub(crate) fn new(console: &'r mut Console) -> Self {
        Self {
            console,
        }
    }

    /// Trigger a network scan
    ///
    /// The scan table the firmware prints is returned but not interpreted;
    /// the tests only care that the radio is scanning.
    pub fn scan(&mut self) -> Result<String, WifiCommandError> {
        self.command("wifi scan", DEFAULT_COMMAND_WINDOW)
    }

    /// Connect to the network stored in the device's credential storage
    pub fn connect_stored(&mut self)
        -> Result<ConnectResponse, WifiCommandError>
    {
        let transcript = self.command("wifi_cred auto_connect", CONNECT_WINDOW)?;

        Ok(classify_connect(&transcript))
    }

    /// Negotiate a TWT flow with the access point
    ///
    /// `wake_us` is the requested wake duration, `interval_us` the requested
    /// wake interval, both in microseconds.
    pub fn twt_quick_setup(&mut self, wake_us: u32, interval_us: u32)
        -> Result<TwtSetupResponse, WifiCommandError>
    {
        let command = format!("wifi twt quick_setup {} {}", wake_us, interval_us);
        let transcript = self.command(&command, TWT_SETUP_WINDOW)?;

        Ok(classify_twt_setup(&transcript))
    }

    /// Tear down all negotiated TWT flows
    pub fn twt_teardown_all(&mut self)
        -> Result<TwtTeardownResponse, WifiCommandError>
    {
        let transcript = self.command("wifi twt teardown_all", DEFAULT_COMMAND_WINDOW)?;

        Ok(classify_twt_teardown(&transcript))
    }

    /// Collect whatever the firmware logs within the given window
    pub fn collect_log(&mut self, window: Duration)
        -> Result<String, WifiCommandError>
    {
        let log = self.console.collect(window)?;
        debug!("Device log: {:?}", log);

        Ok(log)
    }

    fn command(&mut self, command: &str, window: Duration)
        -> Result<String, WifiCommandError>
    {
        debug!("Sending shell command: {}", command);
        self.console.send_command(command)?;

        let transcript = self.console.collect(window)?;
        debug!("Shell transcript: {:?}", transcript);

        Ok(transcript)
    }
}


/// The device's response to a connect request
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectResponse {
    /// The connection marker appeared in the transcript
    Connected,

    /// The window elapsed without the connection marker
    NoConfirmation,
}

/// The device's response to a TWT setup request
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TwtSetupResponse {
    /// The access point accepted the flow
    Accepted,

    /// The window elapsed without an acceptance
    NoConfirmation,
}

/// The device's response to a TWT teardown request
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TwtTeardownResponse {
    /// The flows were torn down
    TornDown,

    /// The window elapsed without a confirmation
    NoConfirmation,
}


/// Classify the transcript of a connect request
pub fn classify_connect(transcript: &str) -> ConnectResponse {
    if transcript.contains(CONNECTED_MARKER) {
        ConnectResponse::Connected
    }
    else {
        ConnectResponse::NoConfirmation
    }
}

/// Classify the transcript of a TWT setup request
pub fn classify_twt_setup(transcript: &str) -> TwtSetupResponse {
    if transcript.contains(TWT_ACCEPT_MARKER) {
        TwtSetupResponse::Accepted
    }
    else {
        TwtSetupResponse::NoConfirmation
    }
}

/// Classify the transcript of a TWT teardown request
pub fn classify_twt_teardown(transcript: &str) -> TwtTeardownResponse {
    if transcript.contains(TWT_TEARDOWN_MARKER) {
        TwtTeardownResponse::TornDown
    }
    else {
        TwtTeardownResponse::NoConfirmation
    }
}


/// Error running a shell command on the device
#[derive(Debug)]
pub enum WifiCommandError {
    /// Sending the command failed
    Send(ConsoleSendError),

    /// Collecting the output failed
    Read(ConsoleReadError),
}

impl From<ConsoleSendError> for WifiCommandError {
    fn from(err: ConsoleSendError) -> Self {
        Self::Send(err)
    }
}

impl From<ConsoleReadError> for WifiCommandError {
    fn from(err: ConsoleReadError) -> Self {
        Self::Read(err)
    }
}


#[cfg(test)]
mod tests {
    use super::{
        classify_connect,
        classify_twt_setup,
        classify_twt_teardown,
        ConnectResponse,
        TwtSetupResponse,
        TwtTeardownResponse,
    };


    #[test]
    fn connect_should_be_recognized_inside_surrounding_log_noise() {
        let transcript = "\
            uart:~$ wifi_cred auto_connect\n\
            [00:00:12.345,678] <inf> wpa_supp: wlan0: \
            CTRL-EVENT-CONNECTED - Connection to aa:bb:cc:dd:ee:ff completed\n\
        ";

        assert_eq!(classify_connect(transcript), ConnectResponse::Connected);
    }

    #[test]
    fn connect_should_not_be_assumed_from_an_empty_transcript() {
        assert_eq!(classify_connect(""), ConnectResponse::NoConfirmation);
    }

    #[test]
    fn a_disconnect_event_should_not_count_as_connected() {
        let transcript =
            "CTRL-EVENT-DISCONNECTED bssid=aa:bb:cc:dd:ee:ff reason=3";

        assert_eq!(
            classify_connect(transcript),
            ConnectResponse::NoConfirmation,
        );
    }

    #[test]
    fn twt_setup_should_only_accept_an_accept() {
        assert_eq!(
            classify_twt_setup("TWT response: TWT accept\n"),
            TwtSetupResponse::Accepted,
        );
        assert_eq!(
            classify_twt_setup("TWT response: TWT reject\n"),
            TwtSetupResponse::NoConfirmation,
        );
    }

    #[test]
    fn twt_teardown_should_require_a_confirmation() {
        assert_eq!(
            classify_twt_teardown("TWT teardown success\n"),
            TwtTeardownResponse::TornDown,
        );
        assert_eq!(
            classify_twt_teardown("uart:~$\n"),
            TwtTeardownResponse::NoConfirmation,
        );
    }
}
