//! Test stand configuration


use std::{
    env,
    fs,
    io,
    path::PathBuf,
    time::Duration,
};

use serde::Deserialize;


/// Name of the environment variable that holds the profiler's port
pub const PPK_PORT_VAR: &str = "PPK_PORT";

/// Name of the environment variable that holds the device's console port
pub const DK_PORT_VAR: &str = "DK_PORT";

/// Name of the environment variable that holds the Zephyr tree root
pub const ZEPHYR_BASE_VAR: &str = "ZEPHYR_BASE";

/// Name of the optional tuning configuration file
pub const CONFIG_FILE: &str = "test-stand.toml";


/// The configuration of the test stand
///
/// The hardware identifiers come from environment variables, as the stand is
/// usually driven by CI jobs that pass them through. The timing and
/// electrical values come from the `test-stand.toml` file, if one is present
/// in the working directory.
#[derive(Debug)]
pub struct Config {
    /// Path to the serial port of the power profiler
    pub ppk_port: String,

    /// Path to the serial port of the development kit's console
    pub dk_port: String,

    /// Root of the Zephyr source tree, used to locate the firmware samples
    pub zephyr_base: PathBuf,

    /// Timing and electrical tuning values
    pub tunables: Tunables,
}

impl Config {
    /// Read the configuration from the environment and `test-stand.toml`
    pub fn read() -> Result<Self, ConfigReadError> {
        Self::read_inner(
            |name| env::var(name).ok(),
            read_config_file()?,
        )
    }

    fn read_inner(
        env_var:   impl Fn(&str) -> Option<String>,
        file:      Option<String>,
    )
        -> Result<Self, ConfigReadError>
    {
        let ppk_port = env_var(PPK_PORT_VAR)
            .ok_or(ConfigReadError::MissingVar(PPK_PORT_VAR))?;
        let dk_port = env_var(DK_PORT_VAR)
            .ok_or(ConfigReadError::MissingVar(DK_PORT_VAR))?;
        let zephyr_base = env_var(ZEPHYR_BASE_VAR)
            .ok_or(ConfigReadError::MissingVar(ZEPHYR_BASE_VAR))?;

        let tunables = match file {
            Some(file) => {
                toml::from_str(&file)
                    .map_err(|err| ConfigReadError::Parse(err))?
            }
            None => {
                Tunables::default()
            }
        };

        Ok(
            Self {
                ppk_port,
                dk_port,
                zephyr_base: PathBuf::from(zephyr_base),
                tunables,
            }
        )
    }
}


/// Timing and electrical tuning values
///
/// Every field has a default that matches what the measurement procedures
/// were tuned with, so the configuration file is optional and may set any
/// subset of them. None of these values encodes a protocol requirement.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct Tunables {
    /// Milliseconds slept between sample polls during a measurement window
    pub sample_poll_interval_ms: u64,

    /// Read timeout of the device's console, in milliseconds
    pub serial_read_timeout_ms: u64,

    /// Milliseconds slept between console drains while collecting output
    pub serial_drain_interval_ms: u64,

    /// Milliseconds to wait for the device to boot after it was flashed
    pub boot_wait_ms: u64,

    /// Voltage the profiler sources the device with, in millivolts
    pub source_voltage_mv: u16,
}

impl Tunables {
    pub fn sample_poll_interval(&self) -> Duration {
        Duration::from_millis(self.sample_poll_interval_ms)
    }

    pub fn serial_read_timeout(&self) -> Duration {
        Duration::from_millis(self.serial_read_timeout_ms)
    }

    pub fn serial_drain_interval(&self) -> Duration {
        Duration::from_millis(self.serial_drain_interval_ms)
    }

    pub fn boot_wait(&self) -> Duration {
        Duration::from_millis(self.boot_wait_ms)
    }
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            sample_poll_interval_ms:  10,
            serial_read_timeout_ms:   50,
            serial_drain_interval_ms: 100,
            boot_wait_ms:             2000,
            source_voltage_mv:        3300,
        }
    }
}


/// Read the tuning configuration file, if it exists
fn read_config_file() -> Result<Option<String>, ConfigReadError> {
    match fs::read_to_string(CONFIG_FILE) {
        Ok(file) => {
            Ok(Some(file))
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            Ok(None)
        }
        Err(err) => {
            Err(ConfigReadError::File(err))
        }
    }
}


/// Error reading the test stand configuration
#[derive(Debug)]
pub enum ConfigReadError {
    /// A required environment variable is not set
    MissingVar(&'static str),

    /// Error reading the tuning configuration file
    File(io::Error),

    /// Error parsing the tuning configuration file
    Parse(toml::de::Error),
}


#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{
        Config,
        ConfigReadError,
        Tunables,
    };


    fn env(vars: &[(&str, &str)]) -> HashMap<String, String> {
        vars.iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    fn read(vars: &HashMap<String, String>, file: Option<&str>)
        -> Result<Config, ConfigReadError>
    {
        Config::read_inner(
            |name| vars.get(name).cloned(),
            file.map(|file| file.to_string()),
        )
    }


    #[test]
    fn it_should_read_the_hardware_identifiers_from_the_environment() {
        let vars = env(&[
            ("PPK_PORT",    "/dev/ttyACM1"),
            ("DK_PORT",     "/dev/ttyACM2"),
            ("ZEPHYR_BASE", "/repos/zephyr"),
        ]);

        let config = read(&vars, None).unwrap();

        assert_eq!(config.ppk_port, "/dev/ttyACM1");
        assert_eq!(config.dk_port, "/dev/ttyACM2");
        assert_eq!(config.zephyr_base.to_str().unwrap(), "/repos/zephyr");
    }

    #[test]
    fn it_should_report_which_variable_is_missing() {
        let vars = env(&[
            ("PPK_PORT", "/dev/ttyACM1"),
        ]);

        let err = read(&vars, None).unwrap_err();

        assert!(matches!(err, ConfigReadError::MissingVar("DK_PORT")));
    }

    #[test]
    fn it_should_fall_back_to_default_tunables_without_a_file() {
        let vars = env(&[
            ("PPK_PORT",    "a"),
            ("DK_PORT",     "b"),
            ("ZEPHYR_BASE", "c"),
        ]);

        let config = read(&vars, None).unwrap();

        assert_eq!(config.tunables.sample_poll_interval_ms, 10);
        assert_eq!(config.tunables.serial_read_timeout_ms, 50);
        assert_eq!(config.tunables.serial_drain_interval_ms, 100);
        assert_eq!(config.tunables.boot_wait_ms, 2000);
        assert_eq!(config.tunables.source_voltage_mv, 3300);
    }

    #[test]
    fn it_should_let_the_file_override_a_subset_of_tunables() {
        let vars = env(&[
            ("PPK_PORT",    "a"),
            ("DK_PORT",     "b"),
            ("ZEPHYR_BASE", "c"),
        ]);
        let file = "\
            boot_wait_ms = 5000\n\
            source_voltage_mv = 1800\n\
        ";

        let config = read(&vars, Some(file)).unwrap();

        assert_eq!(config.tunables.boot_wait_ms, 5000);
        assert_eq!(config.tunables.source_voltage_mv, 1800);

        // Values the file doesn't mention keep their defaults.
        assert_eq!(config.tunables.sample_poll_interval_ms, 10);
        assert_eq!(config.tunables.serial_read_timeout_ms, 50);
    }

    #[test]
    fn it_should_reject_a_malformed_file() {
        let vars = env(&[
            ("PPK_PORT",    "a"),
            ("DK_PORT",     "b"),
            ("ZEPHYR_BASE", "c"),
        ]);

        let err = read(&vars, Some("boot_wait_ms = \"soon\"")).unwrap_err();

        assert!(matches!(err, ConfigReadError::Parse(_)));
    }

    #[test]
    fn default_tunables_should_convert_to_durations() {
        let tunables = Tunables::default();

        assert_eq!(tunables.sample_poll_interval().as_millis(), 10);
        assert_eq!(tunables.serial_read_timeout().as_millis(), 50);
        assert_eq!(tunables.serial_drain_interval().as_millis(), 100);
        assert_eq!(tunables.boot_wait().as_millis(), 2000);
    }
}
