//! Building, flashing, and resetting the firmware of the device under test
//!
//! Shells out to the Zephyr tooling. Nothing structured is consumed from
//! these tools; all that matters is whether they succeed.


use std::{
    io,
    path::{
        Path,
        PathBuf,
    },
    process::{
        Command,
        ExitStatus,
    },
};

use log::debug;


/// The board the firmware samples are built for
pub const BOARD: &str = "nrf7002dk_nrf5340_cpuapp";


/// The Wi-Fi shell sample
pub const WIFI_SHELL: Sample = Sample("wifi/shell");

/// The Wi-Fi TWT sample
pub const WIFI_TWT: Sample = Sample("wifi/twt");


/// A firmware sample that the test stand can put on the device
///
/// The samples live in the nRF tree, which is checked out next to the
/// Zephyr tree.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Sample(&'static str);

impl Sample {
    /// The source directory of this sample
    pub fn source_dir(&self, zephyr_base: &Path) -> PathBuf {
        zephyr_base
            .join("..")
            .join("nrf")
            .join("samples")
            .join(self.0)
    }
}


/// Build a firmware sample
pub fn build(zephyr_base: &Path, sample: Sample) -> Result<(), FirmwareError> {
    run(build_command(zephyr_base, sample))
}

/// Flash the previously built firmware to the device
pub fn flash() -> Result<(), FirmwareError> {
    let mut command = Command::new("west");
    command.arg("flash");

    run(command)
}

/// Reset the device
pub fn reset() -> Result<(), FirmwareError> {
    let mut command = Command::new("nrfjprog");
    command.arg("--reset");

    run(command)
}


fn build_command(zephyr_base: &Path, sample: Sample) -> Command {
    let mut command = Command::new("west");
    command
        .arg("build")
        .arg(sample.source_dir(zephyr_base))
        .arg("-b")
        .arg(BOARD);

    command
}

fn run(mut command: Command) -> Result<(), FirmwareError> {
    debug!("Running {:?}", command);

    let status = command.status()
        .map_err(|err| FirmwareError::Spawn(err))?;

    if !status.success() {
        return Err(
            FirmwareError::Failed {
                command: format!("{:?}", command),
                status,
            }
        );
    }

    Ok(())
}


/// Error running one of the firmware tools
#[derive(Debug)]
pub enum FirmwareError {
    /// The tool could not be started
    ///
    /// Usually means it isn't installed or not on the `PATH`.
    Spawn(io::Error),

    /// The tool ran, but reported failure
    Failed {
        command: String,
        status:  ExitStatus,
    },
}


#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{
        build_command,
        Sample,
        BOARD,
        WIFI_SHELL,
        WIFI_TWT,
    };


    #[test]
    fn samples_should_be_located_relative_to_the_zephyr_tree() {
        let dir = WIFI_SHELL.source_dir(Path::new("/repos/zephyr"));

        assert_eq!(
            dir,
            Path::new("/repos/zephyr/../nrf/samples/wifi/shell"),
        );
    }

    #[test]
    fn build_should_name_the_sample_and_the_board() {
        let command = build_command(Path::new("/repos/zephyr"), WIFI_TWT);

        assert_eq!(command.get_program(), "west");

        let args: Vec<_> = command.get_args().collect();
        assert_eq!(args[0], "build");
        assert_eq!(args[1], Path::new("/repos/zephyr/../nrf/samples/wifi/twt"));
        assert_eq!(args[2], "-b");
        assert_eq!(args[3], BOARD);
    }

    #[test]
    fn samples_should_compare_by_path() {
        assert_eq!(WIFI_SHELL, Sample("wifi/shell"));
        assert_ne!(WIFI_SHELL, WIFI_TWT);
    }
}
