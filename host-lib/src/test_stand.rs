//! The hardware session of the test stand
//!
//! A session owns the two bench resources, the power profiler and the
//! device's serial console, and knows how to bring the device into a
//! defined state: powered by the profiler, running freshly flashed
//! firmware. Test suites hold one session per test run and drive their
//! measurements through it.


use std::{
    fs,
    io,
    path::Path,
    thread,
    time::Duration,
};

use log::{
    debug,
    error,
};

use crate::{
    config::{
        Config,
        ConfigReadError,
    },
    console::{
        Console,
        ConsoleInitError,
    },
    firmware::{
        self,
        FirmwareError,
        Sample,
    },
    measure::{
        self,
        MeasureError,
        MonotonicClock,
    },
    plot,
    profiler::{
        Profiler,
        ProfilerCommandError,
        ProfilerInitError,
        ProfilerListError,
        ProfilerMetadataError,
        ProfilerSampleError,
    },
};


/// Directory the trace plots are moved to when a session closes
pub const RESULTS_DIR: &str = "test_results";

/// Prefix of the trace plots, one per measurement window
const PLOT_PREFIX: &str = "current_samples_";


/// One hardware session of the test stand
pub struct Session {
    config:   Config,
    profiler: Profiler,
    console:  Console,
}

impl Session {
    /// Set up a session
    ///
    /// Reads the configuration, claims the one attached profiler, powers
    /// the device under test from it, then builds and flashes the given
    /// firmware sample and waits for the device to boot. Any failure along
    /// the way aborts the setup; there is no partial session.
    pub fn set_up(sample: Sample) -> Result<Self, SessionInitError> {
        let config = Config::read()?;

        // Plots left over from a previous run must not get mixed into this
        // run's results.
        let _ = fs::remove_dir_all(RESULTS_DIR);

        let devices = Profiler::list_devices()?;
        if devices.len() != 1 {
            return Err(SessionInitError::ProfilerCount(devices));
        }
        debug!("Found power profiler at {}", devices[0]);

        let mut profiler = Profiler::new(&config.ppk_port)?;
        profiler.read_modifiers()?;
        profiler.use_source_meter()?;
        profiler.set_source_voltage(config.tunables.source_voltage_mv)?;

        debug!("Powering the device under test");
        profiler.power_on()?;

        debug!("Building and flashing {:?}", sample);
        firmware::build(&config.zephyr_base, sample)?;
        firmware::flash()?;
        firmware::reset()?;

        let console = Console::new(
            &config.dk_port,
            config.tunables.serial_read_timeout(),
            config.tunables.serial_drain_interval(),
        )?;

        thread::sleep(config.tunables.boot_wait());

        Ok(
            Self {
                config,
                profiler,
                console,
            }
        )
    }

    /// The configuration the session was set up with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The serial console of the device under test
    pub fn console(&mut self) -> &mut Console {
        &mut self.console
    }

    /// Measure the mean current drawn over the given window
    ///
    /// Returns the mean in microamps. Also renders the trace of the window
    /// into `current_samples_<label>.svg`, for when the mean alone doesn't
    /// explain a failure. The plot is diagnostic; a render failure is
    /// logged, not returned.
    pub fn measure(&mut self, duration: Duration, label: &str)
        -> Result<f64, MeasureError<ProfilerSampleError>>
    {
        let mut clock = MonotonicClock;

        let measurement = measure::measure_window(
            &mut self.profiler,
            &mut clock,
            duration,
            self.config.tunables.sample_poll_interval(),
        )?;
        let mean_ua = measurement.mean_ua();
        debug!(
            "Collected {} samples over {:?}; average {} uA",
            measurement.samples().len(),
            duration,
            mean_ua,
        );

        let path = format!("{}{}.svg", PLOT_PREFIX, label);
        if let Err(err) = plot::render_trace(measurement.samples(), Path::new(&path)) {
            error!("Failed to render trace {}: {:?}", path, err);
        }

        Ok(mean_ua)
    }

    /// Close the session
    ///
    /// Cuts power to the device under test and moves the trace plots of
    /// this run into [`RESULTS_DIR`].
    pub fn close(mut self) -> Result<(), SessionCloseError> {
        debug!("Cutting power to the device under test");
        self.profiler.power_off()?;

        relocate_plots()?;

        Ok(())
    }
}


/// Move this run's trace plots into the results directory
fn relocate_plots() -> Result<(), io::Error> {
    fs::create_dir_all(RESULTS_DIR)?;

    for entry in fs::read_dir(".")? {
        let entry = entry?;

        let name = entry.file_name();
        let name = name.to_string_lossy();

        if name.starts_with(PLOT_PREFIX) && name.ends_with(".svg") {
            fs::rename(entry.path(), Path::new(RESULTS_DIR).join(&*name))?;
        }
    }

    Ok(())
}


/// Error setting up a session
#[derive(Debug)]
pub enum SessionInitError {
    Config(ConfigReadError),
    ProfilerList(ProfilerListError),

    /// Expected exactly one attached profiler
    ///
    /// Carries the ports of the profilers that were found.
    ProfilerCount(Vec<String>),

    ProfilerInit(ProfilerInitError),
    ProfilerMetadata(ProfilerMetadataError),
    ProfilerCommand(ProfilerCommandError),
    Firmware(FirmwareError),
    ConsoleInit(ConsoleInitError),
}

impl From<ConfigReadError> for SessionInitError {
    fn from(err: ConfigReadError) -> Self {
        Self::Config(err)
    }
}

impl From<ProfilerListError> for SessionInitError {
    fn from(err: ProfilerListError) -> Self {
        Self::ProfilerList(err)
    }
}

impl From<ProfilerInitError> for SessionInitError {
    fn from(err: ProfilerInitError) -> Self {
        Self::ProfilerInit(err)
    }
}

impl From<ProfilerMetadataError> for SessionInitError {
    fn from(err: ProfilerMetadataError) -> Self {
        Self::ProfilerMetadata(err)
    }
}

impl From<ProfilerCommandError> for SessionInitError {
    fn from(err: ProfilerCommandError) -> Self {
        Self::ProfilerCommand(err)
    }
}

impl From<FirmwareError> for SessionInitError {
    fn from(err: FirmwareError) -> Self {
        Self::Firmware(err)
    }
}

impl From<ConsoleInitError> for SessionInitError {
    fn from(err: ConsoleInitError) -> Self {
        Self::ConsoleInit(err)
    }
}


/// Error closing a session
#[derive(Debug)]
pub enum SessionCloseError {
    /// Cutting power to the device failed
    Profiler(ProfilerCommandError),

    /// Moving the trace plots into the results directory failed
    Io(io::Error),
}

impl From<ProfilerCommandError> for SessionCloseError {
    fn from(err: ProfilerCommandError) -> Self {
        Self::Profiler(err)
    }
}

impl From<io::Error> for SessionCloseError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}
