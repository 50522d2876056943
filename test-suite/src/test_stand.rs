//! The test stand, as seen by the test cases


use std::{
    sync::{
        Mutex,
        MutexGuard,
    },
    time::Duration,
};

use host_lib::{
    firmware::Sample,
    measure::MeasureError,
    profiler::ProfilerSampleError,
    test_stand::{
        Session,
        SessionCloseError,
        SessionInitError,
    },
};
use lazy_static::lazy_static;
use log::debug;

use super::dut::WifiShell;


/// States the device under test walks through during a measurement sequence
///
/// The states build on each other in declaration order. A test that needs
/// the device in a given state checks the ladder and fails if the earlier
/// tests didn't get it there.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum DutState {
    /// Freshly booted; the radio hasn't been used
    RadioOff,

    /// A scan has run
    Scanned,

    /// Connected to the access point
    Connected,

    /// A TWT flow has been negotiated
    TwtActive,

    /// The TWT flows have been torn down again
    TwtTornDown,
}


/// The hardware session, plus how far the device has come
struct SuiteSession {
    session: Session,
    state:   DutState,
}


/// An instance of the test stand
///
/// Used to access all resources that a test case requires.
pub struct TestStand {
    guard: MutexGuard<'static, Option<SuiteSession>>,
}

impl TestStand {
    /// Initializes the test stand
    ///
    /// The first test to call this sets up the hardware session: it claims
    /// the profiler, powers the device and flashes `sample`. Every later
    /// call in the same test binary reuses that session, so the device
    /// keeps whatever state earlier tests left it in.
    pub fn new(sample: Sample) -> Result<Self, TestStandInitError> {
        // By default, Rust runs tests in parallel on multiple threads. This
        // can be controlled through a command-line argument and an
        // environment variable, but there doesn't seem to be a way to
        // configure this in `Cargo.toml` or a configuration file.
        //
        // Let's just use a mutex here to prevent our tests from running in
        // parallel. The returned guard will be stored as a field, meaning
        // the mutex will be held until this struct is dropped. Concurrent
        // instantiations of this method will block here, until the
        // `TestStand` instance holding the mutex has been dropped.
        lazy_static! {
            static ref SESSION: Mutex<Option<SuiteSession>> = Mutex::new(None);
        }

        let _ = env_logger::builder().is_test(true).try_init();

        // A poisoned mutex means another test failed, not that the hardware
        // session became unusable. Keep using it.
        let mut guard = match SESSION.lock() {
            Ok(guard)     => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if guard.is_none() {
            let session = Session::set_up(sample)
                .map_err(|err| TestStandInitError(err))?;

            *guard = Some(
                SuiteSession {
                    session,
                    state: DutState::RadioOff,
                }
            );
        }

        Ok(
            Self {
                guard,
            }
        )
    }

    /// The Wi-Fi shell of the device under test
    pub fn wifi(&mut self) -> WifiShell {
        WifiShell::new(self.session_mut().session.console())
    }

    /// Measure the mean current over the given window, in microamps
    ///
    /// `label` tags the trace plot of the window.
    pub fn measure(&mut self, duration: Duration, label: &str)
        -> Result<f64, MeasureError<ProfilerSampleError>>
    {
        self.session_mut().session.measure(duration, label)
    }

    /// The highest state the device has reached in this session
    pub fn state(&self) -> DutState {
        self.session().state
    }

    /// Record that the device has reached a state
    ///
    /// The ladder only moves forward; recording an earlier state is a no-op.
    pub fn mark_state(&mut self, state: DutState) {
        let session = self.session_mut();

        if state > session.state {
            debug!("Device reached state {:?}", state);
            session.state = state;
        }
    }

    /// Check that earlier tests have brought the device to at least `state`
    pub fn require_state(&self, state: DutState)
        -> Result<(), PrerequisiteError>
    {
        let reached = self.state();

        if reached >= state {
            Ok(())
        }
        else {
            Err(
                PrerequisiteError {
                    required: state,
                    reached,
                }
            )
        }
    }

    /// Close the hardware session
    ///
    /// Cuts power to the device and collects the trace plots. Meant to be
    /// called by the last test of the sequence; the next [`TestStand::new`]
    /// after this sets up a fresh session.
    pub fn close_session(mut self) -> Result<(), SessionCloseError> {
        if let Some(suite_session) = self.guard.take() {
            suite_session.session.close()?;
        }

        Ok(())
    }

    fn session(&self) -> &SuiteSession {
        // The slot is filled in `new`, before `Self` is constructed.
        self.guard.as_ref()
            .expect("test stand session not initialized")
    }

    fn session_mut(&mut self) -> &mut SuiteSession {
        // The slot is filled in `new`, before `Self` is constructed.
        self.guard.as_mut()
            .expect("test stand session not initialized")
    }
}


/// Error initializing the test stand
#[derive(Debug)]
pub struct TestStandInitError(pub SessionInitError);


/// A required device state was never reached
///
/// Means a test that depends on an earlier test in the sequence ran without
/// that test having succeeded.
#[derive(Debug)]
pub struct PrerequisiteError {
    pub required: DutState,
    pub reached:  DutState,
}
