use host_lib::{
    measure::MeasureError,
    profiler::ProfilerSampleError,
    test_stand::SessionCloseError,
};

use super::{
    dut::WifiCommandError,
    test_stand::{
        PrerequisiteError,
        TestStandInitError,
    },
};


/// Result type specific to this test suite
pub type Result<T = ()> = std::result::Result<T, Error>;


/// Error type specific to this test suite
#[derive(Debug)]
pub enum Error {
    Measure(MeasureError<ProfilerSampleError>),
    Prerequisite(PrerequisiteError),
    SessionClose(SessionCloseError),
    TestStandInit(TestStandInitError),
    WifiCommand(WifiCommandError),
}

impl From<MeasureError<ProfilerSampleError>> for Error {
    fn from(err: MeasureError<ProfilerSampleError>) -> Self {
        Self::Measure(err)
    }
}

impl From<PrerequisiteError> for Error {
    fn from(err: PrerequisiteError) -> Self {
        Self::Prerequisite(err)
    }
}

impl From<SessionCloseError> for Error {
    fn from(err: SessionCloseError) -> Self {
        Self::SessionClose(err)
    }
}

impl From<TestStandInitError> for Error {
    fn from(err: TestStandInitError) -> Self {
        Self::TestStandInit(err)
    }
}

impl From<WifiCommandError> for Error {
    fn from(err: WifiCommandError) -> Self {
        Self::WifiCommand(err)
    }
}
