//! Library to support the Wi-Fi power test stand, running on the host
//! computer
//!
//! The test stand consists of a power profiler and a development kit. The
//! profiler sources the kit's supply voltage and measures the current drawn
//! from it; the kit runs the firmware sample under test and takes commands
//! over its serial console. This library provides the pieces the test
//! suites are built from: drivers for both bench resources, the window
//! measurement logic, and the session that ties them together.


pub mod config;
pub mod console;
pub mod error;
pub mod firmware;
pub mod measure;
pub mod plot;
pub mod profiler;
pub mod test_stand;


pub use self::{
    config::Config,
    console::Console,
    error::{
        Error,
        Result,
    },
    measure::{
        MeasureError,
        Measurement,
        SampleSource,
        ToleranceBand,
    },
    profiler::Profiler,
    test_stand::Session,
};
