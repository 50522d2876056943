//! The library code that supports this test suite
//!
//! The generally usable parts of the test stand live in `host-lib`; this
//! crate adds what is specific to power-measuring the Wi-Fi samples: the
//! shell command set of the device under test, and the session sharing
//! between the tests of one sequence.


pub mod dut;
pub mod error;
pub mod test_stand;


pub use self::{
    error::{
        Error,
        Result,
    },
    test_stand::TestStand,
};
