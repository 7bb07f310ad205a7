//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters and the simulated board.  All tests run on the
//! host with no real hardware required.

mod command_tests;
mod mock_hw;
mod pipeline_tests;
mod scheduler_tests;
