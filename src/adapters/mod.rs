//! Adapters: concrete implementations behind the embedded-hal traits and
//! the port traits.
//!
//! | Adapter | Implements                         | Connects to              |
//! |---------|------------------------------------|--------------------------|
//! | `sim`   | OutputPin, SetDutyCycle, DelayNs   | In-memory host board     |
//! |         | FrequencyControl                   |                          |
//! | `time`  | (none)                             | Monotonic clock          |

pub mod sim;
pub mod time;
