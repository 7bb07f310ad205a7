//! Named thread spawning for the pipeline's long-lived loops and the
//! short-lived handler tasks.
//!
//! Every background unit of execution in the crate goes through
//! [`spawn_named`] so thread names and stack budgets stay in one place
//! and spawn failures surface as [`Error::Init`] instead of a panic.

use std::thread::JoinHandle;

use crate::error::{Error, Result};

/// Stack budget for the bus dispatch loop.
pub const DISPATCH_STACK_KB: usize = 32;
/// Stack budget for one handler invocation.
pub const HANDLER_STACK_KB: usize = 64;
/// Stack budget for the scheduler drain loop.
pub const DRAIN_STACK_KB: usize = 32;
/// Stack budget for the ranging/sampling loop.
pub const SAMPLER_STACK_KB: usize = 32;

/// Role of a spawned thread, used for naming and log context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRole {
    /// Bus dispatch loop (one per bus).
    Dispatch,
    /// One handler invocation for one event.
    Handler,
    /// Scheduler drain timer.
    Drain,
    /// Periodic ranging caller.
    Sampler,
}

impl TaskRole {
    fn stack_kb(self) -> usize {
        match self {
            Self::Dispatch => DISPATCH_STACK_KB,
            Self::Handler => HANDLER_STACK_KB,
            Self::Drain => DRAIN_STACK_KB,
            Self::Sampler => SAMPLER_STACK_KB,
        }
    }
}

/// Spawn a named thread with the stack budget for `role`.
pub fn spawn_named<F>(role: TaskRole, name: String, f: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let stack_kb = role.stack_kb();
    if role != TaskRole::Handler {
        log::info!("Spawning '{}' ({:?}, stack={}KB)", name, role, stack_kb);
    }

    std::thread::Builder::new()
        .name(name)
        .stack_size(stack_kb * 1024)
        .spawn(f)
        .map_err(|e| {
            log::error!("spawn_named: {:?} thread creation failed: {}", role, e);
            Error::Init("thread creation failed")
        })
}
