//! Progress plumbing shared by the monitor and the worker.

mod gate;
mod throttle;

pub use gate::ProgressGate;
pub use throttle::ProgressThrottle;
