mod executor;
mod policy;

pub use executor::{ExecError, ExecutionResult, SandboxedExecutor};
pub use policy::{CommandPolicy, PolicyNotice, PolicyViolation};
