//! The control core: per-variable controllers, the registry that builds them
//! from configuration, and the loop that drives them.

pub mod control_loop;
pub mod registry;
pub mod variable;

pub use control_loop::{ControlLoop, LoopError, LoopState, StopHandle};
pub use registry::{ControllerRegistry, RegistryError};
pub use variable::{ControlError, StrategyParams, VariableController};
