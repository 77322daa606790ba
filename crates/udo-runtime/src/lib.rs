pub mod descriptor;
pub mod entry;
pub mod implementation;
pub mod instance;
mod macros;
pub mod registration;
pub mod validation;

pub use descriptor::*;
pub use implementation::*;
pub use instance::*;
pub use registration::*;
pub use validation::*;

pub use udo_core;
