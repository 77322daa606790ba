pub mod abi;
pub mod definition;
pub mod error;
pub mod infra;
pub mod logging;
pub mod operation;
pub mod param;
pub mod tensor;

pub use abi::*;
pub use definition::*;
pub use error::*;
pub use infra::*;
pub use operation::*;
pub use param::*;
pub use tensor::*;
