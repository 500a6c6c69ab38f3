pub mod resolver;
pub mod template;

pub use resolver::{resolve, CallDescriptor};
pub use template::{render, VariableMap};
