mod vm;
pub use vm::*;

mod frame;
pub use frame::*;

mod stack;
pub use stack::*;
