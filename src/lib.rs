pub mod ast;
pub mod bytecode;
pub mod code;
pub mod compiler;
pub mod diagnostic;
pub mod format;
pub mod interpreter;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod token;
pub mod types;
pub mod vm;
