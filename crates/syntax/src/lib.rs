//! Syntax support for the JavaScript subset instrumented by adana: tree, lexer, parser and
//! printer.

#[macro_use]
extern crate tracing;

pub mod ast;
pub mod error;
pub mod lexer;
pub mod loc;
pub mod parser;
pub mod printer;

pub use error::{ParseError, ParseResult};
pub use loc::{LineIndex, Loc, NodeId, Position};
pub use parser::{parse, Parser};
pub use printer::{print, PrintOptions};
