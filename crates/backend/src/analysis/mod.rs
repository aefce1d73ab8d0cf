pub mod ast_visitor;
pub mod report;
