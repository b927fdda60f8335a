pub mod ast;
pub mod native;
pub mod translator;
pub mod types;
