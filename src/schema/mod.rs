pub mod schema;
pub mod vocabulary;
