pub mod filesystem;
pub mod index;
pub mod loader;
pub mod parser;
pub mod pipeline;
