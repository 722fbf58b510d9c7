pub mod cli;
pub mod config;
pub mod gpt;
pub mod repl;
pub mod store;
