// Core modules: tokenizing, cursor state, filtering, and error modeling.
pub mod config;
pub mod cursor;
pub mod error;
pub mod filter;
pub mod reader;
pub mod writer;
