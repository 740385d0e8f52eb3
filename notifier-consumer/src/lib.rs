pub mod config;
pub mod decoder;
pub mod manager;
pub mod pipeline;
pub mod retention;
pub mod retry;

#[cfg(test)]
mod testing;
