pub mod app;
pub mod cli;
pub mod config;
pub mod context;
pub mod gallery;
pub mod navigation;
pub mod output;
pub mod runner;

#[cfg(test)]
mod tests;
