//! Keeps a conversation list and one open conversation in sync with a chat
//! server, merging paginated history with live pushes.

pub mod app;
pub mod cli;
pub mod domain;
pub mod gateway;
pub mod infra;
pub mod ui;
pub mod usecases;

#[cfg(test)]
mod test_support;
