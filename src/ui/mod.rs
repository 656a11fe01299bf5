//! Text presentation for the command line.

pub mod conversation_list;
pub mod transcript;
