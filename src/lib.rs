//! Natural-language shell assistant: translate a request into a shell
//! command with a local model, classify its risk, confirm, run it in a
//! persistent working directory and keep a history.

pub mod alias;
pub mod commands;
pub mod config;
pub mod error;
pub mod executor;
pub mod history;
pub mod llm;
pub mod parser;
pub mod safety;
pub mod session;
pub mod translator;
pub mod types;
pub mod ui;
pub mod worker;
