//! # vcon – command-line front end
//!
//! Turns one invocation into one verb against a [`vcon_vsphere::Session`].
//!
//! ## Modules
//!
//! - **cli** – Argument and subcommand definitions
//! - **config** – `~/.vcon.yaml`, precedence and credential prompting
//! - **error** – Application error and exit codes
//! - **input** – Positional text from stdin, a file, or the literal
//! - **logging** – Subscriber setup
//! - **naming** – `{{ Func "arg" }}` name templates
//! - **output** – JSON / YAML rendering
//! - **commands** – One handler per verb

pub mod cli;
pub mod config;
pub mod error;
pub mod input;
pub mod logging;
pub mod naming;
pub mod output;
pub mod commands;
