//! CSV command scripts in, one outcome row per command out.

pub mod command_reader;
pub mod outcome_writer;
