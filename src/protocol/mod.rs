//! UCI protocol handling.
//!
//! Serialization of the commands the evaluator sends to an engine and
//! parsing of the lines the engine writes back.

pub mod command;
pub mod response;

pub use command::{parse_command, Command, GoParams, START_FEN};
pub use response::{parse_response, Bound, Info, Response, Score};
