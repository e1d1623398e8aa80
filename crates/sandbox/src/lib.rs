//! Deterministic replay sandbox for model-written tool programs.
//!
//! A program that calls tool functions is executed in a fresh QuickJS
//! context with one interceptor installed per declared tool. Tool results
//! are never computed here; instead the engine replays the program against
//! the ordered tool-state accumulated so far:
//!
//! - a call answered by a `resolved` entry resolves with that result;
//! - a call answered by a `rejected` entry rejects with that error;
//! - a call past the end of the state records a fresh `pending` entry and
//!   aborts the pass with a control rejection.
//!
//! The outcome of a pass is `success` (the program's `main` resolved),
//! `error` (a genuine runtime failure of the program), or `partial` (new
//! pending tool calls for the client to answer). Replays are deterministic:
//! the same code and tool-state always classify the same way, up to the
//! opaque identifiers minted for new pending entries.
//!
//! The crate also carries the tool-to-TypeScript projector that feeds the
//! system prompt ([`typegen`]) and the JSON service surface for running the
//! sandbox out of process ([`service`]).

mod cursor;
mod engine;
mod error;

pub mod service;
pub mod typegen;

pub use engine::{evaluate, EngineConfig, DEFAULT_MEMORY_LIMIT};
pub use error::{Error, Result};
pub use typegen::RUN_TYPESCRIPT;
