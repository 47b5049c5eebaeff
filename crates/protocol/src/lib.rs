//! Textual call protocol for Cartwise.
//!
//! Models that can only emit free text request tools with a single line:
//! `FUNCTION_CALL: name|key=value|...` or finish with `FINAL_ANSWER: text`.
//! This crate converts those lines to and from structured values.

pub mod codec;
pub mod literal;

pub use codec::{
    ANSWER_PREFIX, CALL_PREFIX, CallCodec, ProtocolLine, SegmentPolicy, decode, encode,
    encode_answer,
};
pub use literal::{parse_literal, render_literal};
