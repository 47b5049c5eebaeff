//! `cartwise parse`: decode one protocol line and print it as JSON.

use cartwise_protocol::{CallCodec, ProtocolLine, SegmentPolicy};
use serde_json::{Value, json};

pub fn run(line: &str, strict: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(&to_json(line, strict)?)?);
    Ok(())
}

fn to_json(line: &str, strict: bool) -> Result<Value, cartwise_core::error::CallError> {
    let policy = if strict {
        SegmentPolicy::Abort
    } else {
        SegmentPolicy::Skip
    };
    Ok(match CallCodec::new(policy).parse_line(line)? {
        ProtocolLine::Call { name, arguments } => json!({
            "tool_name": name,
            "arguments": arguments,
        }),
        ProtocolLine::FinalAnswer(answer) => json!({ "final_answer": answer }),
    })
}
