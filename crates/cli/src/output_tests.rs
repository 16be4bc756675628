// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use herd_core::SessionId;
use serde_json::json;

fn msg(payload: serde_json::Value) -> Message {
    let raw_len = payload.to_string().len();
    Message::from_wire(SessionId::parse("ses-o"), 1, 1000, payload, raw_len)
}

#[yare::parameterized(
    text      = { json!({"type":"text","content":"hi"}), true },
    tool_use  = { json!({"type":"tool_use","name":"bash"}), true },
    error     = { json!({"type":"error","reason":"oops"}), true },
    system    = { json!({"type":"system","text":"warn"}), true },
    complete  = { json!({"type":"complete"}), true },
    progress  = { json!({"type":"progress","progress":0.5}), false },
    status    = { json!({"type":"status"}), false },
    metadata  = { json!({"type":"metadata"}), false },
)]
fn text_renderer_kind_selection(payload: serde_json::Value, rendered: bool) {
    assert_eq!(render_message(&msg(payload), OutputFormat::Text), rendered);
}

#[test]
fn json_format_renders_everything() {
    assert!(render_message(&msg(json!({"type":"progress","progress":0.1})), OutputFormat::Json));
}

#[test]
fn time_ago_buckets() {
    let now_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64;
    assert_eq!(format_time_ago(0), "-");
    assert_eq!(format_time_ago(now_ms - 5_000), "5s");
    assert_eq!(format_time_ago(now_ms - 120_000), "2m");
    assert_eq!(format_time_ago(now_ms - 7_200_000), "2h");
}
