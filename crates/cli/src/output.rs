// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output rendering helpers.

use clap::ValueEnum;
use herd_core::{Execution, Message, MessageKind, SessionSummary};
use serde_json::Value;

#[derive(Clone, Copy, Debug, Default, PartialEq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Format milliseconds-since-epoch as relative time ("5s", "2m", "1h").
pub fn format_time_ago(epoch_ms: u64) -> String {
    if epoch_ms == 0 {
        return "-".to_string();
    }
    let now_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    let secs = now_ms.saturating_sub(epoch_ms) / 1000;
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86_400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86_400)
    }
}

/// Render one streamed message for a terminal consumer.
///
/// Text content goes to stdout verbatim; everything else gets a tagged
/// single line. Returns false for kinds the text renderer skips.
pub fn render_message(msg: &Message, format: OutputFormat) -> bool {
    if format == OutputFormat::Json {
        println!("{}", msg.canonical());
        return true;
    }
    match msg.kind {
        MessageKind::Text => {
            if let Some(content) = msg.payload.get("content").and_then(Value::as_str) {
                println!("{content}");
            }
            true
        }
        MessageKind::ToolUse => {
            let tool = msg.payload.get("name").and_then(Value::as_str).unwrap_or("?");
            println!("[tool] {tool}");
            true
        }
        MessageKind::Error => {
            let reason = msg.payload.get("reason").and_then(Value::as_str).unwrap_or("error");
            eprintln!("[error] {reason}");
            true
        }
        MessageKind::System => {
            if let Some(text) = msg.payload.get("text").and_then(Value::as_str) {
                eprintln!("[agent] {text}");
            }
            true
        }
        MessageKind::Complete => true,
        _ => false,
    }
}

pub fn print_session_row(summary: &SessionSummary) {
    println!(
        "{:<38} {:<10} {:<12} {:>8} {:>10} {:>10}",
        summary.id,
        summary.state,
        summary.workspace_id,
        summary.stats.command_count,
        format_time_ago(summary.created_at_ms),
        format_time_ago(summary.last_active_at_ms),
    );
}

pub fn print_session_header() {
    println!(
        "{:<38} {:<10} {:<12} {:>8} {:>10} {:>10}",
        "SESSION", "STATE", "WORKSPACE", "CMDS", "CREATED", "ACTIVE"
    );
}

pub fn print_execution_row(exec: &Execution) {
    let error = exec.first_error.as_ref().map(|e| e.message.as_str()).unwrap_or("-");
    println!(
        "{:<38} {:<10} {:>6.0}% {:>8} {:>10} {}",
        exec.id,
        exec.status,
        exec.progress * 100.0,
        exec.message_count,
        format_time_ago(exec.started_at_ms),
        error,
    );
}

pub fn print_execution_header() {
    println!(
        "{:<38} {:<10} {:>7} {:>8} {:>10} {}",
        "EXECUTION", "STATUS", "PROG", "MSGS", "STARTED", "ERROR"
    );
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
