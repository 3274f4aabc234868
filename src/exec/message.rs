// src/exec/message.rs

//! The one-line result message a child build writes to stdout.
//!
//! ```text
//! @@yesbuild:report {"outputs":[...],"delta":12.5,"task_count":1,...}
//! ```

use crate::errors::Result;
use crate::report::Report;

pub const REPORT_PREFIX: &str = "@@yesbuild:report ";

pub fn encode_report(report: &Report) -> Result<String> {
    Ok(format!("{REPORT_PREFIX}{}", serde_json::to_string(report)?))
}

/// `None` if `line` is ordinary output.
pub fn decode_line(line: &str) -> Option<serde_json::Result<Report>> {
    let payload = line.trim_end().strip_prefix(REPORT_PREFIX)?;
    Some(serde_json::from_str(payload))
}
