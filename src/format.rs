use std::collections::BTreeMap;
use std::fmt::Write;

use crate::rate::Sample;

/// Backslash-escape whitespace, `=` and `,` so the value survives the line
/// protocol's tokenizer.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch.is_whitespace() || ch == '=' || ch == ',' {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// One output line for a measured process:
/// `<measurement>[,tag=value]*,process_name=<name> pcpu=..,pmem=..,n_proc=..i`
pub fn render_line(
    measurement: &str,
    tags: &BTreeMap<String, String>,
    process_name: &str,
    sample: &Sample,
) -> String {
    let mut out = String::from(measurement);
    for (key, value) in tags {
        let _ = write!(out, ",{}={}", escape(key), escape(value));
    }
    let _ = write!(
        out,
        ",process_name={} pcpu={:.3},pmem={:.3},n_proc={}i",
        escape(process_name),
        sample.cpu,
        sample.memory,
        sample.process_count
    );
    out
}
