use anyhow::{bail, Result};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SLICE_RE: Regex = Regex::new(r"^(-?\d+)(?::(\d+)?)?$").unwrap();
    static ref LOG_PREFIX_RE: Regex =
        Regex::new(r"^\d{4}-\d{2}-\d{2}T[\d:.]+Z\s+(?:stdout|stderr):\s?").unwrap();
}

/// `start[:count]` window over log lines. A negative start counts from the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSlice {
    pub start: i64,
    pub count: Option<usize>,
}

impl LogSlice {
    pub fn parse(s: &str) -> Result<Self> {
        let Some(caps) = SLICE_RE.captures(s.trim()) else {
            bail!("Invalid slice argument. Examples are 2, 1:3, -1, -1:1.");
        };
        let start = caps[1].parse()?;
        let count = caps.get(2).map(|m| m.as_str().parse()).transpose()?;
        Ok(Self { start, count })
    }

    pub fn apply<'a>(&self, lines: &'a [String]) -> &'a [String] {
        let len = lines.len() as i64;
        let from = if self.start < 0 { (len + self.start).max(0) } else { self.start.min(len) };
        let rest = &lines[from as usize..];
        match self.count {
            Some(n) => &rest[..n.min(rest.len())],
            None => rest,
        }
    }
}

/// Drop the `<timestamp> stdout|stderr:` prefix the platform puts on each line.
pub fn strip_prefix(line: &str) -> &str {
    match LOG_PREFIX_RE.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}

/// Pretty JSON when the line parses as JSON, the raw line otherwise.
pub fn format_json_line(line: &str) -> String {
    serde_json::from_str::<serde_json::Value>(line)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("line {i}")).collect()
    }

    #[test]
    fn test_parse_slice_forms() {
        assert_eq!(LogSlice::parse("2").unwrap(), LogSlice { start: 2, count: None });
        assert_eq!(LogSlice::parse("2:").unwrap(), LogSlice { start: 2, count: None });
        assert_eq!(LogSlice::parse("-1").unwrap(), LogSlice { start: -1, count: None });
        assert_eq!(LogSlice::parse("1:3").unwrap(), LogSlice { start: 1, count: Some(3) });
        assert_eq!(LogSlice::parse("-3:1").unwrap(), LogSlice { start: -3, count: Some(1) });
        for bad in ["", "a", "1:-2", "1:2:3", "--1"] {
            assert!(LogSlice::parse(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_apply_slice() {
        let all = lines(5);
        assert_eq!(LogSlice { start: 1, count: Some(2) }.apply(&all), &all[1..3]);
        assert_eq!(LogSlice { start: -2, count: None }.apply(&all), &all[3..]);
        assert_eq!(LogSlice { start: -10, count: Some(1) }.apply(&all), &all[..1]);
        assert!(LogSlice { start: 9, count: None }.apply(&all).is_empty());
        assert_eq!(LogSlice { start: 4, count: Some(10) }.apply(&all), &all[4..]);
    }

    #[test]
    fn test_strip_prefix() {
        assert_eq!(strip_prefix("2024-05-01T10:11:12.123456789Z stdout: hello world"), "hello world");
        assert_eq!(strip_prefix("2024-05-01T10:11:12.1Z  stderr: oops"), "oops");
        assert_eq!(strip_prefix("no prefix here"), "no prefix here");
    }

    #[test]
    fn test_format_json_line() {
        assert_eq!(format_json_line(r#"{"a":1}"#), "{\n  \"a\": 1\n}");
        assert_eq!(format_json_line("not json"), "not json");
    }
}
