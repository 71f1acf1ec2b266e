//! Parser for the Prometheus text exposition format (version 0.0.4).
//!
//! Only sample lines are of interest here: `# HELP` / `# TYPE` comments and
//! blank lines are skipped. A sample line is
//!
//! ```text
//! metric_name{label="value",other="v\"q"} 1.25 1700000000000
//! ```
//!
//! where the label block and the trailing millisecond timestamp are optional.

use std::fmt::Write as _;

use indexmap::IndexMap;
use tracing::debug;

/// One sample line of the exposition.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    /// Label pairs in order of first appearance; a repeated label keeps the last value.
    pub labels: IndexMap<String, String>,
    pub value: f64,
    pub timestamp_ms: Option<i64>,
}

impl Sample {
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }

    /// Renders the sample back into a single exposition line.
    pub fn to_line(&self) -> String {
        let mut line = self.name.clone();
        if !self.labels.is_empty() {
            line.push('{');
            for (i, (k, v)) in self.labels.iter().enumerate() {
                if i > 0 {
                    line.push(',');
                }
                let _ = write!(line, "{k}=\"{}\"", escape_label_value(v));
            }
            line.push('}');
        }
        let _ = write!(line, " {}", format_value(self.value));
        if let Some(ts) = self.timestamp_ms {
            let _ = write!(line, " {ts}");
        }
        line
    }
}

/// Parses every sample line of `text`, skipping comments, blank lines and
/// lines that do not follow the grammar.
pub fn parse_exposition(text: &str) -> impl Iterator<Item = Sample> + '_ {
    text.lines().enumerate().filter_map(|(i, line)| {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }
        let sample = parse_sample_line(trimmed);
        if sample.is_none() {
            debug!(line_no = i + 1, line = trimmed, "skipping unparseable exposition line");
        }
        sample
    })
}

/// Parses a single exposition line. Returns `None` for comments, blank lines
/// and anything malformed.
pub fn parse_sample_line(line: &str) -> Option<Sample> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let mut cur = Cursor::new(line);
    let name = cur.ident(is_metric_start, is_metric_char)?.to_string();

    let mut labels = IndexMap::new();
    cur.skip_ws();
    if cur.eat('{') {
        loop {
            cur.skip_ws();
            if cur.eat('}') {
                break;
            }
            let key = cur.ident(is_label_start, is_label_char)?;
            cur.skip_ws();
            if !cur.eat('=') {
                return None;
            }
            cur.skip_ws();
            let value = cur.quoted()?;
            labels.insert(key.to_string(), value);
            cur.skip_ws();
            if cur.eat(',') {
                continue;
            }
            if cur.eat('}') {
                break;
            }
            return None;
        }
    }

    cur.skip_ws();
    let value = parse_value(cur.token()?)?;
    cur.skip_ws();
    let timestamp_ms = match cur.token() {
        Some(tok) => Some(tok.parse::<i64>().ok()?),
        None => None,
    };
    cur.skip_ws();
    if !cur.at_end() {
        return None;
    }

    Some(Sample {
        name,
        labels,
        value,
        timestamp_ms,
    })
}

pub fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

fn parse_value(token: &str) -> Option<f64> {
    match token {
        "+Inf" | "Inf" => Some(f64::INFINITY),
        "-Inf" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        other => other.parse().ok(),
    }
}

fn is_metric_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == ':'
}

fn is_metric_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == ':'
}

fn is_label_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_label_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.pos += 1;
        }
    }

    fn ident(&mut self, first: fn(char) -> bool, rest: fn(char) -> bool) -> Option<&'a str> {
        let start = self.pos;
        match self.peek() {
            Some(c) if first(c) => self.pos += c.len_utf8(),
            _ => return None,
        }
        while let Some(c) = self.peek().filter(|c| rest(*c)) {
            self.pos += c.len_utf8();
        }
        Some(&self.src[start..self.pos])
    }

    fn quoted(&mut self) -> Option<String> {
        if !self.eat('"') {
            return None;
        }
        let mut out = String::new();
        loop {
            match self.bump()? {
                '"' => return Some(out),
                '\\' => match self.bump()? {
                    'n' => out.push('\n'),
                    other => out.push(other),
                },
                c => out.push(c),
            }
        }
    }

    /// Next run of non-whitespace characters, if any.
    fn token(&mut self) -> Option<&'a str> {
        let start = self.pos;
        while let Some(c) = self.peek().filter(|c| !c.is_whitespace()) {
            self.pos += c.len_utf8();
        }
        if self.pos > start {
            Some(&self.src[start..self.pos])
        } else {
            None
        }
    }
}
