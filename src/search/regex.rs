//! Regular-expression search with three-encoding awareness
//!
//! The pattern is compiled once per (pattern, case, encoding) tuple.
//! UTF-8 buffers compile with Unicode semantics, so `.`, `\W` and
//! complemented classes can never split a multibyte sequence; 8-bit
//! and ASCII buffers compile byte-wise with bytes ≥ 0x80 escaped to
//! `\xNN` form so they stay byte literals.

use regex::bytes::{Regex, RegexBuilder};

use crate::encoding::Encoding;
use crate::error::{Result, Status};

/// A compiled regex program plus the flags it was built under.
pub struct RegexProgram {
    pub re: Regex,
    pub case_sensitive: bool,
    pub encoding_class: bool,
    pub pattern: Vec<u8>,
}

/// The capture registers of the last successful regex match,
/// byte-relative to the line it was found on.
#[derive(Debug, Clone, Default)]
pub struct MatchRegisters {
    pub groups: Vec<Option<(usize, usize)>>,
}

impl MatchRegisters {
    pub fn whole(&self) -> (usize, usize) {
        self.groups[0].expect("group 0 always participates")
    }
}

/// Rewrites bytes ≥ 0x80 outside escapes into `\xNN` so a byte-wise
/// compile treats them as single-byte literals.
fn escape_high_bytes(pattern: &[u8]) -> String {
    let mut out = String::with_capacity(pattern.len());
    for &b in pattern {
        if b < 0x80 {
            out.push(b as char);
        } else {
            out.push_str(&format!("\\x{b:02X}"));
        }
    }
    out
}

impl RegexProgram {
    pub fn compile(pattern: &[u8], case_sensitive: bool, encoding: Encoding) -> Result<RegexProgram> {
        let unicode = encoding == Encoding::Utf8;
        let source = if unicode {
            std::str::from_utf8(pattern)
                .map_err(|_| Status::IncompatibleSearchStringEncoding)?
                .to_string()
        } else {
            escape_high_bytes(pattern)
        };

        let re = RegexBuilder::new(&source)
            .unicode(unicode)
            .case_insensitive(!case_sensitive)
            .build()
            .map_err(|e| {
                log::debug!("regex compile failed: {e}");
                match e {
                    regex::Error::Syntax(_) => Status::SyntaxError,
                    _ => Status::Error,
                }
            })?;

        Ok(RegexProgram {
            re,
            case_sensitive,
            encoding_class: unicode,
            pattern: pattern.to_vec(),
        })
    }

    /// Leftmost match starting at or after `start`.
    pub fn scan_forward(&self, line: &[u8], start: usize) -> Option<MatchRegisters> {
        if start > line.len() {
            return None;
        }
        self.re.captures_at(line, start).map(registers)
    }

    /// Last match starting at or before `limit`.
    pub fn scan_backward(&self, line: &[u8], limit: usize) -> Option<MatchRegisters> {
        let mut best = None;
        let mut at = 0;
        while at <= line.len() {
            let Some(caps) = self.re.captures_at(line, at) else {
                break;
            };
            let m = caps.get(0).expect("group 0");
            if m.start() > limit {
                break;
            }
            let (s, e) = (m.start(), m.end());
            best = Some(registers(caps));
            at = if e > s { e } else { s + 1 };
        }
        best
    }
}

fn registers(caps: regex::bytes::Captures) -> MatchRegisters {
    MatchRegisters {
        groups: caps
            .iter()
            .map(|m| m.map(|mm| (mm.start(), mm.end())))
            .collect(),
    }
}
