//! Boyer-Moore literal search
//!
//! A simplified Boyer-Moore with a bad-character table only, folded
//! through an upper-case table when the search is case-insensitive:
//! the ASCII table for UTF-8 buffers (so multibyte sequences are never
//! mangled) and the Latin-1 table for 8-bit buffers.

use crate::character::{ASCII_UP_CASE, LATIN1_UP_CASE};
use crate::encoding::Encoding;

/// A compiled literal pattern: the pattern bytes and the skip table
/// for one direction.
pub struct LiteralProgram {
    pub pattern: Vec<u8>,
    table: [usize; 256],
    pub back: bool,
    pub case_sensitive: bool,
    up: &'static [u8; 256],
}

impl LiteralProgram {
    pub fn compile(pattern: &[u8], back: bool, case_sensitive: bool, encoding: Encoding) -> LiteralProgram {
        let up: &'static [u8; 256] = if encoding == Encoding::Utf8 {
            &ASCII_UP_CASE
        } else {
            &LATIN1_UP_CASE
        };
        let conv = |c: u8| if case_sensitive { c } else { up[c as usize] };
        let m = pattern.len();
        let mut table = [m; 256];
        if back {
            for i in (1..m).rev() {
                table[conv(pattern[i]) as usize] = i;
            }
        } else {
            for i in 0..m.saturating_sub(1) {
                table[conv(pattern[i]) as usize] = m - i - 1;
            }
        }
        LiteralProgram {
            pattern: pattern.to_vec(),
            table,
            back,
            case_sensitive,
            up,
        }
    }

    fn conv(&self, c: u8) -> u8 {
        if self.case_sensitive {
            c
        } else {
            self.up[c as usize]
        }
    }

    /// Scans one line forward starting with the pattern end aligned at
    /// byte `start + m - 1`; returns the match start.
    pub fn scan_forward(&self, line: &[u8], start: i64) -> Option<usize> {
        let m = self.pattern.len();
        if line.len() < m {
            return None;
        }
        let last = self.conv(self.pattern[m - 1]);
        let mut p = start + m as i64 - 1;
        while p >= 0 && (p as usize) < line.len() {
            let c = self.conv(line[p as usize]);
            if c != last {
                p += self.table[c as usize] as i64;
            } else {
                let mut i = 1;
                while i < m {
                    if self.conv(line[p as usize - i]) != self.conv(self.pattern[m - i - 1]) {
                        break;
                    }
                    i += 1;
                }
                if i == m {
                    return Some(p as usize - m + 1);
                }
                p += self.table[c as usize] as i64;
            }
        }
        None
    }

    /// Scans one line backward with the pattern start aligned at most
    /// at byte `start`; returns the match start.
    pub fn scan_backward(&self, line: &[u8], start: i64) -> Option<usize> {
        let m = self.pattern.len();
        if line.len() < m {
            return None;
        }
        let first = self.conv(self.pattern[0]);
        let mut p = start.min(line.len() as i64 - m as i64);
        while p >= 0 {
            let c = self.conv(line[p as usize]);
            if c != first {
                p -= self.table[c as usize] as i64;
            } else {
                let mut i = 1;
                while i < m {
                    if self.conv(line[p as usize + i]) != self.conv(self.pattern[i]) {
                        break;
                    }
                    i += 1;
                }
                if i == m {
                    return Some(p as usize);
                }
                p -= self.table[c as usize] as i64;
            }
        }
        None
    }
}
