//! Macro streams: recording, optimization and the named-macro cache
//!
//! A macro is a stream of NUL-terminated command lines. Recording
//! appends one line per dispatched action; the optimizer folds runs of
//! printable `InsertChar` commands into a single `InsertString`, which
//! keeps saved macros readable. Playback itself lives in the executor,
//! which is the only module that can re-enter the dispatcher.

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::debug;

use crate::command::{parse_command_line, Action};
use crate::stream::CharStream;

/// Appends one action invocation to a recording stream, using long or
/// short command names depending on `verbose`. Comment no-ops keep
/// their text; unrecordable commands are skipped by the caller.
pub fn record_action(cs: &mut CharStream, a: Action, c: i64, p: Option<&str>, verbose: bool) {
    if a == Action::Nop {
        if let Some(text) = p.filter(|t| !t.is_empty()) {
            cs.append(text.as_bytes());
        }
        cs.append(&[0]);
        return;
    }

    let spec = a.spec();
    let name = if verbose { spec.name } else { spec.short_name };
    cs.append(name.as_bytes());

    if c >= 0 {
        cs.append(format!(" {c}").as_bytes());
    } else if let Some(p) = p {
        cs.append(b" ");
        let needs_quotes = p.is_empty() || p.starts_with(|ch: char| ch.is_ascii_whitespace());
        if needs_quotes {
            cs.append(b"\"");
        }
        cs.append(p.as_bytes());
        if needs_quotes {
            cs.append(b"\"");
        }
    }
    cs.append(&[0]);
}

/// If the segment is a valid `InsertChar NN` command, returns the code.
fn insertchar_val(segment: &[u8]) -> Option<i64> {
    let line = std::str::from_utf8(segment).ok()?;
    let parsed = parse_command_line(line, false).ok()?;
    if parsed.action == Action::InsertChar && parsed.num_arg > 0 {
        Some(parsed.num_arg)
    } else {
        None
    }
}

/// Optimizing is unsafe past any `Undo` or unknown command (which could
/// be a user macro containing an undo): check the rest of the stream.
fn vet_optimize(cs: &CharStream, from: usize) -> bool {
    let bytes = cs.as_bytes();
    let mut pos = from;
    while pos < bytes.len() {
        let rest = &bytes[pos..];
        let len = memchr::memchr(0, rest).unwrap_or(rest.len());
        match std::str::from_utf8(&rest[..len])
            .ok()
            .map(|l| parse_command_line(l, false))
        {
            Some(Ok(parsed)) if parsed.action == Action::Undo => return false,
            Some(Err(crate::error::Status::NoSuchCommand)) | None => return false,
            _ => {}
        }
        pos += len + 1;
    }
    true
}

/// Coalesces runs of printable-ASCII `InsertChar` commands into single
/// `InsertString` commands.
pub fn optimize_macro(cs: &mut CharStream, verbose: bool) {
    if cs.is_empty() {
        return;
    }

    // Byte offset of the last coalesced character, while building.
    let mut building: Option<usize> = None;
    let mut pos = 0;
    while pos < cs.len() {
        let seg_len = memchr::memchr(0, &cs.as_bytes()[pos..]).unwrap_or(cs.len() - pos);
        let chr = insertchar_val(&cs.as_bytes()[pos..pos + seg_len]);
        let printable = matches!(chr, Some(c) if c == 0x20 || (c < 0x80 && (c as u8).is_ascii_graphic()));

        if printable && vet_optimize(cs, pos) {
            let chr = chr.unwrap() as u8;
            cs.delete_at(pos, seg_len + 1);
            match building {
                Some(last) => {
                    let _ = cs.insert_at(last + 1, &[chr]);
                    building = Some(last + 1);
                    // The run's closing quote and NUL shifted right; the
                    // next segment now starts one byte further on.
                    pos += 1;
                }
                None => {
                    let name = if verbose { "InsertString" } else { "IS" };
                    let mut built = Vec::with_capacity(name.len() + 5);
                    built.extend_from_slice(name.as_bytes());
                    built.extend_from_slice(b" \"");
                    built.push(chr);
                    built.extend_from_slice(b"\"\0");
                    let total = built.len();
                    let _ = cs.insert_at(pos, &built);
                    building = Some(pos + name.len() + 2);
                    pos += total;
                }
            }
        } else {
            building = None;
            pos += seg_len + 1;
        }
    }
}

/// Cache of loaded named macros, keyed by base name. A macro file is
/// looked up as given, then under each prefs directory in order.
#[derive(Default)]
pub struct MacroCache {
    table: HashMap<String, Rc<CharStream>>,
}

impl MacroCache {
    pub fn new() -> MacroCache {
        MacroCache::default()
    }

    fn base_name(name: &str) -> String {
        Path::new(name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string())
    }

    pub fn get(&self, name: &str) -> Option<Rc<CharStream>> {
        self.table.get(&Self::base_name(name)).cloned()
    }

    /// Loads a macro file, caching it by base name.
    pub fn load(&mut self, name: &str, dirs: &[PathBuf]) -> Option<Rc<CharStream>> {
        if let Some(cached) = self.get(name) {
            return Some(cached);
        }

        let mut candidates = vec![PathBuf::from(name)];
        for dir in dirs {
            candidates.push(dir.join(name));
            candidates.push(dir.join("macros").join(name));
        }

        for path in candidates {
            if let Ok(mut cs) = CharStream::load_from_file(&path, false, false) {
                // The last line may not be terminated.
                if cs.as_bytes().last() != Some(&0) {
                    cs.append(&[0]);
                }
                debug!("loaded macro {}", path.display());
                let rc = Rc::new(cs);
                self.table.insert(Self::base_name(name), rc.clone());
                return Some(rc);
            }
        }
        None
    }

    /// Clears the macro table.
    pub fn unload(&mut self) {
        self.table.clear();
    }
}
