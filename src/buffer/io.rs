//! Loading and saving buffers
//!
//! On load, terminators become NUL separators and the whole image goes
//! into a single pool (memory mapped above the size threshold), so a
//! freshly loaded file costs one allocation and no per-line copies.
//! On save, lines are written through a block-sized buffered writer
//! with `\n`, `\r\n` or NUL terminators depending on the options.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::buffer::Buffer;
use crate::constants::{MMAP_THRESHOLD, SAVE_BLOCK_LEN};
use crate::encoding::Encoding;
use crate::error::{Result, Status};
use crate::line::HEAD;
use crate::pool::Span;
use crate::syntax::HighlightState;

impl Buffer {
    /// Loads a file, replacing the buffer contents. Sets the CRLF flag
    /// when the file uses CRLF terminators, detects the encoding, and
    /// turns on read-only for unwritable files.
    pub fn load_file(&mut self, path: &Path) -> Result {
        let meta = std::fs::metadata(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Status::FileDoesNotExist
            } else {
                Status::CantOpenFile
            }
        })?;
        if meta.is_dir() {
            return Err(Status::FileIsDirectory);
        }

        let raw = std::fs::read(path).map_err(Status::from)?;
        info!("loading {} ({} bytes)", path.display(), raw.len());
        self.load_bytes(raw)?;

        self.filename = Some(path.to_path_buf());
        self.opt.read_only = meta.permissions().readonly();
        Ok(())
    }

    /// Replaces the buffer contents with a raw byte image.
    pub fn load_bytes(&mut self, raw: Vec<u8>) -> Result {
        let preserve_cr = self.opt.preserve_cr;
        let binary = self.opt.binary;

        self.clear();

        // Terminator conversion: \0 always ends a line (the pools use
        // NUL as the free marker); \n and \r do too unless binary, and
        // CRLF pairs collapse to one terminator.
        let mut image = raw;
        let mut is_crlf = false;
        if !binary {
            let mut j = 0;
            let mut i = 0;
            while i < image.len() {
                let mut c = image[i];
                if !preserve_cr && c == b'\r' && i + 1 < image.len() && image[i + 1] == b'\n' {
                    is_crlf = true;
                    i += 1;
                    c = 0;
                } else if c == b'\n' || (!preserve_cr && c == b'\r') {
                    c = 0;
                }
                image[j] = c;
                i += 1;
                j += 1;
            }
            image.truncate(j);
        } else {
            // In binary mode only NULs terminate lines; nothing to do.
        }
        self.is_crlf = is_crlf;

        if image.is_empty() {
            return Ok(());
        }

        let mapped = image.len() >= MMAP_THRESHOLD;
        let pool = self.pools.install_loaded(&image, mapped)?;

        // Build the line list over the image. The arena already holds
        // one empty line from clear(); reuse it as the first.
        self.lines.clear();
        let mut prev = HEAD;
        let mut num_lines = 0;
        let mut start = 0;
        loop {
            let end = memchr::memchr(0, &image[start..]).map(|n| start + n);
            let seg_end = end.unwrap_or(image.len());
            let id = self.lines.alloc();
            self.lines.link_after(id, prev);
            if seg_end > start {
                self.lines.get_mut(id).line = Some(Span {
                    pool: pool.expect("nonzero bytes imply a pool"),
                    start,
                    len: seg_end - start,
                });
            }
            num_lines += 1;
            prev = id;
            match end {
                Some(e) => start = e + 1,
                None => break,
            }
        }
        self.num_lines = num_lines;
        self.reset_position_to_sof();
        if let Some(h) = &mut self.lines.get_mut(self.lines.first()).highlight {
            *h = HighlightState::initial();
        }

        self.encoding = match self.detect_buffer_encoding() {
            Encoding::Ascii => Encoding::Ascii,
            detected if !self.opt.binary && self.opt.utf8auto => detected,
            _ => Encoding::Byte8,
        };
        debug!("loaded {} lines, encoding {:?}", self.num_lines, self.encoding);
        Ok(())
    }

    /// Saves the buffer to `name`, or to its own file name. Marks the
    /// buffer unmodified and pins the undo save-step marker.
    pub fn save_file(&mut self, name: Option<&Path>) -> Result {
        if self.opt.read_only {
            return Err(Status::DocumentIsReadOnly);
        }
        let path: PathBuf = match name {
            Some(p) => p.to_path_buf(),
            None => self.filename.clone().ok_or(Status::Error)?,
        };

        let file = File::create(&path).map_err(|_| Status::CantOpenFile)?;
        let mut w = BufWriter::with_capacity(SAVE_BLOCK_LEN, file);

        let term: &[u8] = if self.opt.binary {
            b"\0"
        } else if self.is_crlf {
            b"\r\n"
        } else {
            b"\n"
        };
        let mut first = true;
        for id in self.lines.iter() {
            if !first {
                w.write_all(term).map_err(|_| Status::ErrorWhileWriting)?;
            }
            w.write_all(self.line_bytes(id))
                .map_err(|_| Status::ErrorWhileWriting)?;
            first = false;
        }
        w.flush().map_err(|_| Status::ErrorWhileWriting)?;

        info!("saved {}", path.display());
        self.filename = Some(path);
        self.is_modified = false;
        self.undo.last_save_step = self.undo.cur_step as i64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_splits_lines_and_detects_crlf() {
        let mut b = Buffer::new(false);
        b.load_bytes(b"one\r\ntwo\r\n".to_vec()).unwrap();
        assert!(b.is_crlf);
        assert_eq!(b.num_lines, 3);
        assert_eq!(b.line_vec(0), b"one");
        assert_eq!(b.line_vec(1), b"two");
        assert_eq!(b.line_vec(2), b"");
    }

    #[test]
    fn test_load_detects_encoding() {
        let mut b = Buffer::new(false);
        b.load_bytes("héllo\n".to_string().into_bytes()).unwrap();
        assert_eq!(b.encoding, Encoding::Utf8);

        let mut b = Buffer::new(false);
        b.load_bytes(vec![b'x', 0xFF, b'\n']).unwrap();
        assert_eq!(b.encoding, Encoding::Byte8);

        let mut b = Buffer::new(false);
        b.opt.utf8auto = false;
        b.load_bytes("héllo\n".to_string().into_bytes()).unwrap();
        assert_eq!(b.encoding, Encoding::Byte8);
    }

    #[test]
    fn test_load_preserve_cr_and_binary() {
        let mut b = Buffer::new(false);
        b.opt.preserve_cr = true;
        b.load_bytes(b"a\rb\nc".to_vec()).unwrap();
        assert_eq!(b.num_lines, 2);
        assert_eq!(b.line_vec(0), b"a\rb");

        let mut b = Buffer::new(false);
        b.opt.binary = true;
        b.load_bytes(b"a\nb\0c".to_vec()).unwrap();
        assert_eq!(b.num_lines, 2);
        assert_eq!(b.line_vec(0), b"a\nb");
    }

    #[test]
    fn test_load_accounting_counts_terminators_free() {
        let mut b = Buffer::new(false);
        b.load_bytes(b"ab\ncd\nef".to_vec()).unwrap();
        let total: usize = (0..b.num_lines).map(|n| b.line_vec(n).len()).sum();
        assert_eq!(b.used_chars(), total);
        // The two converted terminators are reclaimable free bytes.
        assert_eq!(b.lost_chars(), 2);
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.txt");

        let mut b = Buffer::new(false);
        b.load_bytes(b"one\ntwo".to_vec()).unwrap();
        let __id = b.cur_line_id;
        crate::edit::insert_stream(&mut b, __id, 0, 0, b"0:").unwrap();
        b.save_file(Some(&path)).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"0:one\ntwo");
        assert!(!b.is_modified);
        assert_eq!(b.undo.last_save_step as usize, b.undo.cur_step);

        // CRLF buffers save CRLF.
        b.is_crlf = true;
        b.save_file(Some(&path)).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"0:one\r\ntwo");
    }

    #[test]
    fn test_save_read_only_refused() {
        let mut b = Buffer::new(false);
        b.opt.read_only = true;
        assert_eq!(
            b.save_file(Some(Path::new("/nonexistent/x"))),
            Err(Status::DocumentIsReadOnly)
        );
    }

    #[test]
    fn test_autosave_all() {
        let dir = tempfile::tempdir().unwrap();

        let mut one = Buffer::new(false);
        one.load_bytes(b"data".to_vec()).unwrap();
        one.filename = Some(PathBuf::from("/somewhere/doc.txt"));
        one.is_modified = true;
        let unchanged = Buffer::new(false);

        let mut buffers = vec![one, unchanged];
        autosave_all(&mut buffers, dir.path());

        assert_eq!(
            std::fs::read(dir.path().join("#doc.txt")).unwrap(),
            b"data"
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}

/// Writes every modified buffer to `#basename` under `dir`. Called by
/// the host at a clean point when something fatal happened; errors are
/// swallowed so the pass visits every buffer.
pub fn autosave_all(buffers: &mut [Buffer], dir: &Path) {
    for b in buffers.iter_mut() {
        if !b.is_modified {
            continue;
        }
        let base = b
            .filename
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());
        let path = dir.join(format!("#{base}"));
        let read_only = std::mem::replace(&mut b.opt.read_only, false);
        if b.save_file(Some(&path)).is_err() {
            log::warn!("autosave of {} failed", path.display());
        }
        b.opt.read_only = read_only;
    }
}
