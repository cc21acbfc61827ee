//! The action dispatcher and the editor context
//!
//! `do_action` is the single entry point for every user-visible
//! command, whether it arrives from the event loop or from the macro
//! player. It mutates buffers only through the editing primitives,
//! translates low-level status codes into user messages through the
//! request interface, and appends recordable actions to the current
//! macro before dispatching them.

#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::trace;

use crate::buffer::Buffer;
use crate::character::get_char;
use crate::clips::{self, ClipRegistry};
use crate::command::{parse_command_line, Action};
use crate::constants::{
    AUTO_BOOKMARK, FILTER_CLIP, MAX_CODE_POINT, MAX_MACRO_DEPTH, MAX_USER_BOOKMARK,
};
use crate::edit;
use crate::edit::brackets::match_bracket;
use crate::edit::reformat::{auto_indent_line, center, paragraph, shift, word_wrap};
use crate::encoding::{detect_encoding, Encoding};
use crate::error::{Result, Status};
use crate::macros::{record_action, MacroCache};
use crate::movement;
use crate::prefs::PrefsStack;
use crate::request::{NumberReply, Request};
use crate::search::{self, SearchEngine};
use crate::stream::CharStream;
use crate::syntax::{ensure_attributes, reset_syntax_states, update_syntax_states_from};
use crate::undo::{end_undo_chain, redo, start_undo_chain, undo};

/// The process-wide editor state: the buffer ring, the clip registry,
/// the macro cache, the search engine, and the interrupt flag (the only
/// piece with interior mutability, so a signal handler can set it).
pub struct EditorContext {
    pub buffers: Vec<Buffer>,
    pub cur: usize,
    pub clips: ClipRegistry,
    pub macros: MacroCache,
    pub search: SearchEngine,
    pub prefs: PrefsStack,
    stop: Arc<AtomicBool>,
    pending_resize: Option<(usize, usize)>,

    /// Recorded macros use long command names.
    pub verbose_macros: bool,
    /// Highlighting was enabled at startup; buffers created under it
    /// carry highlight snapshots.
    pub do_syntax: bool,
    /// Milliseconds the input layer waits after an escape; kept here
    /// because it is settable as an option.
    pub escape_time: i64,
    pub macro_dirs: Vec<PathBuf>,
    pub syntax_dirs: Vec<PathBuf>,

    macro_depth: usize,
    /// RepeatLast wraps on the call after a NotFound; decays by one on
    /// every dispatch.
    perform_wrap: i64,
    last_inserted_char: i64,
    /// Set by Exit/Quit/closing the last document; the event loop
    /// terminates when it sees this.
    pub want_quit: bool,
}

impl Default for EditorContext {
    fn default() -> EditorContext {
        EditorContext::new(true)
    }
}

impl EditorContext {
    pub fn new(do_syntax: bool) -> EditorContext {
        EditorContext {
            buffers: vec![Buffer::new(do_syntax)],
            cur: 0,
            clips: ClipRegistry::new(),
            macros: MacroCache::new(),
            search: SearchEngine::default(),
            prefs: PrefsStack::new(),
            stop: Arc::new(AtomicBool::new(false)),
            pending_resize: None,
            verbose_macros: true,
            do_syntax,
            escape_time: 10,
            macro_dirs: Vec::new(),
            syntax_dirs: Vec::new(),
            macro_depth: 0,
            perform_wrap: 0,
            last_inserted_char: ' ' as i64,
            want_quit: false,
        }
    }

    pub fn cur_buffer(&self) -> &Buffer {
        &self.buffers[self.cur]
    }

    pub fn cur_mut(&mut self) -> &mut Buffer {
        &mut self.buffers[self.cur]
    }

    fn parts(&mut self) -> (&mut Buffer, &mut SearchEngine) {
        let EditorContext {
            buffers,
            cur,
            search,
            ..
        } = &mut *self;
        (&mut buffers[*cur], search)
    }

    /// A handle the interrupt collaborator sets to abort multi-step
    /// actions after the current iteration.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// The window-size collaborator reports a resize; the dispatcher
    /// applies it on its next entry.
    pub fn notify_resize(&mut self, rows: usize, cols: usize) {
        self.pending_resize = Some((rows, cols));
    }

    fn poll_resize(&mut self) {
        if let Some((rows, cols)) = self.pending_resize.take() {
            for b in &mut self.buffers {
                b.set_window_size(rows, cols);
                movement::keep_cursor_on_screen(b);
            }
        }
    }

    fn names(&self) -> Vec<String> {
        self.buffers
            .iter()
            .map(|b| {
                b.filename
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "<unnamed>".to_string())
            })
            .collect()
    }

    fn modified_buffers(&self) -> bool {
        self.buffers.iter().any(|b| b.is_modified)
    }

    fn save_all_modified(&mut self) -> Result {
        let mut rc = Ok(());
        for b in &mut self.buffers {
            if b.is_modified && b.save_file(None).is_err() {
                rc = Err(Status::Error);
            }
        }
        rc
    }
}

fn norm(c: i64) -> i64 {
    if c < 0 {
        1
    } else {
        c
    }
}

fn set_flag(flag: &mut bool, c: i64) {
    if c < 0 {
        *flag = !*flag;
    } else {
        *flag = c != 0;
    }
}

fn st(r: Result) -> Status {
    Status::from_result(r)
}

/// Reports an error through the request interface when there is one.
/// Returns true exactly when it reported.
fn print_error(req: &mut dyn Request, status: Status) -> bool {
    if status.is_error() {
        req.error(status);
        true
    } else {
        false
    }
}

/// Maps a request_number reply onto the convention: abort is OK,
/// invalid input is NotANumber.
fn numeric_error(reply: NumberReply) -> Status {
    match reply {
        NumberReply::Abort => Status::Ok,
        _ => Status::NotANumber,
    }
}

/// Parses and executes one command line against the current buffer.
/// Unknown command names fall back to named-macro execution.
pub fn execute_command_line(ctx: &mut EditorContext, req: &mut dyn Request, line: &str) -> Status {
    let b = ctx.cur_buffer();
    let encoding = detect_encoding(line.as_bytes());
    if b.encoding != Encoding::Ascii && encoding != Encoding::Ascii && b.encoding != encoding {
        return Status::IncompatibleCommandEncoding;
    }

    match parse_command_line(line, b.exec_only_options) {
        Ok(parsed) => do_action(ctx, req, parsed.action, parsed.num_arg, parsed.string_arg),
        Err(Status::NoSuchCommand) => match execute_macro(ctx, req, line.trim()) {
            Status::CantOpenMacro => Status::NoSuchCommand,
            other => other,
        },
        Err(e) => e,
    }
}

/// Plays a macro stream, one command line per NUL-terminated segment.
/// The stream is duplicated first, so a CloseDoc or UnloadMacros during
/// playback cannot free it underfoot.
pub fn play_macro(ctx: &mut EditorContext, req: &mut dyn Request, cs: &CharStream) -> Status {
    if cs.len() < 2 {
        return Status::Ok;
    }
    let lines: Vec<String> = cs
        .segments()
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect();

    ctx.stop.store(false, Ordering::Relaxed);

    let mut error = Status::Ok;
    for line in &lines {
        if ctx.stopped() {
            break;
        }
        error = execute_command_line(ctx, req, line);
        if error != Status::Ok {
            break;
        }
    }

    if ctx.stopped() {
        Status::Stopped
    } else {
        error
    }
}

/// Executes a named macro, loading and caching it on first use.
pub fn execute_macro(ctx: &mut EditorContext, req: &mut dyn Request, name: &str) -> Status {
    if ctx.macro_depth >= MAX_MACRO_DEPTH {
        return Status::MaxMacroDepthExceeded;
    }

    let dirs = ctx.macro_dirs.clone();
    let Some(md) = ctx.macros.load(name, &dirs) else {
        return Status::CantOpenMacro;
    };

    let b = ctx.cur_mut();
    if b.recording {
        b.cur_macro.append(b"# include macro ");
        b.cur_macro.append(name.as_bytes());
        b.cur_macro.append(&[0]);
    }

    ctx.macro_depth += 1;
    let rc = play_macro(ctx, req, &md);
    ctx.macro_depth -= 1;

    let b = ctx.cur_mut();
    if b.recording {
        b.cur_macro.append(b"# conclude macro ");
        b.cur_macro.append(name.as_bytes());
        b.cur_macro.append(&[0]);
    }
    rc
}

/// The dispatcher. `c == -1` means "unspecified" (one repetition for
/// repeating commands); the string argument is consumed.
pub fn do_action(
    ctx: &mut EditorContext,
    req: &mut dyn Request,
    a: Action,
    c: i64,
    p: Option<String>,
) -> Status {
    ctx.poll_resize();

    trace!("do_action {:?} {} {:?}", a, c, p);

    {
        let verbose = ctx.verbose_macros;
        let b = ctx.cur_mut();
        if b.recording && a.recordable() {
            let mut cs = std::mem::take(&mut b.cur_macro);
            record_action(&mut cs, a, c, p.as_deref(), verbose);
            b.cur_macro = cs;
        }
    }

    ctx.stop.store(false, Ordering::Relaxed);
    if ctx.perform_wrap > 0 {
        ctx.perform_wrap -= 1;
    }

    let stop_handle = ctx.stop.clone();
    let stop = move || stop_handle.load(Ordering::Relaxed);

    match a {
        // ------------------------------------------------------- exits
        Action::Exit => {
            if ctx.save_all_modified().is_err() {
                req.error(Status::Error);
                return Status::Error;
            }
            ctx.want_quit = true;
            Status::Ok
        }

        Action::Quit => {
            if ctx.modified_buffers()
                && !req.request_response("Some documents have not been saved; are you sure?", false)
            {
                return Status::Error;
            }
            ctx.want_quit = true;
            Status::Ok
        }

        Action::SaveAll => {
            if ctx.save_all_modified().is_err() {
                req.error(Status::Error);
                return Status::Error;
            }
            req.message("Modified documents saved.");
            Status::Ok
        }

        // --------------------------------------------------- movement
        Action::LineUp => repeat(ctx, c, &stop, movement::line_up),
        Action::LineDown => repeat(ctx, c, &stop, movement::line_down),
        Action::PrevPage => repeat(ctx, c, &stop, movement::prev_page),
        Action::NextPage => repeat(ctx, c, &stop, movement::next_page),
        Action::PageUp => repeat(ctx, c, &stop, movement::page_up),
        Action::PageDown => repeat(ctx, c, &stop, movement::page_down),
        Action::MoveLeft => repeat(ctx, c, &stop, movement::char_left),
        Action::MoveRight => repeat(ctx, c, &stop, movement::char_right),
        Action::NextWord => repeat(ctx, c, &stop, |b| movement::search_word(b, 1)),
        Action::PrevWord => repeat(ctx, c, &stop, |b| movement::search_word(b, -1)),

        Action::MoveSol => {
            movement::move_to_sol(ctx.cur_mut());
            Status::Ok
        }
        Action::MoveEol => {
            movement::move_to_eol(ctx.cur_mut());
            Status::Ok
        }
        Action::MoveSof => {
            movement::move_to_sof(ctx.cur_mut());
            Status::Ok
        }
        Action::MoveEof => {
            let b = ctx.cur_mut();
            movement::move_to_bof(b);
            movement::move_to_eol(b);
            Status::Ok
        }
        Action::MoveTos => st(movement::move_tos(ctx.cur_mut())),
        Action::MoveBos => st(movement::move_bos(ctx.cur_mut())),
        Action::MoveEow => {
            movement::move_to_eow(ctx.cur_mut());
            Status::Ok
        }
        Action::MoveIncUp => {
            movement::move_inc_up(ctx.cur_mut());
            Status::Ok
        }
        Action::MoveIncDown => {
            movement::move_inc_down(ctx.cur_mut());
            Status::Ok
        }
        Action::ToggleSeof => {
            movement::toggle_sof_eof(ctx.cur_mut());
            Status::Ok
        }
        Action::ToggleSeol => {
            movement::toggle_sol_eol(ctx.cur_mut());
            Status::Ok
        }

        Action::AdjustView => {
            let r = movement::adjust_view(ctx.cur_mut(), p.as_deref());
            st(r)
        }

        Action::GotoLine => {
            let mut c = c;
            if c < 0 {
                match req.request_number("Line", ctx.cur_buffer().cur_line as i64 + 1) {
                    NumberReply::Value(v) if v >= 0 => c = v,
                    reply => return numeric_error(reply),
                }
            }
            let b = ctx.cur_mut();
            if c == 0 || c > b.num_lines as i64 {
                c = b.num_lines as i64;
            }
            movement::goto_line(b, (c - 1) as usize);
            Status::Ok
        }

        Action::GotoColumn => {
            let mut c = c;
            if c < 0 {
                match req.request_number("Column", ctx.cur_buffer().cur_column() as i64 + 1) {
                    NumberReply::Value(v) if v >= 0 => c = v,
                    reply => return numeric_error(reply),
                }
            }
            movement::goto_column(ctx.cur_mut(), c.max(1) as usize - 1);
            Status::Ok
        }

        Action::GotoMark => {
            let b = ctx.cur_mut();
            if !b.marking {
                return Status::MarkBlockFirst;
            }
            let (line, pos) = (b.block_start_line, b.block_start_pos);
            movement::goto_line_pos(b, line, pos);
            Status::Ok
        }

        Action::MatchBracket => st(match_bracket(ctx.cur_mut())),

        // -------------------------------------------------- bookmarks
        Action::SetBookmark | Action::GotoBookmark | Action::UnsetBookmark => {
            bookmark_action(ctx, req, a, p)
        }

        // ---------------------------------------------------- editing
        Action::InsertChar => insert_char_action(ctx, req, c),

        Action::InsertString => {
            let b = ctx.cur_mut();
            let recording = b.recording;
            b.recording = false;
            let p = match p.or_else(|| req.request_string("String", None)) {
                Some(p) => p,
                None => {
                    ctx.cur_mut().recording = recording;
                    return Status::Error;
                }
            };

            let encoding = detect_encoding(p.as_bytes());
            let b = ctx.cur_mut();
            let mut error = Status::Ok;
            if b.encoding == Encoding::Ascii
                || encoding == Encoding::Ascii
                || b.encoding == encoding
            {
                if b.encoding == Encoding::Ascii {
                    b.encoding = encoding;
                }
                start_undo_chain(ctx.cur_mut());
                let bytes = p.into_bytes();
                let mut pos = 0;
                while pos < bytes.len() && error == Status::Ok {
                    let code = get_char(&bytes[pos..], encoding);
                    error = do_action(ctx, req, Action::InsertChar, code as i64, None);
                    pos = crate::character::next_pos(&bytes, pos, encoding);
                }
                end_undo_chain(ctx.cur_mut());
            } else {
                error = Status::InvalidString;
            }
            ctx.cur_mut().recording = recording;
            error
        }

        Action::InsertTab => {
            let recording = ctx.cur_buffer().recording;
            ctx.cur_mut().recording = false;
            let mut error = Status::Ok;
            start_undo_chain(ctx.cur_mut());
            for _ in 0..norm(c) {
                if ctx.cur_buffer().opt.tabs {
                    error = do_action(ctx, req, Action::InsertChar, '\t' as i64, None);
                    if error != Status::Ok {
                        break;
                    }
                } else {
                    loop {
                        error = do_action(ctx, req, Action::InsertChar, ' ' as i64, None);
                        if error != Status::Ok {
                            break;
                        }
                        let b = ctx.cur_buffer();
                        if b.opt.tab_size == 0
                            || b.cur_column() % b.opt.tab_size as usize == 0
                        {
                            break;
                        }
                    }
                    if error != Status::Ok {
                        break;
                    }
                }
            }
            end_undo_chain(ctx.cur_mut());
            ctx.cur_mut().recording = recording;
            error
        }

        Action::InsertLine => {
            let b = ctx.cur_mut();
            if b.opt.read_only {
                return Status::DocumentIsReadOnly;
            }
            for _ in 0..norm(c) {
                if stop() {
                    return Status::Stopped;
                }
                let b = ctx.cur_mut();
                // A separate undo step per line so a single Undo first
                // removes only the auto-indent space.
                start_undo_chain(b);
                let pos = b.cur_pos.min(b.cur_line_len());
                let inserted = edit::insert_one_line(b, b.cur_line_id, b.cur_line, pos);
                end_undo_chain(b);
                if inserted.is_ok() {
                    update_syntax_states_from(b, b.cur_line_id, b.cur_line);
                    let mut indent = 0;
                    if b.opt.auto_indent {
                        let next = b.lines.next(b.cur_line_id);
                        start_undo_chain(b);
                        indent = auto_indent_line(b, b.cur_line + 1, next, usize::MAX)
                            .unwrap_or(0);
                        end_undo_chain(b);
                    }
                    movement::move_to_sol(b);
                    let _ = movement::line_down(b);
                    if indent > 0 {
                        movement::goto_pos(b, indent);
                    }
                }
            }
            Status::Ok
        }

        Action::Backspace | Action::DeleteChar => delete_char_action(ctx, a, c, &stop),

        Action::DeleteEol => {
            let b = ctx.cur_mut();
            if b.opt.read_only {
                return Status::DocumentIsReadOnly;
            }
            let r = edit::delete_to_eol(b, b.cur_line_id, b.cur_line, b.cur_pos);
            update_syntax_states_from(b, b.cur_line_id, b.cur_line);
            st(r)
        }

        Action::DeleteLine => {
            let b = ctx.cur_mut();
            if b.opt.read_only {
                return Status::DocumentIsReadOnly;
            }
            let mut error = Status::Ok;
            start_undo_chain(b);
            for _ in 0..norm(c) {
                if stop() {
                    error = Status::Stopped;
                    break;
                }
                let b = ctx.cur_mut();
                if edit::delete_one_line(b, b.cur_line_id, b.cur_line).is_err() {
                    break;
                }
                if b.cur_line >= b.num_lines {
                    movement::goto_line(b, b.num_lines - 1);
                }
                movement::resync_pos(b);
                update_syntax_states_from(b, b.cur_line_id, b.cur_line);
            }
            end_undo_chain(ctx.cur_mut());
            error
        }

        Action::UndelLine => {
            let b = ctx.cur_mut();
            if b.opt.read_only {
                return Status::DocumentIsReadOnly;
            }
            let mut error = Status::Ok;
            for _ in 0..norm(c) {
                if stop() {
                    error = Status::Stopped;
                    break;
                }
                let b = ctx.cur_mut();
                if edit::undelete_line(b).is_err() {
                    error = Status::Error;
                    break;
                }
                update_syntax_states_from(b, b.cur_line_id, b.cur_line);
            }
            error
        }

        Action::DeleteNextWord | Action::DeletePrevWord => {
            let b = ctx.cur_mut();
            if b.opt.read_only {
                return Status::DocumentIsReadOnly;
            }
            let recording = b.recording;
            b.recording = false;
            let mut error = Status::Ok;
            start_undo_chain(ctx.cur_mut());
            for _ in 0..norm(c) {
                if stop() || error != Status::Ok {
                    break;
                }
                let b = ctx.cur_mut();
                let marking_t = b.marking;
                let vertical_t = b.mark_is_vertical;
                let mark_t = (b.block_start_line, b.block_start_pos);

                b.marking = true;
                b.mark_is_vertical = false;
                b.block_start_line = b.cur_line;
                b.block_start_pos = b.cur_pos;

                let motion = if a == Action::DeleteNextWord {
                    Action::NextWord
                } else {
                    Action::PrevWord
                };
                error = do_action(ctx, req, motion, 1, None);
                if error == Status::Ok {
                    error = st(clips::erase_block(ctx.cur_mut()));
                }

                let b = ctx.cur_mut();
                b.marking = marking_t;
                b.mark_is_vertical = vertical_t;
                b.block_start_line = mark_t.0;
                b.block_start_pos = mark_t.1;
            }
            end_undo_chain(ctx.cur_mut());
            ctx.cur_mut().recording = recording;
            if stop() {
                Status::Stopped
            } else {
                error
            }
        }

        // ------------------------------------------------ case/format
        Action::ToUpper => case_action(ctx, c, &stop, crate::character::to_upper, crate::character::to_upper),
        Action::ToLower => case_action(ctx, c, &stop, crate::character::to_lower, crate::character::to_lower),
        Action::Capitalize => case_action(ctx, c, &stop, crate::character::to_upper, crate::character::to_lower),

        Action::Center => {
            let b = ctx.cur_mut();
            if b.opt.read_only {
                return Status::DocumentIsReadOnly;
            }
            let mut error = Status::Ok;
            start_undo_chain(b);
            for _ in 0..norm(c) {
                if stop() {
                    error = Status::Stopped;
                    break;
                }
                let b = ctx.cur_mut();
                if center(b).is_err() {
                    error = Status::Error;
                    break;
                }
                b.attr_valid = false;
                update_syntax_states_from(b, b.cur_line_id, b.cur_line);
                movement::move_to_sol(b);
                if movement::line_down(b).is_err() {
                    break;
                }
            }
            end_undo_chain(ctx.cur_mut());
            print_error(req, error);
            error
        }

        Action::Paragraph => {
            let b = ctx.cur_mut();
            if b.opt.read_only {
                return Status::DocumentIsReadOnly;
            }
            let mut error = Status::Ok;
            let mut first = true;
            for _ in 0..norm(c) {
                if stop() {
                    error = Status::Stopped;
                    break;
                }
                let b = ctx.cur_mut();
                let start_id = b.cur_line_id;
                let start_line = b.cur_line;
                let r = paragraph(b, &stop, first);
                update_syntax_states_from(b, start_id, start_line);
                first = false;
                if let Err(e) = r {
                    error = e;
                    break;
                }
            }
            print_error(req, error);
            error
        }

        Action::Shift => {
            let b = ctx.cur_mut();
            if b.opt.read_only {
                return Status::DocumentIsReadOnly;
            }
            let r = shift(b, p.as_deref(), &stop);
            let b = ctx.cur_mut();
            update_syntax_states_from(b, b.top_line_id, b.win_y);
            let error = st(r);
            print_error(req, error);
            error
        }

        // ------------------------------------------------ mark, clips
        Action::Mark | Action::MarkVert => {
            let b = ctx.cur_mut();
            let c = if c < 0 { 1 } else { c };
            set_flag(&mut b.marking, c);
            if !b.marking {
                return Status::Ok;
            }
            req.message(if a == Action::Mark {
                "Start of block marked"
            } else {
                "Start of vertical block marked"
            });
            b.mark_is_vertical = a == Action::MarkVert;
            b.block_start_line = b.cur_line;
            b.block_start_pos = b.cur_pos;
            Status::Ok
        }

        Action::Copy | Action::Cut => {
            if a == Action::Cut && ctx.cur_buffer().opt.read_only {
                return Status::DocumentIsReadOnly;
            }
            let n = if c < 0 {
                ctx.cur_buffer().opt.cur_clip
            } else {
                c
            };
            let EditorContext {
                buffers,
                cur,
                clips,
                ..
            } = &mut *ctx;
            let b = &mut buffers[*cur];
            let r = if b.mark_is_vertical {
                clips::copy_vert_to_clip(b, clips, n, a == Action::Cut)
            } else {
                clips::copy_to_clip(b, clips, n, a == Action::Cut)
            };
            if r.is_ok() {
                b.marking = false;
            }
            let error = st(r);
            print_error(req, error);
            error
        }

        Action::Erase => {
            let b = ctx.cur_mut();
            if b.opt.read_only {
                return Status::DocumentIsReadOnly;
            }
            let r = if b.mark_is_vertical {
                clips::erase_vert_block(b)
            } else {
                clips::erase_block(b)
            };
            if r.is_ok() {
                b.marking = false;
            }
            let error = st(r);
            print_error(req, error);
            error
        }

        Action::Paste | Action::PasteVert => {
            if ctx.cur_buffer().opt.read_only {
                return Status::DocumentIsReadOnly;
            }
            let n = if c < 0 {
                ctx.cur_buffer().opt.cur_clip
            } else {
                c
            };
            let EditorContext {
                buffers,
                cur,
                clips,
                ..
            } = &mut *ctx;
            let b = &mut buffers[*cur];
            let r = if a == Action::Paste {
                clips::paste_to_buffer(b, clips, n)
            } else {
                clips::paste_vert_to_buffer(b, clips, n)
            };
            let error = st(r);
            print_error(req, error);
            error
        }

        Action::OpenClip => {
            let Some(p) = p.or_else(|| req.request_file("Clip Name", None)) else {
                return Status::Error;
            };
            let (preserve_cr, binary, n) = {
                let b = ctx.cur_buffer();
                (b.opt.preserve_cr, b.opt.binary, b.opt.cur_clip)
            };
            let error = st(clips::load_clip(
                &mut ctx.clips,
                n,
                std::path::Path::new(&p),
                preserve_cr,
                binary,
            ));
            print_error(req, error);
            error
        }

        Action::SaveClip => {
            let Some(p) = p.or_else(|| req.request_file("Clip Name", None)) else {
                return Status::Error;
            };
            let (crlf, binary, n) = {
                let b = ctx.cur_buffer();
                (b.is_crlf, b.opt.binary, b.opt.cur_clip)
            };
            let error = st(clips::save_clip(
                &ctx.clips,
                n,
                std::path::Path::new(&p),
                crlf,
                binary,
            ));
            print_error(req, error);
            error
        }

        Action::Through => through_action(ctx, req, p),

        // ----------------------------------------------------- search
        Action::Find | Action::FindRegExp => {
            let default = ctx
                .cur_buffer()
                .find_string
                .clone()
                .map(|v| String::from_utf8_lossy(&v).into_owned());
            let prompt = if a == Action::Find { "Find" } else { "Find RegExp" };
            let Some(p) = p.or_else(|| req.request_string(prompt, default.as_deref())) else {
                return Status::Error;
            };

            let encoding = detect_encoding(p.as_bytes());
            let b = ctx.cur_buffer();
            if encoding != Encoding::Ascii
                && b.encoding != Encoding::Ascii
                && encoding != b.encoding
            {
                return Status::IncompatibleSearchStringEncoding;
            }

            let (b, engine) = ctx.parts();
            b.find_string = Some(p.into_bytes());
            b.find_string_changed = 1;
            let r = if a == Action::Find {
                search::find(b, engine, None, false, false, &stop)
            } else {
                search::find_regexp(b, engine, None, false, false, &stop)
            };
            b.last_was_replace = false;
            b.last_was_regexp = a == Action::FindRegExp;
            let error = st(r);
            print_error(req, error);
            if error == Status::NotFound {
                ctx.perform_wrap = 2;
            }
            if error.is_error() || error == Status::Stopped {
                Status::Error
            } else {
                Status::Ok
            }
        }

        Action::Replace | Action::ReplaceOnce | Action::ReplaceAll => {
            replace_action(ctx, req, a, p, &stop)
        }

        Action::RepeatLast => repeat_last_action(ctx, req, c, &stop),

        // ------------------------------------------------------- undo
        Action::Undo => {
            let b = ctx.cur_mut();
            if b.opt.read_only {
                return Status::DocumentIsReadOnly;
            }
            if !b.opt.do_undo {
                return Status::UndoNotEnabled;
            }
            if b.atomic_undo {
                b.atomic_undo = false;
                while b.link_undos > 0 {
                    end_undo_chain(b);
                }
                req.message("AtomicUndo level: 0");
            }
            let mut error = Status::Ok;
            for _ in 0..norm(c) {
                if stop() {
                    error = Status::Stopped;
                    break;
                }
                if let Err(e) = undo(ctx.cur_mut()) {
                    error = e;
                    break;
                }
            }
            let b = ctx.cur_mut();
            b.is_modified = b.undo.cur_step as i64 != b.undo.last_save_step;
            print_error(req, error);
            if error.is_error() {
                Status::Error
            } else {
                error
            }
        }

        Action::Redo => {
            let b = ctx.cur_mut();
            if b.opt.read_only {
                return Status::DocumentIsReadOnly;
            }
            if !b.opt.do_undo {
                return Status::UndoNotEnabled;
            }
            let mut error = Status::Ok;
            for _ in 0..norm(c) {
                if stop() {
                    error = Status::Stopped;
                    break;
                }
                if let Err(e) = redo(ctx.cur_mut()) {
                    error = e;
                    break;
                }
            }
            let b = ctx.cur_mut();
            b.is_modified = b.undo.cur_step as i64 != b.undo.last_save_step;
            print_error(req, error);
            if error.is_error() {
                Status::Error
            } else {
                error
            }
        }

        Action::AtomicUndo => {
            let b = ctx.cur_mut();
            if !b.opt.do_undo {
                return Status::UndoNotEnabled;
            }
            let arg = p.as_deref().unwrap_or("");
            match arg {
                "0" => {
                    while b.link_undos > 0 {
                        end_undo_chain(b);
                    }
                    b.atomic_undo = false;
                }
                "-" => {
                    if b.link_undos == 0 {
                        return Status::InvalidLevel;
                    }
                    end_undo_chain(b);
                    if b.link_undos == 0 {
                        b.atomic_undo = false;
                    }
                }
                "" | "+" => {
                    start_undo_chain(b);
                    b.atomic_undo = true;
                }
                _ => return Status::InvalidLevel,
            }
            req.message(&format!("AtomicUndo level: {}", b.link_undos));
            Status::Ok
        }

        // ----------------------------------------------------- macros
        Action::Record => {
            let b = ctx.cur_mut();
            let was_recording = b.recording;
            let mut now = was_recording;
            set_flag(&mut now, c);
            b.recording = now;
            if b.recording && !was_recording {
                b.cur_macro.reset();
                req.message("Starting macro recording...");
            } else if !b.recording && was_recording {
                req.message("Macro recording completed.");
            }
            Status::Ok
        }

        Action::Play => {
            let b = ctx.cur_buffer();
            if b.recording || b.executing_internal_macro {
                return Status::Error;
            }
            let mut c = c;
            if c < 0 {
                match req.request_number("Times", 1) {
                    NumberReply::Value(v) if v > 0 => c = v,
                    reply => return numeric_error(reply),
                }
            }
            let cs = ctx.cur_buffer().cur_macro.clone();
            ctx.cur_mut().executing_internal_macro = true;
            let mut error = Status::Ok;
            for _ in 0..c {
                error = play_macro(ctx, req, &cs);
                if error != Status::Ok {
                    break;
                }
            }
            ctx.cur_mut().executing_internal_macro = false;
            print_error(req, error);
            if error.is_error() {
                Status::Error
            } else {
                error
            }
        }

        Action::SaveMacro => {
            let Some(p) = p.or_else(|| req.request_file("Macro Name", None)) else {
                return Status::Error;
            };
            let verbose = ctx.verbose_macros;
            let b = ctx.cur_mut();
            let mut cs = b.cur_macro.clone();
            crate::macros::optimize_macro(&mut cs, verbose);
            let error = st(cs.save_to_file(std::path::Path::new(&p), b.is_crlf, false));
            print_error(req, error);
            error
        }

        Action::OpenMacro => {
            let Some(p) = p.or_else(|| req.request_file("Macro Name", None)) else {
                return Status::Error;
            };
            match CharStream::load_from_file(std::path::Path::new(&p), false, false) {
                Ok(cs) => {
                    ctx.cur_mut().cur_macro = cs;
                    Status::Ok
                }
                Err(_) => Status::Error,
            }
        }

        Action::Macro => {
            let Some(p) = p.or_else(|| req.request_file("Macro Name", None)) else {
                return Status::Error;
            };
            let error = execute_macro(ctx, req, &p);
            print_error(req, error);
            if error.is_error() {
                Status::Error
            } else {
                error
            }
        }

        Action::UnloadMacros => {
            ctx.macros.unload();
            Status::Ok
        }

        // -------------------------------------------------- documents
        Action::NewDoc => {
            let b = Buffer::new_like(ctx.cur_buffer());
            ctx.buffers.insert(ctx.cur + 1, b);
            ctx.cur += 1;
            Status::Ok
        }

        Action::Clear => {
            if ctx.cur_buffer().is_modified
                && !req.request_response("This document is not saved; are you sure?", false)
            {
                return Status::Error;
            }
            ctx.cur_mut().clear();
            Status::Ok
        }

        Action::Open | Action::OpenNew => open_action(ctx, req, a, c, p),

        Action::CloseDoc => {
            if ctx.cur_buffer().is_modified
                && !req.request_response("This document is not saved; are you sure?", false)
            {
                return Status::Error;
            }
            ctx.buffers.remove(ctx.cur);
            if ctx.buffers.is_empty() {
                ctx.want_quit = true;
                ctx.buffers.push(Buffer::new(ctx.do_syntax));
            }
            if ctx.cur >= ctx.buffers.len() {
                ctx.cur = ctx.buffers.len() - 1;
            }
            movement::keep_cursor_on_screen(ctx.cur_mut());
            // Macros must not keep working on a vanished buffer.
            Status::Error
        }

        Action::NextDoc => {
            ctx.cur = (ctx.cur + 1) % ctx.buffers.len();
            movement::keep_cursor_on_screen(ctx.cur_mut());
            Status::Ok
        }

        Action::PrevDoc => {
            ctx.cur = (ctx.cur + ctx.buffers.len() - 1) % ctx.buffers.len();
            movement::keep_cursor_on_screen(ctx.cur_mut());
            Status::Ok
        }

        Action::SelectDoc => {
            let n = if c >= 0 {
                c as usize
            } else {
                let names = ctx.names();
                match req.request_document(&names) {
                    Some(n) => n,
                    None => return Status::Error,
                }
            };
            if n >= ctx.buffers.len() {
                return Status::Error;
            }
            ctx.cur = n;
            movement::keep_cursor_on_screen(ctx.cur_mut());
            Status::Ok
        }

        Action::Save | Action::SaveAs => {
            let name = if a == Action::SaveAs || ctx.cur_buffer().filename.is_none() {
                let default = ctx
                    .cur_buffer()
                    .filename
                    .as_ref()
                    .map(|f| f.display().to_string());
                match p.or_else(|| req.request_file("Filename", default.as_deref())) {
                    Some(p) => Some(PathBuf::from(p)),
                    None => return Status::Error,
                }
            } else {
                None
            };
            let error = st(ctx.cur_mut().save_file(name.as_deref()));
            print_error(req, error);
            error
        }

        // ------------------------------------------------------ prefs
        Action::PushPrefs => {
            let mut error = Status::Ok;
            for _ in 0..norm(c) {
                if stop() {
                    error = Status::Stopped;
                    break;
                }
                let EditorContext {
                    buffers,
                    cur,
                    prefs,
                    ..
                } = &mut *ctx;
                if let Err(e) = prefs.push(&buffers[*cur]) {
                    error = e;
                    break;
                }
            }
            print_error(req, error);
            error
        }

        Action::PopPrefs => {
            let mut error = Status::Ok;
            for _ in 0..norm(c) {
                if stop() {
                    error = Status::Stopped;
                    break;
                }
                let EditorContext {
                    buffers,
                    cur,
                    prefs,
                    ..
                } = &mut *ctx;
                if let Err(e) = prefs.pop(&mut buffers[*cur]) {
                    error = e;
                    break;
                }
            }
            print_error(req, error);
            error
        }

        Action::LoadPrefs => {
            let Some(p) = p.or_else(|| req.request_file("Prefs Name", None)) else {
                return Status::Error;
            };
            let error = load_prefs(ctx, req, std::path::Path::new(&p));
            print_error(req, error);
            error
        }

        Action::SavePrefs => {
            let Some(p) = p.or_else(|| req.request_file("Prefs Name", None)) else {
                return Status::Error;
            };
            let error = st(crate::prefs::save_prefs(
                ctx.cur_buffer(),
                std::path::Path::new(&p),
            ));
            print_error(req, error);
            error
        }

        // ----------------------------------------------------- syntax
        Action::Syntax => {
            if !ctx.do_syntax {
                return Status::SyntaxNotEnabled;
            }
            let default = ctx.cur_buffer().syn.as_ref().map(|s| s.name.clone());
            let Some(p) = p.or_else(|| req.request_string("Syntax", default.as_deref())) else {
                return Status::Error;
            };
            if p == "*" {
                ctx.cur_mut().syn = None;
                return Status::Ok;
            }
            let dirs = ctx.syntax_dirs.clone();
            match crate::syntax::loader::load_syntax(
                &crate::syntax::loader::SyntaxDirs(&dirs),
                &p,
            ) {
                Ok(syn) => {
                    let b = ctx.cur_mut();
                    b.syn = Some(Rc::new(syn));
                    reset_syntax_states(b);
                    Status::Ok
                }
                Err(e) => {
                    print_error(req, e);
                    Status::Error
                }
            }
        }

        // ---------------------------------------------------- options
        Action::Insert => {
            set_flag(&mut ctx.cur_mut().opt.insert, c);
            Status::Ok
        }
        Action::FreeForm => {
            set_flag(&mut ctx.cur_mut().opt.free_form, c);
            Status::Ok
        }
        Action::WordWrap => {
            set_flag(&mut ctx.cur_mut().opt.word_wrap, c);
            Status::Ok
        }
        Action::AutoIndent => {
            set_flag(&mut ctx.cur_mut().opt.auto_indent, c);
            Status::Ok
        }
        Action::PreserveCr => {
            set_flag(&mut ctx.cur_mut().opt.preserve_cr, c);
            Status::Ok
        }
        Action::CaseSearch => {
            let b = ctx.cur_mut();
            set_flag(&mut b.opt.case_search, c);
            b.find_string_changed = 1;
            Status::Ok
        }
        Action::SearchBack => {
            let b = ctx.cur_mut();
            set_flag(&mut b.opt.search_back, c);
            b.find_string_changed = 1;
            Status::Ok
        }
        Action::Tabs => {
            set_flag(&mut ctx.cur_mut().opt.tabs, c);
            Status::Ok
        }
        Action::DelTabs => {
            set_flag(&mut ctx.cur_mut().opt.del_tabs, c);
            Status::Ok
        }
        Action::ShiftTabs => {
            set_flag(&mut ctx.cur_mut().opt.shift_tabs, c);
            Status::Ok
        }
        Action::Binary => {
            set_flag(&mut ctx.cur_mut().opt.binary, c);
            Status::Ok
        }
        Action::Utf8Auto => {
            set_flag(&mut ctx.cur_mut().opt.utf8auto, c);
            Status::Ok
        }
        Action::VisualBell => {
            set_flag(&mut ctx.cur_mut().opt.visual_bell, c);
            Status::Ok
        }
        Action::DoUndo => {
            let b = ctx.cur_mut();
            set_flag(&mut b.opt.do_undo, c);
            if !b.opt.do_undo {
                b.undo.reset();
                b.atomic_undo = false;
                b.link_undos = 0;
            }
            Status::Ok
        }
        Action::AutoPrefs => {
            set_flag(&mut ctx.cur_mut().opt.auto_prefs, c);
            Status::Ok
        }
        Action::NoFileReq => {
            set_flag(&mut ctx.cur_mut().opt.no_file_req, c);
            Status::Ok
        }
        Action::ReadOnly => {
            set_flag(&mut ctx.cur_mut().opt.read_only, c);
            Status::Ok
        }
        Action::Crlf => {
            let b = ctx.cur_mut();
            set_flag(&mut b.is_crlf, c);
            Status::Ok
        }
        Action::Modified => {
            let b = ctx.cur_mut();
            set_flag(&mut b.is_modified, c);
            Status::Ok
        }
        Action::VerboseMacros => {
            set_flag(&mut ctx.verbose_macros, c);
            Status::Ok
        }

        Action::TabSize => {
            let mut c = c;
            if c < 0 {
                match req.request_number("Tab Size", ctx.cur_buffer().opt.tab_size) {
                    NumberReply::Value(v) => c = v,
                    reply => return numeric_error(reply),
                }
            }
            let b = ctx.cur_mut();
            if c <= 0 || c >= b.cols as i64 / 2 {
                return Status::TabSizeOutOfRange;
            }
            b.opt.tab_size = c;
            Status::Ok
        }

        Action::RightMargin => {
            let mut c = c;
            if c < 0 {
                match req.request_number("Right Margin", ctx.cur_buffer().opt.right_margin) {
                    NumberReply::Value(v) if v >= 0 => c = v,
                    reply => return numeric_error(reply),
                }
            }
            ctx.cur_mut().opt.right_margin = c;
            Status::Ok
        }

        Action::ClipNumber => {
            let mut c = c;
            if c < 0 {
                match req.request_number("Clip Number", ctx.cur_buffer().opt.cur_clip) {
                    NumberReply::Value(v) if v >= 0 => c = v,
                    reply => return numeric_error(reply),
                }
            }
            ctx.cur_mut().opt.cur_clip = c;
            Status::Ok
        }

        Action::AutoMatchBracket => {
            let mut c = c;
            if c < 0 {
                match req.request_number(
                    "Match mode (sum of 0:none, 1:brightness, 2:inverse, 4:bold, 8:underline)",
                    ctx.cur_buffer().opt.automatch,
                ) {
                    NumberReply::Value(v) => c = v,
                    NumberReply::Abort => return Status::Ok,
                    NumberReply::Invalid => return Status::InvalidMatchMode,
                }
            }
            if !(0..=15).contains(&c) {
                return Status::InvalidMatchMode;
            }
            ctx.cur_mut().opt.automatch = c;
            Status::Ok
        }

        Action::EscapeTime => {
            let mut c = c;
            if c < 0 {
                match req.request_number("Timeout (1/10s)", ctx.escape_time) {
                    NumberReply::Value(v) => c = v,
                    reply => return numeric_error(reply),
                }
            }
            if !(0..=255).contains(&c) {
                return Status::EscapeTimeOutOfRange;
            }
            ctx.escape_time = c;
            Status::Ok
        }

        Action::Utf8 => {
            let b = ctx.cur_mut();
            let mut on = b.encoding == Encoding::Utf8;
            set_flag(&mut on, c);
            if on {
                match b.detect_buffer_encoding() {
                    Encoding::Byte8 => return Status::BufferIsNotUtf8,
                    _ => b.encoding = Encoding::Utf8,
                }
            } else if b.encoding == Encoding::Utf8 {
                b.encoding = match b.detect_buffer_encoding() {
                    Encoding::Ascii => Encoding::Ascii,
                    _ => Encoding::Byte8,
                };
            }
            b.find_string_changed = 1;
            Status::Ok
        }

        // ------------------------------------------------------- misc
        Action::Exec => {
            let Some(p) = p.or_else(|| req.request_string("Command", None)) else {
                return Status::Error;
            };
            let error = execute_command_line(ctx, req, &p);
            print_error(req, error);
            if error.is_error() {
                Status::Error
            } else {
                error
            }
        }

        Action::Nop => Status::Ok,
    }
}

/// Runs a cursor-motion primitive `c` (or one) times, polling the stop
/// flag between iterations.
fn repeat(
    ctx: &mut EditorContext,
    c: i64,
    stop: &dyn Fn() -> bool,
    f: impl Fn(&mut Buffer) -> Result,
) -> Status {
    let b = ctx.cur_mut();
    let mut error = Status::Ok;
    for _ in 0..norm(c) {
        if stop() {
            return Status::Stopped;
        }
        if let Err(e) = f(b) {
            error = e;
            break;
        }
    }
    error
}

fn case_action(
    ctx: &mut EditorContext,
    c: i64,
    stop: &dyn Fn() -> bool,
    to_first: fn(u32, Encoding) -> u32,
    to_rest: fn(u32, Encoding) -> u32,
) -> Status {
    let b = ctx.cur_mut();
    if b.opt.read_only {
        return Status::DocumentIsReadOnly;
    }
    let mut error = Status::Ok;
    start_undo_chain(b);
    for _ in 0..norm(c) {
        if stop() {
            error = Status::Stopped;
            break;
        }
        if edit::case_change(b, to_first, to_rest).is_err() {
            error = Status::Error;
            break;
        }
        update_syntax_states_from(b, b.cur_line_id, b.cur_line);
    }
    end_undo_chain(b);
    error
}

/// The InsertChar case: encoding promotion, overwrite mode, free-form
/// padding, and word wrapping with auto-indent, all one undo atom.
fn insert_char_action(ctx: &mut EditorContext, req: &mut dyn Request, c: i64) -> Status {
    if ctx.cur_buffer().opt.read_only {
        return Status::DocumentIsReadOnly;
    }

    let mut c = c;
    if c < 0 || c > MAX_CODE_POINT {
        match req.request_number("Char Code", ctx.last_inserted_char) {
            NumberReply::Value(v) if v >= 0 && v <= MAX_CODE_POINT => c = v,
            reply => return numeric_error(reply),
        }
    }
    if c == 0 {
        return Status::CantInsert0;
    }

    let b = ctx.cur_mut();
    if b.encoding == Encoding::Ascii {
        if c > 0xFF {
            b.encoding = Encoding::Utf8;
        } else if c > 0x7F {
            b.encoding = if b.opt.utf8auto {
                Encoding::Utf8
            } else {
                Encoding::Byte8
            };
        }
    }
    if c > 0xFF && b.encoding != Encoding::Utf8 {
        return Status::InvalidCharacter;
    }
    ctx.last_inserted_char = c;

    let b = ctx.cur_mut();
    ensure_attributes(b);
    start_undo_chain(b);

    let r = (|| -> Result {
        // Overwrite mode deletes first, except past end-of-line where
        // overwriting degenerates to insertion.
        if !b.opt.insert && b.cur_pos < b.cur_line_len() {
            edit::delete_one_char(b, b.cur_line_id, b.cur_line, b.cur_pos)?;
        }
        if b.cur_pos > b.cur_line_len() {
            let llen = b.cur_line_len();
            edit::insert_spaces(b, b.cur_line_id, b.cur_line, llen, b.cur_pos - llen)?;
        }
        edit::insert_one_char(b, b.cur_line_id, b.cur_line, b.cur_pos, c as u32)?;
        movement::char_right(b)?;
        Ok(())
    })();

    if let Err(e) = r {
        end_undo_chain(b);
        return e;
    }

    // Word wrap once the visible cursor crosses the margin. cols - 1
    // avoids a double horizontal scroll when the margin is unset.
    let margin = if b.opt.right_margin > 0 {
        b.opt.right_margin as usize
    } else {
        b.cols - 1
    };
    if b.opt.word_wrap && b.cur_column() >= margin {
        match word_wrap(b) {
            Ok(result) => {
                update_syntax_states_from(b, b.cur_line_id, b.cur_line);
                let mut indent = 0;
                if b.opt.auto_indent {
                    let next = b.lines.next(b.cur_line_id);
                    indent = auto_indent_line(b, b.cur_line + 1, next, usize::MAX).unwrap_or(0);
                }
                movement::move_to_sol(b);
                let _ = movement::line_down(b);
                movement::goto_pos(b, result + indent);
            }
            Err(_) => update_syntax_states_from(b, b.cur_line_id, b.cur_line),
        }
    } else {
        update_syntax_states_from(b, b.cur_line_id, b.cur_line);
    }

    end_undo_chain(b);
    Status::Ok
}

/// Backspace and DeleteChar share a body: backspace is a move-left (or
/// a del-tabs-aware pull to the previous tab stop) followed by the
/// same deletion logic, with free-form padding on demand.
fn delete_char_action(ctx: &mut EditorContext, a: Action, c: i64, stop: &dyn Fn() -> bool) -> Status {
    let b = ctx.cur_mut();
    if b.opt.read_only {
        return Status::DocumentIsReadOnly;
    }
    let tab = b.opt.tab_size as usize;

    start_undo_chain(b);
    for _ in 0..norm(c) {
        if stop() {
            break;
        }

        if a == Action::Backspace {
            if b.cur_pos == 0 {
                if b.cur_line == 0 {
                    end_undo_chain(b);
                    return Status::Error;
                }
                let _ = movement::char_left(b);
            } else {
                let col = b.cur_column();
                let llen = b.cur_line_len();
                let on_space = b.cur_pos > llen
                    || (b.cur_pos > 0 && b.cur_line_bytes().get(b.cur_pos - 1) == Some(&b' '));
                if b.opt.del_tabs && col % tab == 0 && on_space {
                    // Delete back to the previous tab stop while it is
                    // spaces all the way.
                    let mut back = 1;
                    loop {
                        if (col - back) % tab == 0 {
                            break;
                        }
                        let deeper = b.cur_pos - back > llen
                            || (b.cur_pos >= back + 1
                                && b.cur_line_bytes().get(b.cur_pos - back - 1) == Some(&b' '));
                        if !deeper {
                            break;
                        }
                        back += 1;
                    }
                    movement::goto_pos(b, b.cur_pos - back);
                } else {
                    let _ = movement::char_left(b);
                }
                // Not over text: free form turns backspace into a move.
                if b.cur_pos >= b.cur_line_len() {
                    continue;
                }
            }
        }

        // From here on, a plain delete at the cursor.
        let llen = b.cur_line_len();
        if b.opt.del_tabs && b.cur_pos < llen && b.cur_line_bytes()[b.cur_pos] == b' ' {
            let col = b.cur_column();
            let at_stop =
                col % tab == 0 || (b.cur_pos > 0 && b.cur_line_bytes()[b.cur_pos - 1] != b' ');
            if at_stop {
                let mut span = 0;
                loop {
                    span += 1;
                    if (col + span) % tab == 0
                        || b.cur_pos + span >= llen
                        || b.cur_line_bytes()[b.cur_pos + span] != b' '
                    {
                        break;
                    }
                }
                // A whole block of spaces up to a tab stop collapses
                // into one TAB before the deletion proper.
                if span > 1 && (col + span) % tab == 0 {
                    let _ = edit::delete_stream(b, b.cur_line_id, b.cur_line, b.cur_pos, span);
                    let _ =
                        edit::insert_one_char(b, b.cur_line_id, b.cur_line, b.cur_pos, '\t' as u32);
                }
            }
        }

        if b.cur_pos > b.cur_line_len() {
            // Deleting past end-of-line joins with the next line after
            // padding up to the cursor column.
            if b.lines.is_last(b.cur_line_id) {
                continue;
            }
            let col = b.cur_column();
            if b.cur_line_len() == 0 {
                let _ = auto_indent_line(b, b.cur_line, b.cur_line_id, col);
                movement::resync_pos(b);
            }
            let llen = b.cur_line_len();
            let width = b.width_to(b.cur_line_id, llen);
            if col > width {
                let _ = edit::insert_spaces(b, b.cur_line_id, b.cur_line, llen, col - width);
            }
            movement::resync_pos(b);
        }

        let _ = edit::delete_one_char(b, b.cur_line_id, b.cur_line, b.cur_pos);
        update_syntax_states_from(b, b.cur_line_id, b.cur_line);
    }
    end_undo_chain(b);
    if stop() {
        Status::Stopped
    } else {
        Status::Ok
    }
}

fn bookmark_designator(
    b: &mut Buffer,
    req: &mut dyn Request,
    a: Action,
    p: Option<String>,
) -> std::result::Result<usize, Status> {
    let mut p = p;
    if let Some(text) = &p {
        if text == "?" {
            let prompt = format!(
                "Bookmarks set: [{}] (0-9, +1, -1, or '-')",
                bookmarks_string(b)
            );
            p = req.request_string(&prompt, None);
            if p.is_none() {
                return Err(Status::InvalidBookmarkDesignation);
            }
        }
    }

    let Some(text) = p else { return Ok(0) };
    let bytes = text.as_bytes();
    match bytes {
        b"" => Ok(0),
        b"-" => Ok(AUTO_BOOKMARK),
        [d] if d.is_ascii_digit() => Ok((d - b'0') as usize),
        b"+1" | b"-1" => {
            // Cycle to the next bookmark that is (for Set) unset or
            // (for Goto/Unset) set.
            let fwd = bytes[0] == b'+';
            if b.cur_bookmark > MAX_USER_BOOKMARK {
                b.cur_bookmark = 0;
            }
            for _ in 0..=MAX_USER_BOOKMARK {
                b.cur_bookmark = if fwd {
                    (b.cur_bookmark + 1) % (MAX_USER_BOOKMARK + 1)
                } else {
                    (b.cur_bookmark + MAX_USER_BOOKMARK) % (MAX_USER_BOOKMARK + 1)
                };
                let set = b.bookmark_mask & (1 << b.cur_bookmark) != 0;
                if (a == Action::SetBookmark) != set {
                    return Ok(b.cur_bookmark);
                }
            }
            Err(match a {
                Action::SetBookmark => Status::NoUnsetBookmarksToSet,
                Action::GotoBookmark => Status::NoSetBookmarksToGoto,
                _ => Status::NoSetBookmarksToUnset,
            })
        }
        _ => Err(Status::InvalidBookmarkDesignation),
    }
}

fn bookmarks_string(b: &Buffer) -> String {
    let mut s = String::new();
    for i in 0..=AUTO_BOOKMARK {
        if b.bookmark_mask & (1 << i) != 0 {
            if i == AUTO_BOOKMARK {
                s.push('-');
            } else {
                s.push((b'0' + i as u8) as char);
            }
        }
    }
    s
}

fn bookmark_action(
    ctx: &mut EditorContext,
    req: &mut dyn Request,
    a: Action,
    p: Option<String>,
) -> Status {
    // The special "*" designator unsets everything.
    if a == Action::UnsetBookmark && p.as_deref() == Some("*") {
        let b = ctx.cur_mut();
        b.bookmark_mask = 0;
        b.cur_bookmark = 0;
        req.message("All bookmarks cleared.");
        return Status::Ok;
    }

    let b = ctx.cur_mut();
    let n = match bookmark_designator(b, req, a, p) {
        Ok(n) => n,
        Err(e) => return e,
    };
    if n > AUTO_BOOKMARK {
        return Status::InvalidBookmarkDesignation;
    }

    match a {
        Action::SetBookmark => {
            b.bookmarks[n].line = b.cur_line;
            b.bookmarks[n].pos = b.cur_pos;
            b.bookmarks[n].cur_y = b.cur_y as i64;
            b.bookmark_mask |= 1 << n;
            b.cur_bookmark = n;
            req.message(&format!(
                "Bookmark {} set",
                if n == AUTO_BOOKMARK {
                    "-".to_string()
                } else {
                    n.to_string()
                }
            ));
            Status::Ok
        }
        Action::UnsetBookmark => {
            if b.bookmark_mask & (1 << n) == 0 {
                return Status::BookmarkNotSet;
            }
            b.bookmark_mask &= !(1 << n);
            Status::Ok
        }
        _ => {
            if b.bookmark_mask & (1 << n) == 0 {
                return Status::BookmarkNotSet;
            }
            let prev = (b.cur_line, b.cur_pos, b.cur_y as i64);
            b.cur_bookmark = n;
            let target = b.bookmarks[n];
            movement::goto_line_pos(b, target.line, target.pos);
            let avshift = b.cur_y as i64 - target.cur_y;
            if avshift != 0 {
                let spec = format!(
                    "{}{}",
                    if avshift > 0 { 'T' } else { 'B' },
                    avshift.abs()
                );
                let _ = movement::adjust_view(b, Some(&spec));
            }
            // Every long jump pushes the automatic bookmark.
            b.bookmarks[AUTO_BOOKMARK].line = prev.0;
            b.bookmarks[AUTO_BOOKMARK].pos = prev.1;
            b.bookmarks[AUTO_BOOKMARK].cur_y = prev.2;
            b.bookmark_mask |= 1 << AUTO_BOOKMARK;
            Status::Ok
        }
    }
}

fn open_action(
    ctx: &mut EditorContext,
    req: &mut dyn Request,
    a: Action,
    _c: i64,
    p: Option<String>,
) -> Status {
    if a == Action::OpenNew {
        let b = Buffer::new_like(ctx.cur_buffer());
        ctx.buffers.insert(ctx.cur + 1, b);
        ctx.cur += 1;
    } else if ctx.cur_buffer().is_modified
        && !req.request_response("This document is not saved; are you sure?", false)
    {
        return Status::Error;
    }

    let fail = |ctx: &mut EditorContext, req: &mut dyn Request| {
        if a == Action::OpenNew {
            let _ = do_action(ctx, req, Action::CloseDoc, 1, None);
        }
        Status::Error
    };

    let default = ctx
        .cur_buffer()
        .filename
        .as_ref()
        .map(|f| f.display().to_string());
    let Some(p) = p.or_else(|| req.request_file("Filename", default.as_deref())) else {
        return fail(ctx, req);
    };

    // Warn when the same file is already open in another document.
    let path = PathBuf::from(&p);
    let canonical = path.canonicalize().ok();
    let dup = canonical.is_some()
        && ctx.buffers.iter().enumerate().any(|(i, b)| {
            i != ctx.cur
                && b.filename.as_ref().and_then(|f| f.canonicalize().ok()) == canonical
        });
    if dup && !req.request_response("There is another document with the same name; are you sure?", false) {
        return fail(ctx, req);
    }

    let error = st(ctx.cur_mut().load_file(&path));
    if !matches!(
        error,
        Status::FileIsMigrated
            | Status::FileIsDirectory
            | Status::IoError
            | Status::FileIsTooLarge
            | Status::OutOfMemory
            | Status::OutOfMemoryDiskFull
    ) {
        let b = ctx.cur_mut();
        b.filename = Some(path);
        b.syn = None;
    }
    print_error(req, error);
    Status::Ok
}

fn through_action(ctx: &mut EditorContext, req: &mut dyn Request, p: Option<String>) -> Status {
    if ctx.cur_buffer().opt.read_only {
        return Status::DocumentIsReadOnly;
    }
    if !ctx.cur_buffer().marking {
        ctx.cur_mut().mark_is_vertical = false;
    }

    let Some(p) = p.or_else(|| req.request_string("Filter", None)) else {
        return Status::Error;
    };

    let error = (|| -> Result {
        // Collect the selection (or nothing) through the filter clip.
        let (is_crlf, binary, preserve_cr, marking, vertical) = {
            let b = ctx.cur_buffer();
            (
                b.is_crlf,
                b.opt.binary,
                b.opt.preserve_cr,
                b.marking,
                b.mark_is_vertical,
            )
        };

        let input = if marking {
            let EditorContext {
                buffers,
                cur,
                clips,
                ..
            } = &mut *ctx;
            let b = &mut buffers[*cur];
            if vertical {
                clips::copy_vert_to_clip(b, clips, FILTER_CLIP, false)?;
            } else {
                clips::copy_to_clip(b, clips, FILTER_CLIP, false)?;
            }
            let mut out = Vec::new();
            ctx.clips
                .get(FILTER_CLIP)
                .expect("filter clip just written")
                .stream
                .save_to_writer(&mut out, is_crlf, binary)?;
            out
        } else {
            Vec::new()
        };

        let output = crate::exec::filter_through(&input, &p)?;

        let mut cs = CharStream::from_raw(output, preserve_cr, binary);
        cs.set_encoding_from_content(Encoding::Ascii);
        ctx.clips.put(FILTER_CLIP, cs);

        start_undo_chain(ctx.cur_mut());
        let r = (|| -> Result {
            let EditorContext {
                buffers,
                cur,
                clips,
                ..
            } = &mut *ctx;
            let b = &mut buffers[*cur];
            if marking {
                if vertical {
                    clips::erase_vert_block(b)?;
                    clips::paste_vert_to_buffer(b, clips, FILTER_CLIP)?;
                } else {
                    clips::erase_block(b)?;
                    clips::paste_to_buffer(b, clips, FILTER_CLIP)?;
                }
            } else if vertical {
                clips::paste_vert_to_buffer(b, clips, FILTER_CLIP)?;
            } else {
                clips::paste_to_buffer(b, clips, FILTER_CLIP)?;
            }
            Ok(())
        })();
        end_undo_chain(ctx.cur_mut());
        r?;

        ctx.cur_mut().marking = false;
        ctx.clips.remove(FILTER_CLIP);
        Ok(())
    })();

    let error = st(error);
    print_error(req, error);
    if error.is_error() {
        Status::Error
    } else {
        Status::Ok
    }
}

fn replace_action(
    ctx: &mut EditorContext,
    req: &mut dyn Request,
    a: Action,
    p: Option<String>,
    stop: &dyn Fn() -> bool,
) -> Status {
    if ctx.cur_buffer().opt.read_only {
        return Status::DocumentIsReadOnly;
    }

    // Establish the find string.
    let find_prompt = if ctx.cur_buffer().last_was_regexp {
        "Find RegExp"
    } else {
        "Find"
    };
    let find_string = match ctx.cur_buffer().find_string.clone() {
        Some(q) => q,
        None => match req.request_string(find_prompt, None) {
            Some(q) => {
                let q = q.into_bytes();
                let b = ctx.cur_mut();
                b.find_string = Some(q.clone());
                b.find_string_changed = 1;
                q
            }
            None => return Status::Error,
        },
    };

    let search_encoding = detect_encoding(&find_string);
    {
        let b = ctx.cur_buffer();
        if search_encoding != Encoding::Ascii
            && b.encoding != Encoding::Ascii
            && search_encoding != b.encoding
        {
            return Status::IncompatibleSearchStringEncoding;
        }
    }

    // Establish the replace string.
    let replace_prompt = if ctx.cur_buffer().last_was_regexp {
        "Replace RegExp"
    } else {
        "Replace"
    };
    let default = ctx
        .cur_buffer()
        .replace_string
        .clone()
        .map(|v| String::from_utf8_lossy(&v).into_owned());
    let Some(p) = p.or_else(|| req.request_string(replace_prompt, default.as_deref())) else {
        return Status::Error;
    };
    let replacement = p.into_bytes();

    let replace_encoding = detect_encoding(&replacement);
    {
        let b = ctx.cur_buffer();
        if (replace_encoding != Encoding::Ascii
            && b.encoding != Encoding::Ascii
            && replace_encoding != b.encoding)
            || (search_encoding != Encoding::Ascii
                && replace_encoding != Encoding::Ascii
                && search_encoding != replace_encoding)
        {
            return Status::IncompatibleReplaceStringEncoding;
        }
    }

    {
        let b = ctx.cur_mut();
        b.last_was_replace = true;
        b.replace_string = Some(replacement.clone());
    }

    let mut ans: char = '\0';
    let mut first_search = true;
    let mut num_replace: i64 = 0;
    let mut error = Status::Ok;

    if a == Action::ReplaceAll {
        start_undo_chain(ctx.cur_mut());
    }

    while !stop() {
        let skip = !first_search && a != Action::ReplaceAll && ans != 'A' && ans != 'Y';
        {
            let (b, engine) = ctx.parts();
            let r = if b.last_was_regexp {
                search::find_regexp(b, engine, None, skip, false, stop)
            } else {
                search::find(b, engine, None, skip, false, stop)
            };
            if let Err(e) = r {
                error = e;
                break;
            }
        }

        if ans != 'A' && a == Action::Replace {
            let prompt = if ctx.cur_buffer().opt.search_back {
                "Replace (Yes/No/Last/All/Quit/Forward)"
            } else {
                "Replace (Yes/No/Last/All/Quit/Backward)"
            };
            ans = req
                .request_char(prompt, 'n')
                .map(|ch| ch.to_ascii_uppercase())
                .unwrap_or('Q');
            if ans == 'Q' {
                break;
            }
            if ans == 'A' {
                start_undo_chain(ctx.cur_mut());
            }
        }

        if ans == 'A'
            || ans == 'Y'
            || ans == 'L'
            || a == Action::ReplaceOnce
            || a == Action::ReplaceAll
        {
            {
                let b = ctx.cur_mut();
                if b.encoding == Encoding::Ascii {
                    b.encoding = replace_encoding;
                }
            }
            let (b, engine) = ctx.parts();
            let r = if b.last_was_regexp {
                search::replace_regexp(b, engine, &replacement)
            } else {
                let n = b.find_string.as_ref().map_or(0, |f| f.len());
                search::replace(b, engine, n, &replacement)
            };
            match r {
                Ok(()) => {
                    num_replace += 1;
                    update_syntax_states_from(b, b.cur_line_id, b.cur_line);
                    if engine.last_replace_empty_match {
                        let _ = if b.opt.search_back {
                            movement::char_left(b)
                        } else {
                            movement::char_right(b)
                        };
                    }
                }
                Err(e) => {
                    if a == Action::ReplaceAll || ans == 'A' {
                        end_undo_chain(ctx.cur_mut());
                    }
                    req.error(e);
                    return Status::Error;
                }
            }
        }

        if (ans == 'B' && !ctx.cur_buffer().opt.search_back)
            || (ans == 'F' && ctx.cur_buffer().opt.search_back)
        {
            let b = ctx.cur_mut();
            b.opt.search_back = !b.opt.search_back;
            b.find_string_changed = 1;
        }

        if a == Action::ReplaceOnce || ans == 'L' {
            break;
        }
        first_search = false;
    }

    if a == Action::ReplaceAll || ans == 'A' {
        end_undo_chain(ctx.cur_mut());
    }

    if num_replace > 0 {
        req.message(&format!(
            "{num_replace} replacement{} made.",
            if num_replace > 1 { "s" } else { "" }
        ));
    }
    if stop() {
        error = Status::Stopped;
    }
    if error == Status::NotFound {
        ctx.perform_wrap = 2;
    }

    if error != Status::Ok
        && (((ans != 'A' && a != Action::ReplaceAll) || first_search) || error != Status::NotFound)
    {
        print_error(req, error);
        return Status::Error;
    }
    Status::Ok
}

fn repeat_last_action(
    ctx: &mut EditorContext,
    req: &mut dyn Request,
    c: i64,
    stop: &dyn Fn() -> bool,
) -> Status {
    {
        let b = ctx.cur_buffer();
        if b.opt.read_only && b.last_was_replace {
            return Status::DocumentIsReadOnly;
        }
        if b.find_string.is_none() {
            return Status::NoSearchString;
        }
        if b.last_was_replace && b.replace_string.is_none() {
            return Status::NoReplaceString;
        }

        let search_encoding = detect_encoding(b.find_string.as_ref().unwrap());
        if search_encoding != Encoding::Ascii
            && b.encoding != Encoding::Ascii
            && search_encoding != b.encoding
        {
            return Status::IncompatibleSearchStringEncoding;
        }
        if b.last_was_replace {
            let replace_encoding = detect_encoding(b.replace_string.as_ref().unwrap());
            if (replace_encoding != Encoding::Ascii
                && b.encoding != Encoding::Ascii
                && replace_encoding != b.encoding)
                || (search_encoding != Encoding::Ascii
                    && replace_encoding != Encoding::Ascii
                    && search_encoding != replace_encoding)
            {
                return Status::IncompatibleReplaceStringEncoding;
            }
        }
    }

    let wrap = ctx.perform_wrap > 0;
    let mut error = Status::Ok;
    let mut num_replace = 0;

    start_undo_chain(ctx.cur_mut());
    for _ in 0..norm(c) {
        if stop() {
            break;
        }
        let skip = !ctx.cur_buffer().last_was_replace;
        {
            let (b, engine) = ctx.parts();
            let r = if b.last_was_regexp {
                search::find_regexp(b, engine, None, skip, wrap, stop)
            } else {
                search::find(b, engine, None, skip, wrap, stop)
            };
            if let Err(e) = r {
                error = e;
                break;
            }
        }
        if ctx.cur_buffer().last_was_replace {
            let (b, engine) = ctx.parts();
            let replacement = b.replace_string.clone().unwrap();
            let r = if b.last_was_regexp {
                search::replace_regexp(b, engine, &replacement)
            } else {
                let n = b.find_string.as_ref().map_or(0, |f| f.len());
                search::replace(b, engine, n, &replacement)
            };
            match r {
                Ok(()) => {
                    num_replace += 1;
                    update_syntax_states_from(b, b.cur_line_id, b.cur_line);
                    if engine.last_replace_empty_match {
                        let _ = if b.opt.search_back {
                            movement::char_left(b)
                        } else {
                            movement::char_right(b)
                        };
                    }
                }
                Err(e) => {
                    error = e;
                    break;
                }
            }
        }
    }
    end_undo_chain(ctx.cur_mut());

    if num_replace > 0 {
        req.message(&format!(
            "{num_replace} replacement{} made.",
            if num_replace > 1 { "s" } else { "" }
        ));
    }
    if stop() {
        error = Status::Stopped;
    }
    if error == Status::NotFound {
        ctx.perform_wrap = 2;
        return Status::Ok;
    }
    print_error(req, error);
    if error.is_error() || error == Status::Stopped {
        Status::Error
    } else {
        Status::Ok
    }
}

/// Plays a prefs file in options-only mode, so it can change settings
/// but never edit text.
fn load_prefs(ctx: &mut EditorContext, req: &mut dyn Request, path: &std::path::Path) -> Status {
    let cs = match CharStream::load_from_file(path, false, false) {
        Ok(mut cs) => {
            if cs.as_bytes().last() != Some(&0) {
                cs.append(&[0]);
            }
            cs
        }
        Err(e) => return e,
    };

    ctx.cur_mut().exec_only_options = true;
    let rc = play_macro(ctx, req, &cs);
    ctx.cur_mut().exec_only_options = false;
    rc
}
