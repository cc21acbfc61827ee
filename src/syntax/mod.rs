//! DFA-driven syntax highlighting
//!
//! A loaded syntax is a set of states, each with 256 per-byte edges, an
//! optional delimiter edge and optional keyword tables. Edges carry
//! side effects (recoloring, name buffering, delimiter capture, marks)
//! and may call into subroutine syntaxes; call frames are cached per
//! (callee, return state) pair and shared between lines.
//!
//! Parsing one line yields the attribute array for that line and the
//! highlight state to store on the *next* line; incremental repaint
//! re-parses forward only while that stored state changes.

pub mod loader;


use std::cell::RefCell;
use std::collections::HashMap;

use crate::constants::SAVED_STR_LEN;

/// A character attribute: color plus style bits.
pub type Attr = u32;

pub const FG_SHIFT: u32 = 0;
pub const BG_SHIFT: u32 = 9;
pub const FG_MASK: Attr = 0x1FF << FG_SHIFT;
pub const BG_MASK: Attr = 0x1FF << BG_SHIFT;
pub const FG_NOT_DEFAULT: Attr = 1 << 18;
pub const BG_NOT_DEFAULT: Attr = 1 << 19;
pub const INVERSE: Attr = 1 << 20;
pub const UNDERLINE: Attr = 1 << 21;
pub const BOLD: Attr = 1 << 22;
pub const BLINK: Attr = 1 << 23;
pub const DIM: Attr = 1 << 24;

/// The saved delimiter string of a highlight state, NUL-terminated
/// within a fixed buffer like the rest of the state snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedStr(pub [u8; SAVED_STR_LEN]);

impl SavedStr {
    pub fn empty() -> SavedStr {
        SavedStr([0; SAVED_STR_LEN])
    }

    pub fn as_bytes(&self) -> &[u8] {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(SAVED_STR_LEN);
        &self.0[..end]
    }

    pub fn set(&mut self, s: &[u8]) {
        let n = s.len().min(SAVED_STR_LEN - 1);
        self.0 = [0; SAVED_STR_LEN];
        self.0[..n].copy_from_slice(&s[..n]);
    }

    fn to_lower(self) -> SavedStr {
        let mut out = self;
        for b in out.0.iter_mut() {
            *b = b.to_ascii_lowercase();
        }
        out
    }
}

/// Everything needed to resume parsing at the start of a line: the
/// state, the call-stack frame, and the saved delimiter. Compared
/// field-wise when deciding whether a repaint can stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightState {
    /// Current call frame, `None` at the root level.
    pub frame: Option<u32>,
    /// State index within the current subroutine's state table.
    pub state: u32,
    /// Saved delimiter string.
    pub saved: SavedStr,
}

impl HighlightState {
    pub fn initial() -> HighlightState {
        HighlightState {
            frame: None,
            state: 0,
            saved: SavedStr::empty(),
        }
    }

    /// Fresh descriptors start invalid so the first paint recomputes.
    pub fn invalid() -> HighlightState {
        HighlightState {
            frame: None,
            state: u32::MAX,
            saved: SavedStr::empty(),
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.state == u32::MAX
    }
}

/// Index of a command in its subroutine's command arena.
pub type CmdId = u32;

/// One transition: target, side effects, and optional subroutine
/// call/return/reset semantics.
#[derive(Debug, Clone, Default)]
pub struct Cmd {
    pub new_state: u32,
    /// Repaint the last `-recolor` characters with the new state color.
    pub recolor: i32,
    pub noeat: bool,
    pub start_buffering: bool,
    pub stop_buffering: bool,
    pub save_c: bool,
    pub save_s: bool,
    pub start_mark: bool,
    pub stop_mark: bool,
    pub recolor_mark: bool,
    pub rtn: bool,
    pub reset: bool,
    /// Case-insensitive keyword/delimiter matching.
    pub ignore: bool,
    /// Subroutine to call; `new_state` is then the return state.
    pub call: Option<u32>,
    /// Keyword table consulted against the buffered name.
    pub keywords: Option<HashMap<Vec<u8>, CmdId>>,
    /// Command taken when the buffered name equals the saved delimiter.
    pub delim: Option<CmdId>,
}

/// One DFA state: a color, 256 byte edges and an optional delimiter
/// edge taken when the current character matches the saved delimiter.
pub struct State {
    pub name: String,
    pub color: Attr,
    pub cmd: Box<[CmdId; 256]>,
    pub delim: Option<CmdId>,
}

/// One subroutine: a state table with its command arena. Command 0 is
/// the default "reset" command installed on every unclaimed edge.
pub struct SubSyntax {
    pub name: String,
    pub subr: Option<String>,
    pub params: Vec<String>,
    pub states: Vec<State>,
    pub cmds: Vec<Cmd>,
}

/// A cached subroutine call frame. Frames form a tree: `child` heads
/// the list of frames callable from this one, linked by `sibling`.
#[derive(Debug, Clone)]
struct Frame {
    parent: Option<u32>,
    child: Option<u32>,
    sibling: Option<u32>,
    /// The subroutine being executed in this frame.
    sub: u32,
    /// Where to resume in the caller on `return`.
    ret_sub: u32,
    ret_state: u32,
}

/// A loaded syntax: the root subroutine, every subroutine it pulled in,
/// and the shared frame cache.
pub struct Syntax {
    pub name: String,
    pub subs: Vec<SubSyntax>,
    frames: RefCell<Vec<Frame>>,
    /// Head of the frame list callable from the root level.
    root_child: RefCell<Option<u32>>,
}

impl Syntax {
    pub(crate) fn new(name: String) -> Syntax {
        Syntax {
            name,
            subs: Vec::new(),
            frames: RefCell::new(Vec::new()),
            root_child: RefCell::new(None),
        }
    }

    fn sub_of(&self, state: &HighlightState) -> u32 {
        match state.frame {
            Some(f) => self.frames.borrow()[f as usize].sub,
            None => 0,
        }
    }

    /// Finds or creates the cached frame for calling `callee` with the
    /// given return point, below `parent`.
    fn enter_frame(
        &self,
        parent: Option<u32>,
        callee: u32,
        ret_sub: u32,
        ret_state: u32,
    ) -> u32 {
        let mut frames = self.frames.borrow_mut();
        let mut slot = match parent {
            Some(p) => frames[p as usize].child,
            None => *self.root_child.borrow(),
        };
        while let Some(f) = slot {
            let fr = &frames[f as usize];
            if fr.sub == callee && fr.ret_sub == ret_sub && fr.ret_state == ret_state {
                return f;
            }
            slot = fr.sibling;
        }
        let id = frames.len() as u32;
        let sibling = match parent {
            Some(p) => frames[p as usize].child,
            None => *self.root_child.borrow(),
        };
        frames.push(Frame {
            parent,
            child: None,
            sibling,
            sub: callee,
            ret_sub,
            ret_state,
        });
        match parent {
            Some(p) => frames[p as usize].child = Some(id),
            None => *self.root_child.borrow_mut() = Some(id),
        }
        id
    }

    /// Runs the DFA over one line, writing one attribute per character
    /// into `attr` and returning the state to store on the next line.
    /// A virtual `\n` is processed after the last byte so end-of-line
    /// constructs resolve, without contributing an attribute.
    pub fn parse(&self, line: &[u8], h_state: HighlightState, utf8: bool, attr: &mut Vec<Attr>) -> HighlightState {
        use crate::character::{get_char, utf8_len};
        use crate::encoding::Encoding;

        attr.clear();

        let mut state = if h_state.is_invalid() {
            HighlightState::initial()
        } else {
            h_state
        };
        let mut sub = self.sub_of(&state) as usize;
        let mut st = state.state as usize;

        let mut buf: Vec<u8> = Vec::with_capacity(SAVED_STR_LEN);
        let mut buf_en = false;
        let mut ofst: i32 = 0;
        let mut mark1: i32 = 0;
        let mut mark2: i32 = 0;
        let mut mark_en = false;

        let mut p = 0usize;
        loop {
            let at_end = p >= line.len();
            let raw: u32 = if at_end {
                b'\n' as u32
            } else if utf8 {
                get_char(&line[p..], Encoding::Utf8)
            } else {
                line[p] as u32
            };
            if !at_end {
                p += if utf8 {
                    utf8_len(line[p]).unwrap_or(1)
                } else {
                    1
                };
            }
            // Code points outside the byte range step through a stand-in
            // edge so multibyte text cannot index out of the tables.
            let c = if raw > 255 { 0x1F } else { raw as u8 };

            attr.push(0);
            let pos = attr.len(); // 1-based position of this char

            loop {
                attr[pos - 1] = self.subs[sub].states[st].color;

                let state_delim = self.subs[sub].states[st].delim;
                let saved = state.saved.as_bytes();
                let mut cmd_id = match state_delim {
                    Some(d) if saved.len() == 1 && c == saved[0] => d,
                    _ => self.subs[sub].states[st].cmd[c as usize],
                };
                let cmd_sub = sub;

                // Delimiter and keyword redirection against the
                // buffered name.
                let mut recolor_name = false;
                {
                    let cmd = &self.subs[cmd_sub].cmds[cmd_id as usize];
                    let (name, saved_cmp): (Vec<u8>, Vec<u8>) = if cmd.ignore {
                        (
                            buf.to_ascii_lowercase(),
                            state.saved.to_lower().as_bytes().to_vec(),
                        )
                    } else {
                        (buf.clone(), state.saved.as_bytes().to_vec())
                    };
                    if let Some(d) = cmd.delim.filter(|_| name == saved_cmp) {
                        cmd_id = d;
                        recolor_name = true;
                    } else if let Some(&k) = cmd.keywords.as_ref().and_then(|kw| kw.get(&name)) {
                        cmd_id = k;
                        recolor_name = true;
                    }
                }

                let cmd = self.subs[cmd_sub].cmds[cmd_id as usize].clone();

                // Determine the new state.
                if let Some(callee) = cmd.call {
                    let f = self.enter_frame(state.frame, callee, cmd_sub as u32, cmd.new_state);
                    state.frame = Some(f);
                    sub = callee as usize;
                    st = 0;
                } else if cmd.rtn {
                    if let Some(f) = state.frame {
                        let fr = self.frames.borrow()[f as usize].clone();
                        state.frame = fr.parent;
                        sub = fr.ret_sub as usize;
                        st = fr.ret_state as usize;
                    } else {
                        // Not in a subroutine: ignore the return.
                        st = cmd.new_state as usize;
                    }
                } else if cmd.reset {
                    state.frame = None;
                    sub = 0;
                    st = 0;
                } else {
                    st = cmd.new_state as usize;
                }

                let color = self.subs[sub].states[st].color;
                // `pos` counts one past the current character, so the
                // current character's cell is `pos - 1 + 0` and joe's
                // attr[x] is cell `pos + x` for negative x.
                let paint = |attr: &mut Vec<Attr>, cell: i32| {
                    if cell >= 0 && (cell as usize) < attr.len() {
                        attr[cell as usize] = color;
                    }
                };

                // Repaint the buffered name with the new state color.
                if recolor_name {
                    let n = buf.len() as i32 + 1;
                    for x in -n..-1i32 {
                        paint(attr, pos as i32 + x - ofst);
                    }
                }

                // Plain recoloring.
                for x in cmd.recolor..0 {
                    paint(attr, pos as i32 + x);
                }

                // Mark recoloring.
                if cmd.recolor_mark {
                    for x in -mark1..-mark2 {
                        paint(attr, pos as i32 + x);
                    }
                }

                if cmd.save_s {
                    state.saved.set(&buf);
                }
                if cmd.save_c {
                    let mate = match c {
                        b'<' => b'>',
                        b'(' => b')',
                        b'[' => b']',
                        b'{' => b'}',
                        b'`' => b'\'',
                        c => c,
                    };
                    state.saved.set(&[mate]);
                }
                if cmd.start_buffering {
                    buf.clear();
                    buf_en = true;
                    ofst = 0;
                }
                if cmd.stop_buffering {
                    buf_en = false;
                }
                if cmd.start_mark {
                    mark1 = 1;
                    mark2 = 1;
                    mark_en = true;
                }
                if cmd.stop_mark {
                    mark_en = false;
                    mark2 = 1;
                }

                if !cmd.noeat {
                    break;
                }
            }

            // Accumulate the name buffer; one consumption per byte.
            if buf_en && buf.len() < SAVED_STR_LEN - 1 {
                buf.push(c);
            }
            if !buf_en {
                ofst += 1;
            }
            mark1 += 1;
            if !mark_en {
                mark2 += 1;
            }

            if at_end {
                break;
            }
        }

        // The virtual newline contributed one attribute; drop it.
        attr.pop();

        state.state = st as u32;
        state
    }

}

/// Recomputes the stored initial state of every line from the top of
/// the buffer.
pub fn reset_syntax_states(b: &mut crate::buffer::Buffer) {
    use crate::encoding::Encoding;

    let Some(syn) = b.syn.clone() else { return };
    let utf8 = b.encoding == Encoding::Utf8;
    let mut attr = Vec::new();
    let mut state = HighlightState::initial();
    let mut id = b.lines.first();
    while !b.lines.is_tail(id) {
        if let Some(h) = &mut b.lines.get_mut(id).highlight {
            *h = state;
        }
        state = {
            let line = b.line_bytes(id);
            syn.parse(line, state, utf8, &mut attr)
        };
        id = b.lines.next(id);
    }
    b.attr_valid = false;
}

/// Propagates highlight states forward from a line that just changed,
/// re-parsing successive lines only while their stored initial state
/// differs from the newly computed one.
pub fn update_syntax_states_from(b: &mut crate::buffer::Buffer, start: crate::line::LineId, _line: usize) {
    use crate::encoding::Encoding;

    let Some(syn) = b.syn.clone() else { return };
    let utf8 = b.encoding == Encoding::Utf8;

    let mut state = match b.lines.get(start).highlight {
        Some(h) if !h.is_invalid() => h,
        Some(_) => {
            reset_syntax_states(b);
            return;
        }
        None => return,
    };

    let mut attr = Vec::new();
    let mut id = start;
    loop {
        let next_state = {
            let line = b.line_bytes(id);
            syn.parse(line, state, utf8, &mut attr)
        };
        let next = b.lines.next(id);
        if b.lines.is_tail(next) {
            break;
        }
        match b.lines.get(next).highlight {
            Some(h) if h == next_state => break,
            _ => {
                if let Some(h) = &mut b.lines.get_mut(next).highlight {
                    *h = next_state;
                }
            }
        }
        state = next_state;
        id = next;
    }
    b.attr_valid = false;
}

/// Fills the buffer's attribute cache for the current line and records
/// the state after it.
pub fn ensure_attributes(b: &mut crate::buffer::Buffer) {
    use crate::encoding::Encoding;

    if b.attr_valid {
        return;
    }
    let Some(syn) = b.syn.clone() else { return };
    let utf8 = b.encoding == Encoding::Utf8;

    let state = match b.lines.get(b.cur_line_id).highlight {
        Some(h) if !h.is_invalid() => h,
        Some(_) => {
            reset_syntax_states(b);
            match b.lines.get(b.cur_line_id).highlight {
                Some(h) => h,
                None => return,
            }
        }
        None => return,
    };

    let mut attr = std::mem::take(&mut b.attr_buf);
    let next = {
        let line = b.line_bytes(b.cur_line_id);
        syn.parse(line, state, utf8, &mut attr)
    };
    b.attr_buf = attr;
    b.next_state = next;
    b.attr_valid = true;
}

/// Translates one color word (`bold`, `red`, `bg_cyan`, `fg_123`, …)
/// into attribute bits.
pub fn meta_color_single(s: &str) -> Attr {
    let fg = |n: u32| FG_NOT_DEFAULT | (n << FG_SHIFT);
    let bg = |n: u32| BG_NOT_DEFAULT | (n << BG_SHIFT);
    match s {
        "inverse" => INVERSE,
        "underline" => UNDERLINE,
        "bold" => BOLD,
        "blink" => BLINK,
        "dim" => DIM,
        "black" => fg(0),
        "red" => fg(1),
        "green" => fg(2),
        "yellow" => fg(3),
        "blue" => fg(4),
        "magenta" => fg(5),
        "cyan" => fg(6),
        "white" => fg(7),
        "BLACK" => fg(8),
        "RED" => fg(9),
        "GREEN" => fg(10),
        "YELLOW" => fg(11),
        "BLUE" => fg(12),
        "MAGENTA" => fg(13),
        "CYAN" => fg(14),
        "WHITE" => fg(15),
        "bg_black" => bg(0),
        "bg_red" => bg(1),
        "bg_green" => bg(2),
        "bg_yellow" => bg(3),
        "bg_blue" => bg(4),
        "bg_magenta" => bg(5),
        "bg_cyan" => bg(6),
        "bg_white" => bg(7),
        "bg_BLACK" => bg(8),
        "bg_RED" => bg(9),
        "bg_GREEN" => bg(10),
        "bg_YELLOW" => bg(11),
        "bg_BLUE" => bg(12),
        "bg_MAGENTA" => bg(13),
        "bg_CYAN" => bg(14),
        "bg_WHITE" => bg(15),
        _ => {
            // 256-color cube and grey ramp forms: fg_RGB / bg_RGB with
            // R,G,B in 0-5, or fg_N / bg_N with N a grey index 0-23.
            let (is_fg, rest) = if let Some(r) = s.strip_prefix("fg_") {
                (true, r)
            } else if let Some(r) = s.strip_prefix("bg_") {
                (false, r)
            } else {
                return 0;
            };
            let code = if rest.len() == 3 && rest.bytes().all(|b| (b'0'..=b'5').contains(&b)) {
                let d = |i: usize| (rest.as_bytes()[i] - b'0') as u32;
                Some(16 + d(0) * 36 + d(1) * 6 + d(2))
            } else {
                rest.parse::<u32>().ok().filter(|&n| n <= 23).map(|n| 232 + n)
            };
            match code {
                Some(n) if is_fg => fg(n),
                Some(n) => bg(n),
                None => 0,
            }
        }
    }
}

/// Translates a `+`-joined color expression into attribute bits.
pub fn meta_color(s: &str) -> Attr {
    s.split('+').map(meta_color_single).fold(0, |a, b| a | b)
}
