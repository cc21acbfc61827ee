//! Loader for `.jsf` syntax definition files
//!
//! The dialect: `=Class color+color` color definitions, `:state class`
//! state introductions, edge lines `"chars" target [options]` (with `*`
//! for every byte and `&` for the delimiter edge), option keywords
//! (`buffer`, `hold`, `save_c`, `save_s`, `recolor=-N`, `noeat`,
//! `mark`, `markend`, `recolormark`, `call=[file][.subr](params)`,
//! `return`, `reset`, `strings`/`istrings` … `done`), plus `.ifdef`
//! conditionals and `.subr NAME` / `.end` subroutine blocks.

use std::collections::HashMap;
use std::path::PathBuf;

use log::warn;

use crate::constants::SYNTAX_EXT;
use crate::error::{Result, Status};
use crate::syntax::{meta_color, Attr, Cmd, CmdId, State, SubSyntax, Syntax};

/// Where syntax definition files come from. The editor context provides
/// a directory-based implementation; tests provide an in-memory one.
pub trait SyntaxFiles {
    /// The text of `NAME.jsf`, if the store has it.
    fn read(&self, name: &str) -> Option<String>;
}

/// Looks a syntax file up in a list of directories, user paths first.
pub struct SyntaxDirs<'a>(pub &'a [PathBuf]);

impl SyntaxFiles for SyntaxDirs<'_> {
    fn read(&self, name: &str) -> Option<String> {
        for dir in self.0 {
            let path = dir.join(format!("{name}{SYNTAX_EXT}"));
            if let Ok(text) = std::fs::read_to_string(&path) {
                return Some(text);
            }
        }
        None
    }
}

/// Loads the named syntax and every subroutine syntax it references.
pub fn load_syntax(files: &dyn SyntaxFiles, name: &str) -> Result<Syntax> {
    let mut syntax = Syntax::new(name.to_string());
    let mut cache = HashMap::new();
    load_sub(files, &mut syntax, &mut cache, name, None, Vec::new())?;
    Ok(syntax)
}

type SubKey = (String, Option<String>, Vec<String>);

/// Loads one (file, subroutine, params) unit, reusing the cache for
/// repeated calls. Returns its subroutine index.
fn load_sub(
    files: &dyn SyntaxFiles,
    syntax: &mut Syntax,
    cache: &mut HashMap<SubKey, u32>,
    name: &str,
    subr: Option<&str>,
    params: Vec<String>,
) -> Result<u32> {
    let key = (name.to_string(), subr.map(str::to_string), params.clone());
    if let Some(&id) = cache.get(&key) {
        return Ok(id);
    }

    let text = files.read(name).ok_or(Status::CantOpenFile)?;

    // Reserve the slot first so recursive calls see a stable id.
    let id = syntax.subs.len() as u32;
    syntax.subs.push(SubSyntax {
        name: name.to_string(),
        subr: subr.map(str::to_string),
        params: params.clone(),
        states: Vec::new(),
        cmds: vec![Cmd {
            reset: true,
            ..Cmd::default()
        }],
    });
    cache.insert(key, id);

    let mut loader = SubLoader {
        files,
        syntax,
        cache,
        id,
        colors: HashMap::new(),
        state_ids: HashMap::new(),
        if_stack: Vec::new(),
        cur_state: None,
        inside_subr: false,
        this_one: false,
        want_subr: subr.map(str::to_string),
    };
    loader.run(&text)?;

    if syntax.subs[id as usize].states.is_empty() {
        warn!("syntax {name}: no states defined");
        return Err(Status::SyntaxError);
    }
    Ok(id)
}

struct SubLoader<'a, 'b> {
    files: &'a dyn SyntaxFiles,
    syntax: &'b mut Syntax,
    cache: &'b mut HashMap<SubKey, u32>,
    id: u32,
    colors: HashMap<String, Attr>,
    state_ids: HashMap<String, u32>,
    if_stack: Vec<IfFrame>,
    cur_state: Option<u32>,
    inside_subr: bool,
    this_one: bool,
    want_subr: Option<String>,
}

struct IfFrame {
    ignore: bool,
    skip: bool,
    else_part: bool,
}

impl SubLoader<'_, '_> {
    fn run(&mut self, text: &str) -> Result {
        let mut lines = text.lines();
        while let Some(raw) = lines.next() {
            let mut p = Parser::new(raw);
            p.skip_ws();
            if p.eat('.') {
                self.control_line(&mut p)?;
            } else if self.ignoring() {
                // Inside a false .ifdef branch.
            } else if p.eat('=') {
                self.color_line(&mut p);
            } else if self.skip_for_subr() {
                // Not the subroutine block we were asked to load.
            } else if p.eat(':') {
                self.state_line(&mut p);
            } else if p.eat('-') {
                // Sync-lines directive of the original dialect; ignored.
            } else {
                self.edge_line(&mut p, &mut lines)?;
            }
        }
        Ok(())
    }

    fn ignoring(&self) -> bool {
        self.if_stack.last().map_or(false, |f| f.ignore)
    }

    fn skip_for_subr(&self) -> bool {
        (self.want_subr.is_some() && !self.this_one)
            || (self.want_subr.is_none() && self.inside_subr)
    }

    fn sub(&mut self) -> &mut SubSyntax {
        &mut self.syntax.subs[self.id as usize]
    }

    /// Finds or creates a state; fresh states default to white and every
    /// edge pointing at the shared reset command.
    fn find_state(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.state_ids.get(name) {
            return id;
        }
        let id = self.sub().states.len() as u32;
        self.sub().states.push(State {
            name: name.to_string(),
            color: meta_color("white"),
            cmd: Box::new([0; 256]),
            delim: None,
        });
        self.state_ids.insert(name.to_string(), id);
        id
    }

    fn control_line(&mut self, p: &mut Parser) -> Result {
        let word = p.ident();
        match word.as_str() {
            "ifdef" => {
                let mut frame = IfFrame {
                    ignore: true,
                    skip: true,
                    else_part: false,
                };
                if !self.ignoring() {
                    p.skip_ws();
                    let param = p.ident();
                    frame.ignore = !self.sub().params.iter().any(|q| *q == param);
                    frame.skip = false;
                }
                self.if_stack.push(frame);
            }
            "else" => {
                let matched = match self.if_stack.last_mut() {
                    Some(f) if !f.else_part => {
                        f.else_part = true;
                        if !f.skip {
                            f.ignore = !f.ignore;
                        }
                        true
                    }
                    _ => false,
                };
                if !matched {
                    warn!("syntax {}: else with no matching if", self.sub().name);
                }
            }
            "endif" => {
                if self.if_stack.pop().is_none() {
                    warn!("syntax {}: endif with no matching if", self.sub().name);
                }
            }
            "subr" => {
                p.skip_ws();
                let name = p.ident();
                if !self.ignoring() {
                    self.inside_subr = true;
                    self.this_one = self.want_subr.as_deref() == Some(name.as_str());
                }
            }
            "end" => {
                if !self.ignoring() {
                    self.inside_subr = false;
                    self.this_one = false;
                }
            }
            other => warn!("syntax {}: unknown control statement .{other}", self.sub().name),
        }
        Ok(())
    }

    fn color_line(&mut self, p: &mut Parser) {
        let name = p.ident();
        let mut attr = 0;
        loop {
            p.skip_ws();
            let word = p.color_word();
            if word.is_empty() {
                break;
            }
            attr |= meta_color(&word);
        }
        self.colors.insert(name, attr);
    }

    fn state_line(&mut self, p: &mut Parser) {
        let name = p.ident();
        if name.is_empty() {
            warn!("syntax {}: missing state name", self.sub().name);
            return;
        }
        let id = self.find_state(&name);
        p.skip_ws();
        let class = p.ident();
        match self.colors.get(&class).copied() {
            Some(attr) => self.sub().states[id as usize].color = attr,
            None => {
                warn!("syntax {}: unknown class {class}", self.sub().name);
                self.sub().states[id as usize].color = 0;
            }
        }
        self.cur_state = Some(id);
    }

    fn edge_line(&mut self, p: &mut Parser, lines: &mut std::str::Lines<'_>) -> Result {
        p.skip_ws();
        let Some(first) = p.peek() else { return Ok(()) };
        if first != '"' && first != '*' && first != '&' {
            if !p.at_comment_or_end() {
                warn!("syntax {}: unrecognized line", self.sub().name);
            }
            return Ok(());
        }
        let Some(state) = self.cur_state else {
            warn!("syntax {}: edge with no current state", self.sub().name);
            return Ok(());
        };

        let mut clist = [false; 256];
        let mut delim = false;
        if p.eat('*') {
            clist = [true; 256];
        } else if p.eat('&') {
            delim = true;
        } else {
            let spec = p.string();
            for (lo, hi) in parse_ranges(&spec) {
                for b in lo..=hi {
                    clist[b as usize] = true;
                }
            }
        }

        p.skip_ws();
        let target = p.ident();
        if target.is_empty() {
            warn!("syntax {}: missing jump", self.sub().name);
            return Ok(());
        }
        let target = self.find_state(&target);
        let cmd = Cmd {
            new_state: target,
            ..Cmd::default()
        };
        let cmd_id = self.push_cmd(cmd);
        self.parse_options(p, cmd_id, lines, false)?;

        let st = &mut self.sub().states[state as usize];
        if delim {
            st.delim = Some(cmd_id);
        } else {
            for (b, &set) in clist.iter().enumerate() {
                if set {
                    st.cmd[b] = cmd_id;
                }
            }
        }
        Ok(())
    }

    fn push_cmd(&mut self, cmd: Cmd) -> CmdId {
        let id = self.sub().cmds.len() as CmdId;
        self.sub().cmds.push(cmd);
        id
    }

    /// Parses the option words following an edge (or a keyword line).
    fn parse_options(
        &mut self,
        p: &mut Parser,
        cmd_id: CmdId,
        lines: &mut std::str::Lines<'_>,
        parsing_strings: bool,
    ) -> Result {
        loop {
            p.skip_ws();
            let word = p.ident();
            if word.is_empty() {
                return Ok(());
            }
            match word.as_str() {
                "buffer" => self.cmd_mut(cmd_id).start_buffering = true,
                "hold" => self.cmd_mut(cmd_id).stop_buffering = true,
                "save_c" => self.cmd_mut(cmd_id).save_c = true,
                "save_s" => self.cmd_mut(cmd_id).save_s = true,
                "noeat" => self.cmd_mut(cmd_id).noeat = true,
                "mark" => self.cmd_mut(cmd_id).start_mark = true,
                "markend" => self.cmd_mut(cmd_id).stop_mark = true,
                "recolormark" => self.cmd_mut(cmd_id).recolor_mark = true,
                "return" => self.cmd_mut(cmd_id).rtn = true,
                "reset" => self.cmd_mut(cmd_id).reset = true,
                "recolor" => {
                    p.skip_ws();
                    if p.eat('=') {
                        p.skip_ws();
                        self.cmd_mut(cmd_id).recolor = p.int();
                    } else {
                        warn!("syntax {}: missing value for recolor", self.sub().name);
                    }
                }
                "call" => {
                    p.skip_ws();
                    if !p.eat('=') {
                        warn!("syntax {}: missing value for call", self.sub().name);
                        continue;
                    }
                    p.skip_ws();
                    let (file, subr) = if p.eat('.') {
                        (self.sub().name.clone(), Some(p.ident()))
                    } else {
                        let file = p.ident();
                        if p.eat('.') {
                            (file, Some(p.ident()))
                        } else {
                            (file, None)
                        }
                    };
                    let params = p.params();
                    let callee = load_sub(
                        self.files,
                        self.syntax,
                        self.cache,
                        &file,
                        subr.as_deref(),
                        params,
                    )?;
                    self.cmd_mut(cmd_id).call = Some(callee);
                }
                "strings" | "istrings" if !parsing_strings => {
                    let ignore = word.starts_with('i');
                    self.cmd_mut(cmd_id).ignore = ignore;
                    self.parse_strings(cmd_id, lines, ignore)?;
                }
                other => warn!("syntax {}: unknown option {other}", self.sub().name),
            }
        }
    }

    /// Parses the body of a `strings` block: one `"word" state [opts]`
    /// per line until `done`. The special word `&` becomes the
    /// buffered-name delimiter command.
    fn parse_strings(&mut self, cmd_id: CmdId, lines: &mut std::str::Lines<'_>, ignore: bool) -> Result {
        while let Some(raw) = lines.next() {
            let mut p = Parser::new(raw);
            p.skip_ws();
            if p.at_comment_or_end() {
                continue;
            }
            if p.eat_word("done") {
                return Ok(());
            }
            if p.peek() != Some('"') {
                warn!("syntax {}: missing string in strings block", self.sub().name);
                continue;
            }
            let mut word = p.string();
            if ignore {
                word.make_ascii_lowercase();
            }
            p.skip_ws();
            let target = p.ident();
            if target.is_empty() {
                warn!("syntax {}: missing state name in strings block", self.sub().name);
                continue;
            }
            let target = self.find_state(&target);
            let kw_cmd = Cmd {
                new_state: target,
                noeat: true,
                ..Cmd::default()
            };
            let kw_id = self.push_cmd(kw_cmd);
            self.parse_options(&mut p, kw_id, lines, true)?;
            if word == b"&" {
                self.cmd_mut(cmd_id).delim = Some(kw_id);
            } else {
                self.cmd_mut(cmd_id)
                    .keywords
                    .get_or_insert_with(HashMap::new)
                    .insert(word, kw_id);
            }
        }
        Ok(())
    }

    fn cmd_mut(&mut self, id: CmdId) -> &mut Cmd {
        &mut self.syntax.subs[self.id as usize].cmds[id as usize]
    }
}

/// Expands a quoted character-class string into byte ranges: `a-z`
/// means a range, everything else stands for itself.
fn parse_ranges(spec: &[u8]) -> Vec<(u8, u8)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < spec.len() {
        let first = spec[i];
        if i + 2 < spec.len() && spec[i + 1] == b'-' {
            let second = spec[i + 2];
            out.push((first.min(second), first.max(second)));
            i += 3;
        } else {
            out.push((first, first));
            i += 1;
        }
    }
    out
}

/// A hand-rolled cursor over one definition line.
struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(line: &'a str) -> Parser<'a> {
        Parser {
            bytes: line.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.bytes.get(self.pos).map(|&b| b as char)
    }

    fn skip_ws(&mut self) {
        while matches!(self.bytes.get(self.pos), Some(b' ') | Some(b'\t')) {
            self.pos += 1;
        }
    }

    fn at_comment_or_end(&self) -> bool {
        matches!(self.bytes.get(self.pos), None | Some(b'#'))
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        let end = self.pos + word.len();
        if self.bytes.len() >= end
            && &self.bytes[self.pos..end] == word.as_bytes()
            && !matches!(self.bytes.get(end), Some(b) if b.is_ascii_alphanumeric() || *b == b'_')
        {
            self.pos = end;
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> String {
        let start = self.pos;
        while matches!(self.bytes.get(self.pos), Some(b) if b.is_ascii_alphanumeric() || *b == b'_') {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned()
    }

    /// A color word may contain `+` compounds and digits.
    fn color_word(&mut self) -> String {
        let start = self.pos;
        while matches!(
            self.bytes.get(self.pos),
            Some(b) if b.is_ascii_alphanumeric() || matches!(*b, b'_' | b'+')
        ) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned()
    }

    fn int(&mut self) -> i32 {
        let start = self.pos;
        if matches!(self.bytes.get(self.pos), Some(b'-') | Some(b'+')) {
            self.pos += 1;
        }
        while matches!(self.bytes.get(self.pos), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
        }
        std::str::from_utf8(&self.bytes[start..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    /// A double-quoted string with `\`-escapes; returns the bytes.
    fn string(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        if !self.eat('"') {
            return out;
        }
        while let Some(&b) = self.bytes.get(self.pos) {
            self.pos += 1;
            match b {
                b'"' => break,
                b'\\' => {
                    if let Some(&e) = self.bytes.get(self.pos) {
                        self.pos += 1;
                        out.push(match e {
                            b'n' => b'\n',
                            b't' => b'\t',
                            b'r' => b'\r',
                            b'0' => 0,
                            other => other,
                        });
                    }
                }
                other => out.push(other),
            }
        }
        out
    }

    /// An optional `(a b c)` parameter list.
    fn params(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        self.skip_ws();
        if !self.eat('(') {
            return out;
        }
        loop {
            self.skip_ws();
            if self.eat(')') || self.peek().is_none() {
                break;
            }
            let id = self.ident();
            if id.is_empty() {
                self.pos += 1;
            } else {
                out.push(id);
            }
        }
        out
    }
}
