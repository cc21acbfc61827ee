//! The command language: actions, the command table and the parser
//!
//! Every user-visible command has a long and a short name and a set of
//! argument-policy flags. A command line is one command name followed
//! by an optional signed integer (any C-style base) or an optionally
//! quoted string. Lines whose first non-blank character is not a
//! letter are comments, parsed as recordable no-ops.

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::Status;

/// Everything the dispatcher can be asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    AdjustView,
    AtomicUndo,
    AutoIndent,
    AutoMatchBracket,
    AutoPrefs,
    Backspace,
    Binary,
    Capitalize,
    CaseSearch,
    Center,
    Clear,
    ClipNumber,
    CloseDoc,
    Copy,
    Crlf,
    Cut,
    DelTabs,
    DeleteChar,
    DeleteEol,
    DeleteLine,
    DeleteNextWord,
    DeletePrevWord,
    DoUndo,
    Erase,
    EscapeTime,
    Exec,
    Exit,
    Find,
    FindRegExp,
    FreeForm,
    GotoBookmark,
    GotoColumn,
    GotoLine,
    GotoMark,
    Insert,
    InsertChar,
    InsertLine,
    InsertString,
    InsertTab,
    LineDown,
    LineUp,
    LoadPrefs,
    Macro,
    Mark,
    MarkVert,
    MatchBracket,
    Modified,
    MoveBos,
    MoveEof,
    MoveEol,
    MoveEow,
    MoveIncDown,
    MoveIncUp,
    MoveLeft,
    MoveRight,
    MoveSof,
    MoveSol,
    MoveTos,
    NewDoc,
    NextDoc,
    NextPage,
    NextWord,
    NoFileReq,
    Nop,
    Open,
    OpenClip,
    OpenMacro,
    OpenNew,
    PageDown,
    PageUp,
    Paragraph,
    Paste,
    PasteVert,
    Play,
    PopPrefs,
    PreserveCr,
    PrevDoc,
    PrevPage,
    PrevWord,
    PushPrefs,
    Quit,
    ReadOnly,
    Record,
    Redo,
    RepeatLast,
    Replace,
    ReplaceAll,
    ReplaceOnce,
    RightMargin,
    Save,
    SaveAll,
    SaveAs,
    SaveClip,
    SaveMacro,
    SavePrefs,
    SearchBack,
    SelectDoc,
    SetBookmark,
    Shift,
    ShiftTabs,
    Syntax,
    TabSize,
    Tabs,
    Through,
    ToLower,
    ToUpper,
    ToggleSeof,
    ToggleSeol,
    UndelLine,
    Undo,
    UnloadMacros,
    UnsetBookmark,
    Utf8,
    Utf8Auto,
    VerboseMacros,
    VisualBell,
    WordWrap,
}

/// This command must be called without an argument.
pub const NO_ARGS: u8 = 1 << 1;
/// The argument is a string (default is a number).
pub const ARG_IS_STRING: u8 = 1 << 2;
/// The command controls an option and may run in options-only mode.
pub const IS_OPTION: u8 = 1 << 3;
/// Never record this command in a macro.
pub const DO_NOT_RECORD: u8 = 1 << 4;
/// An empty string ("") is an acceptable argument.
pub const EMPTY_STRING_OK: u8 = 1 << 5;

pub struct CommandSpec {
    pub action: Action,
    pub name: &'static str,
    pub short_name: &'static str,
    pub flags: u8,
}

macro_rules! cmd {
    ($action:ident, $name:literal, $short:literal, $flags:expr) => {
        CommandSpec {
            action: Action::$action,
            name: $name,
            short_name: $short,
            flags: $flags,
        }
    };
}

/// The command table, in the same order as the `Action` enum.
pub static COMMANDS: &[CommandSpec] = &[
    cmd!(AdjustView, "AdjustView", "AV", ARG_IS_STRING),
    cmd!(AtomicUndo, "AtomicUndo", "AU", ARG_IS_STRING | EMPTY_STRING_OK),
    cmd!(AutoIndent, "AutoIndent", "AI", IS_OPTION),
    cmd!(AutoMatchBracket, "AutoMatchBracket", "AMB", IS_OPTION),
    cmd!(AutoPrefs, "AutoPrefs", "AP", IS_OPTION),
    cmd!(Backspace, "Backspace", "BS", 0),
    cmd!(Binary, "Binary", "B", IS_OPTION),
    cmd!(Capitalize, "Capitalize", "CAP", 0),
    cmd!(CaseSearch, "CaseSearch", "CS", IS_OPTION),
    cmd!(Center, "Center", "CE", 0),
    cmd!(Clear, "Clear", "CL", NO_ARGS),
    cmd!(ClipNumber, "ClipNumber", "CN", IS_OPTION),
    cmd!(CloseDoc, "CloseDoc", "CD", NO_ARGS),
    cmd!(Copy, "Copy", "C", 0),
    cmd!(Crlf, "CRLF", "LF", IS_OPTION),
    cmd!(Cut, "Cut", "CUT", 0),
    cmd!(DelTabs, "DelTabs", "DT", IS_OPTION),
    cmd!(DeleteChar, "DeleteChar", "DC", 0),
    cmd!(DeleteEol, "DeleteEOL", "DE", NO_ARGS),
    cmd!(DeleteLine, "DeleteLine", "DL", 0),
    cmd!(DeleteNextWord, "DeleteNextWord", "DNW", 0),
    cmd!(DeletePrevWord, "DeletePrevWord", "DPW", 0),
    cmd!(DoUndo, "DoUndo", "DU", IS_OPTION),
    cmd!(Erase, "Erase", "E", 0),
    cmd!(EscapeTime, "EscapeTime", "ET", IS_OPTION),
    cmd!(Exec, "Exec", "EX", ARG_IS_STRING | DO_NOT_RECORD),
    cmd!(Exit, "Exit", "X", NO_ARGS),
    cmd!(Find, "Find", "F", ARG_IS_STRING),
    cmd!(FindRegExp, "FindRegExp", "FX", ARG_IS_STRING),
    cmd!(FreeForm, "FreeForm", "FF", IS_OPTION),
    cmd!(GotoBookmark, "GotoBookmark", "GBM", ARG_IS_STRING | EMPTY_STRING_OK),
    cmd!(GotoColumn, "GotoColumn", "GC", 0),
    cmd!(GotoLine, "GotoLine", "GL", 0),
    cmd!(GotoMark, "GotoMark", "GM", NO_ARGS),
    cmd!(Insert, "Insert", "I", IS_OPTION),
    cmd!(InsertChar, "InsertChar", "IC", 0),
    cmd!(InsertLine, "InsertLine", "IL", 0),
    cmd!(InsertString, "InsertString", "IS", ARG_IS_STRING),
    cmd!(InsertTab, "InsertTab", "IT", 0),
    cmd!(LineDown, "LineDown", "LD", 0),
    cmd!(LineUp, "LineUp", "LU", 0),
    cmd!(LoadPrefs, "LoadPrefs", "LP", ARG_IS_STRING),
    cmd!(Macro, "Macro", "MA", ARG_IS_STRING | DO_NOT_RECORD),
    cmd!(Mark, "Mark", "M", IS_OPTION),
    cmd!(MarkVert, "MarkVert", "MV", IS_OPTION),
    cmd!(MatchBracket, "MatchBracket", "MB", NO_ARGS),
    cmd!(Modified, "Modified", "MOD", IS_OPTION),
    cmd!(MoveBos, "MoveBOS", "MBS", NO_ARGS),
    cmd!(MoveEof, "MoveEOF", "MEF", NO_ARGS),
    cmd!(MoveEol, "MoveEOL", "ME", NO_ARGS),
    cmd!(MoveEow, "MoveEOW", "MEW", NO_ARGS),
    cmd!(MoveIncDown, "MoveIncDown", "MID", NO_ARGS),
    cmd!(MoveIncUp, "MoveIncUp", "MIU", NO_ARGS),
    cmd!(MoveLeft, "MoveLeft", "ML", 0),
    cmd!(MoveRight, "MoveRight", "MR", 0),
    cmd!(MoveSof, "MoveSOF", "MSF", NO_ARGS),
    cmd!(MoveSol, "MoveSOL", "MS", NO_ARGS),
    cmd!(MoveTos, "MoveTOS", "MT", NO_ARGS),
    cmd!(NewDoc, "NewDoc", "N", NO_ARGS),
    cmd!(NextDoc, "NextDoc", "ND", NO_ARGS),
    cmd!(NextPage, "NextPage", "NP", 0),
    cmd!(NextWord, "NextWord", "NW", 0),
    cmd!(NoFileReq, "NoFileReq", "NFR", IS_OPTION),
    cmd!(Nop, "NOP", "NOP", NO_ARGS),
    cmd!(Open, "Open", "O", ARG_IS_STRING),
    cmd!(OpenClip, "OpenClip", "OC", ARG_IS_STRING),
    cmd!(OpenMacro, "OpenMacro", "OM", ARG_IS_STRING),
    cmd!(OpenNew, "OpenNew", "ON", ARG_IS_STRING),
    cmd!(PageDown, "PageDown", "PGD", 0),
    cmd!(PageUp, "PageUp", "PGU", 0),
    cmd!(Paragraph, "Paragraph", "PA", 0),
    cmd!(Paste, "Paste", "P", 0),
    cmd!(PasteVert, "PasteVert", "PV", 0),
    cmd!(Play, "Play", "PL", 0),
    cmd!(PopPrefs, "PopPrefs", "POP", 0),
    cmd!(PreserveCr, "PreserveCR", "PCR", IS_OPTION),
    cmd!(PrevDoc, "PrevDoc", "PD", NO_ARGS),
    cmd!(PrevPage, "PrevPage", "PP", 0),
    cmd!(PrevWord, "PrevWord", "PW", 0),
    cmd!(PushPrefs, "PushPrefs", "PUSH", 0),
    cmd!(Quit, "Quit", "Q", NO_ARGS),
    cmd!(ReadOnly, "ReadOnly", "RO", IS_OPTION),
    cmd!(Record, "Record", "REC", 0),
    cmd!(Redo, "Redo", "RE", 0),
    cmd!(RepeatLast, "RepeatLast", "RL", 0),
    cmd!(Replace, "Replace", "R", ARG_IS_STRING),
    cmd!(ReplaceAll, "ReplaceAll", "RA", ARG_IS_STRING),
    cmd!(ReplaceOnce, "ReplaceOnce", "R1", ARG_IS_STRING),
    cmd!(RightMargin, "RightMargin", "RM", IS_OPTION),
    cmd!(Save, "Save", "S", NO_ARGS),
    cmd!(SaveAll, "SaveAll", "SL", NO_ARGS),
    cmd!(SaveAs, "SaveAs", "SA", ARG_IS_STRING),
    cmd!(SaveClip, "SaveClip", "SC", ARG_IS_STRING),
    cmd!(SaveMacro, "SaveMacro", "SM", ARG_IS_STRING),
    cmd!(SavePrefs, "SavePrefs", "SP", ARG_IS_STRING),
    cmd!(SearchBack, "SearchBack", "SB", IS_OPTION),
    cmd!(SelectDoc, "SelectDoc", "SD", 0),
    cmd!(SetBookmark, "SetBookmark", "SBM", ARG_IS_STRING | EMPTY_STRING_OK),
    cmd!(Shift, "Shift", "SH", ARG_IS_STRING | EMPTY_STRING_OK),
    cmd!(ShiftTabs, "ShiftTabs", "ST", IS_OPTION),
    cmd!(Syntax, "Syntax", "SY", ARG_IS_STRING | IS_OPTION),
    cmd!(TabSize, "TabSize", "TS", IS_OPTION),
    cmd!(Tabs, "Tabs", "TAB", IS_OPTION),
    cmd!(Through, "Through", "T", ARG_IS_STRING),
    cmd!(ToLower, "ToLower", "TL", 0),
    cmd!(ToUpper, "ToUpper", "TU", 0),
    cmd!(ToggleSeof, "ToggleSEOF", "TSEF", NO_ARGS),
    cmd!(ToggleSeol, "ToggleSEOL", "TSE", NO_ARGS),
    cmd!(UndelLine, "UndelLine", "UL", 0),
    cmd!(Undo, "Undo", "U", 0),
    cmd!(UnloadMacros, "UnloadMacros", "UM", NO_ARGS),
    cmd!(UnsetBookmark, "UnsetBookmark", "UBM", ARG_IS_STRING | EMPTY_STRING_OK),
    cmd!(Utf8, "UTF8", "U8", IS_OPTION),
    cmd!(Utf8Auto, "UTF8Auto", "U8A", IS_OPTION),
    cmd!(VerboseMacros, "VerboseMacros", "VM", IS_OPTION),
    cmd!(VisualBell, "VisualBell", "VB", IS_OPTION),
    cmd!(WordWrap, "WordWrap", "WW", IS_OPTION),
];

impl Action {
    pub fn spec(self) -> &'static CommandSpec {
        let spec = &COMMANDS[self as usize];
        debug_assert!(spec.action == self);
        spec
    }

    pub fn is_option(self) -> bool {
        self.spec().flags & IS_OPTION != 0
    }

    pub fn recordable(self) -> bool {
        self.spec().flags & DO_NOT_RECORD == 0
    }
}

fn name_table() -> &'static HashMap<String, Action> {
    static TABLE: OnceLock<HashMap<String, Action>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut t = HashMap::new();
        for spec in COMMANDS {
            t.insert(spec.name.to_ascii_uppercase(), spec.action);
            t.insert(spec.short_name.to_ascii_uppercase(), spec.action);
        }
        t
    })
}

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub action: Action,
    /// -1 means "unspecified".
    pub num_arg: i64,
    pub string_arg: Option<String>,
}

/// Parses a signed integer in any C base: `0x`/`0X` hex, leading `0`
/// octal, decimal otherwise.
fn parse_c_int(s: &str) -> Option<i64> {
    let (neg, rest) = match s.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let value = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if rest.len() > 1 && rest.starts_with('0') {
        i64::from_str_radix(&rest[1..], 8).ok()?
    } else {
        rest.parse::<i64>().ok()?
    };
    Some(if neg { -value } else { value })
}

/// Tokenizes one command line. Returns the action and its arguments,
/// enforcing each command's argument policy. Comment lines come back
/// as `Nop` carrying the comment text, so recording can preserve them.
pub fn parse_command_line(
    command_line: &str,
    exec_only_options: bool,
) -> std::result::Result<ParsedCommand, Status> {
    let line = command_line.trim_start();
    if line.is_empty() {
        return Ok(ParsedCommand {
            action: Action::Nop,
            num_arg: -1,
            string_arg: None,
        });
    }

    if !line.as_bytes()[0].is_ascii_alphabetic() {
        return Ok(ParsedCommand {
            action: Action::Nop,
            num_arg: -1,
            string_arg: Some(line.to_string()),
        });
    }

    let word_end = line
        .bytes()
        .position(|b| b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let (word, rest) = line.split_at(word_end);
    let rest = rest.trim_start();

    let Some(&action) = name_table().get(&word.to_ascii_uppercase()) else {
        return Err(Status::NoSuchCommand);
    };
    let spec = action.spec();

    if !rest.is_empty() && spec.flags & NO_ARGS != 0 {
        return Err(Status::HasNoArgument);
    }
    let numeric_looking = rest
        .bytes()
        .next()
        .map_or(true, |b| b.is_ascii_hexdigit() || b == b'x' || b == b'X' || b == b'-' || b == b'+');
    if !rest.is_empty() && spec.flags & ARG_IS_STRING == 0 && !numeric_looking {
        return Err(Status::HasNumericArgument);
    }
    if exec_only_options && spec.flags & IS_OPTION == 0 {
        return Err(Status::CanExecuteOnlyOptions);
    }

    let mut num_arg = -1;
    let mut string_arg = None;
    if !rest.is_empty() {
        if spec.flags & ARG_IS_STRING != 0 {
            let mut s = rest;
            if s.len() > 1 && s.starts_with('"') && s.ends_with('"') {
                s = &s[1..s.len() - 1];
            }
            if s.is_empty() && spec.flags & EMPTY_STRING_OK == 0 {
                return Err(Status::StringIsEmpty);
            }
            string_arg = Some(s.to_string());
        } else {
            let num_end = rest
                .bytes()
                .position(|b| b.is_ascii_whitespace())
                .unwrap_or(rest.len());
            if !rest[num_end..].trim().is_empty() {
                return Err(Status::NotANumber);
            }
            num_arg = parse_c_int(&rest[..num_end]).ok_or(Status::NotANumber)?;
        }
    }

    Ok(ParsedCommand {
        action,
        num_arg,
        string_arg,
    })
}
