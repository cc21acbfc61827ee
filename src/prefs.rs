//! Preference snapshots: the push/pop stack and prefs-as-macro files
//!
//! A prefs file is nothing but a macro made of option-setting commands,
//! so loading one reuses the macro player in options-only mode and a
//! compromised prefs file cannot execute arbitrary edits.

use std::path::Path;

use crate::buffer::{Buffer, Options};
use crate::constants::MAX_PREFS_STACK;
use crate::error::{Result, Status};
use crate::stream::CharStream;

/// The stack of pushed option sets.
#[derive(Default)]
pub struct PrefsStack {
    stack: Vec<Options>,
}

impl PrefsStack {
    pub fn new() -> PrefsStack {
        PrefsStack::default()
    }

    pub fn push(&mut self, b: &Buffer) -> Result {
        if self.stack.len() >= MAX_PREFS_STACK {
            return Err(Status::PrefsStackFull);
        }
        self.stack.push(b.opt.clone());
        Ok(())
    }

    pub fn pop(&mut self, b: &mut Buffer) -> Result {
        let Some(opt) = self.stack.pop() else {
            return Err(Status::PrefsStackEmpty);
        };
        b.opt = opt;
        Ok(())
    }
}

fn flag(v: bool) -> i64 {
    v as i64
}

/// Renders the buffer's options as a macro of option commands, one per
/// line, ending with the syntax selection when one is loaded.
pub fn prefs_stream(b: &Buffer) -> CharStream {
    let mut cs = CharStream::new();
    let mut put = |name: &str, value: i64| {
        cs.append(format!("{name} {value}").as_bytes());
        cs.append(&[0]);
    };

    put("TabSize", b.opt.tab_size);
    put("RightMargin", b.opt.right_margin);
    put("ClipNumber", b.opt.cur_clip);
    put("AutoMatchBracket", b.opt.automatch);
    put("Insert", flag(b.opt.insert));
    put("FreeForm", flag(b.opt.free_form));
    put("WordWrap", flag(b.opt.word_wrap));
    put("AutoIndent", flag(b.opt.auto_indent));
    put("PreserveCR", flag(b.opt.preserve_cr));
    put("CaseSearch", flag(b.opt.case_search));
    put("Tabs", flag(b.opt.tabs));
    put("DelTabs", flag(b.opt.del_tabs));
    put("ShiftTabs", flag(b.opt.shift_tabs));
    put("Binary", flag(b.opt.binary));
    put("UTF8Auto", flag(b.opt.utf8auto));
    put("VisualBell", flag(b.opt.visual_bell));
    put("DoUndo", flag(b.opt.do_undo));
    put("AutoPrefs", flag(b.opt.auto_prefs));
    put("NoFileReq", flag(b.opt.no_file_req));

    if let Some(syn) = &b.syn {
        cs.append(format!("Syntax {}", syn.name).as_bytes());
        cs.append(&[0]);
    }
    cs
}

/// Saves the buffer's options to a prefs file.
pub fn save_prefs(b: &Buffer, path: &Path) -> Result {
    prefs_stream(b).save_to_file(path, b.is_crlf, false)
}
