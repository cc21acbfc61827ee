//! Quill - the buffer engine of a modeless terminal text editor
//!
//! The core of a full-screen editor for arbitrarily large files:
//! pooled line storage with local allocation, a doubly-linked line
//! model with cursor/viewport navigation, stream-based editing
//! primitives with unlimited undo/redo, Boyer-Moore and regex
//! search/replace, numbered clips with rectangular operations, a
//! DFA-driven syntax highlighter, and the command dispatcher with its
//! macro recorder. Terminal I/O, menus and key decoding live outside;
//! they talk to the core through [`request::Request`] and the
//! [`executor::EditorContext`].

pub mod buffer;
pub mod character;
pub mod clips;
pub mod command;
pub mod constants;
pub mod edit;
pub mod encoding;
pub mod error;
pub mod exec;
pub mod executor;
pub mod line;
pub mod macros;
pub mod movement;
pub mod pool;
pub mod prefs;
pub mod request;
pub mod search;
pub mod stream;
pub mod syntax;
pub mod undo;

pub use buffer::Buffer;
pub use command::Action;
pub use error::{Result, Status};
pub use executor::{do_action, execute_command_line, EditorContext};
