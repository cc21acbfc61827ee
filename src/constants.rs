//! Crate-wide tuning constants

/// Standard character pool allocation size in bytes.
pub const STD_POOL_SIZE: usize = 16 * 1024;

/// Files at least this large are loaded into an mmap-backed pool
/// instead of the heap.
pub const MMAP_THRESHOLD: usize = 16 * 1024 * 1024;

/// Least increment by which a character stream grows.
pub const CHAR_STREAM_SIZE_INC: usize = 2048;

/// Streams whose capacity is at most twice the increment are kept
/// allocated across resets.
pub const CHAR_STREAM_KEEP_SIZE: usize = 2 * CHAR_STREAM_SIZE_INC;

/// How many undo steps are reserved whenever the step log grows.
pub const STD_UNDO_STEP_SIZE: usize = 1024;

/// How many undo stream bytes are reserved whenever the stream grows.
pub const STD_UNDO_STREAM_SIZE: usize = 16 * 1024;

/// The length of the block used to batch line writes during a save.
pub const SAVE_BLOCK_LEN: usize = 16 * 1024 - 1;

/// Spaces are inserted in blocks of at most this size.
pub const MAX_STACK_SPACES: usize = 256;

/// Bookmarks per buffer, comprising the automatic bookmark.
pub const NUM_BOOKMARKS: usize = 11;

/// Index of the automatic bookmark, set on every long jump.
pub const AUTO_BOOKMARK: usize = 10;

/// Highest user-designatable bookmark.
pub const MAX_USER_BOOKMARK: usize = 9;

/// Bookmark borrowed internally by word wrapping and word deletion.
pub const WORDWRAP_BOOKMARK: usize = AUTO_BOOKMARK;

/// Maximum nesting of named macro invocations.
pub const MAX_MACRO_DEPTH: usize = 32;

/// Maximum depth of the preferences stack.
pub const MAX_PREFS_STACK: usize = 32;

/// Largest code point we accept from `InsertChar`.
pub const MAX_CODE_POINT: i64 = 0x10FFFF;

/// Clip number reserved for the external filter pipe.
pub const FILTER_CLIP: i64 = i64::MAX;

/// Default window geometry used until the host reports a real size.
pub const DEFAULT_ROWS: usize = 24;
pub const DEFAULT_COLS: usize = 80;

/// Default tab size for new buffers.
pub const DEFAULT_TAB_SIZE: i64 = 8;

/// Extension of syntax definition files.
pub const SYNTAX_EXT: &str = ".jsf";

/// Truncation limit of the saved delimiter string in a highlight state.
pub const SAVED_STR_LEN: usize = 24;
