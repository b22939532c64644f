//! Engine module: CLI surface, hashing, and the SQLite index adapter.

pub mod arg_parser;
pub mod cli;
pub mod db_ops;
pub mod hashing;
pub mod tools;

// Re-export commonly used functions
pub use arg_parser::{Cli, Command};
pub use cli::handle_run;
pub use db_ops::{SqliteIndex, committed_keys, document_count, facet_rows, open_db, open_db_in_memory};
pub use hashing::hash_file;
pub use tools::{glob_match, now_ms, path_relative_to};
