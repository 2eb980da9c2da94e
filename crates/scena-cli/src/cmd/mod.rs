pub mod add;
pub mod board;
pub mod completions;
pub mod config;
pub mod gantt;
pub mod move_cmd;
pub mod reorder;
pub mod watch;
