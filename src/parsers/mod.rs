pub mod common;
pub mod treesitter;

pub use common::{is_go_source, is_hidden_name};
