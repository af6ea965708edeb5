mod browse;
mod helpers;
mod import;

pub(crate) use browse::{cmd_list, cmd_search};
pub(crate) use import::cmd_import;
