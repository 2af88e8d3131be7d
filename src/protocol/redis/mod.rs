mod command;
mod types;

pub use command::{
    all_commands, command_kind, eval_commands, simple_commands, sum_result_commands, CommandKind,
    MGET, MSET,
};
pub use types::RespValue;
