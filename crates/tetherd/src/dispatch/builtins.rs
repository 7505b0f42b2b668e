//! Targets registered by every bridge.

use serde_json::{Map, Value};

use crate::call::Call;
use crate::conventions::{ExecutionError, TypedCommand};
use crate::resolve::SymbolTable;

/// Typed command returning its own arguments.
#[derive(Debug, Default, Clone, Copy)]
pub struct Echo;

impl TypedCommand for Echo {
    fn execute(&self, call: &Call) -> Result<Map<String, Value>, ExecutionError> {
        Ok(call.arguments()?.as_map().clone())
    }
}

/// Adds the built-in targets to `table`.
pub fn register_builtins(table: &mut SymbolTable) -> &mut SymbolTable {
    table.register_typed_command("Echo", Echo)
}
