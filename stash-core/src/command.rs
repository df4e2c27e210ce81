//! Command model: SQL text plus ordered named parameters.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::value::CellValue;

static NEXT_COMMAND_ID: AtomicU64 = AtomicU64::new(1);

/// A named parameter with its declared driver type.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandParameter {
    pub name: String,
    pub value: CellValue,
    pub declared_type: String,
}

/// A database command as seen by the interception pipeline.
///
/// Every command carries a process-unique `id`; it is the read-once key the
/// interceptor uses to carry the computed fingerprint from the pre-execution
/// callback to the post-execution one. Clones keep the id, so a clone is the
/// same logical command.
#[derive(Debug, Clone)]
pub struct Command {
    id: u64,
    pub text: String,
    pub parameters: Vec<CommandParameter>,
}

impl Command {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: NEXT_COMMAND_ID.fetch_add(1, Ordering::Relaxed),
            text: text.into(),
            parameters: Vec::new(),
        }
    }

    /// Append a named parameter, preserving declaration order.
    pub fn param(
        mut self,
        name: impl Into<String>,
        value: CellValue,
        declared_type: impl Into<String>,
    ) -> Self {
        self.parameters.push(CommandParameter {
            name: name.into(),
            value,
            declared_type: declared_type.into(),
        });
        self
    }

    /// Process-unique execution identity.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Canonical form fed to the key generator: the text followed, per
    /// parameter in declared order, by `|<name>=<value-or-NULL>:<type>`.
    pub fn canonical(&self) -> String {
        let mut out = self.text.clone();
        for p in &self.parameters {
            out.push('|');
            out.push_str(&p.name);
            out.push('=');
            out.push_str(&p.value.render());
            out.push(':');
            out.push_str(&p.declared_type);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = Command::new("SELECT 1");
        let b = Command::new("SELECT 1");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_clone_keeps_id() {
        let a = Command::new("SELECT 1");
        assert_eq!(a.id(), a.clone().id());
    }

    #[test]
    fn test_canonical_includes_parameters() {
        let cmd = Command::new("SELECT * FROM p WHERE id = @id")
            .param("@id", CellValue::Int32(7), "int");
        assert_eq!(cmd.canonical(), "SELECT * FROM p WHERE id = @id|@id=7:int");
    }

    #[test]
    fn test_canonical_renders_null_literal() {
        let cmd = Command::new("q").param("@x", CellValue::Null, "text");
        assert_eq!(cmd.canonical(), "q|@x=NULL:text");
    }
}
