//! Deterministic cache keys for commands.

use sha2::{Digest, Sha256};

use crate::command::Command;

/// Produces cache keys of the form `<prefix><lowercase-hex-sha256>` from a
/// command's canonical text-plus-parameters form.
///
/// Identical commands always map to the same key; any change to the text or
/// to a parameter's name, value, or declared type changes the key.
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    prefix: String,
}

impl KeyGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn key_for(&self, command: &Command) -> String {
        let mut hasher = Sha256::new();
        hasher.update(command.canonical().as_bytes());
        format!("{}{}", self.prefix, hex::encode(hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::CellValue;

    fn keygen() -> KeyGenerator {
        KeyGenerator::new("stash:")
    }

    #[test]
    fn test_same_command_same_key() {
        let a = Command::new("SELECT * FROM p WHERE id = @id")
            .param("@id", CellValue::Int32(1), "int");
        let b = Command::new("SELECT * FROM p WHERE id = @id")
            .param("@id", CellValue::Int32(1), "int");
        assert_eq!(keygen().key_for(&a), keygen().key_for(&b));
    }

    #[test]
    fn test_parameter_value_changes_key() {
        let a = Command::new("SELECT * FROM p WHERE id = @id")
            .param("@id", CellValue::Int32(1), "int");
        let b = Command::new("SELECT * FROM p WHERE id = @id")
            .param("@id", CellValue::Int32(2), "int");
        assert_ne!(keygen().key_for(&a), keygen().key_for(&b));
    }

    #[test]
    fn test_declared_type_changes_key() {
        let a = Command::new("q").param("@x", CellValue::Int32(1), "int");
        let b = Command::new("q").param("@x", CellValue::Int32(1), "bigint");
        assert_ne!(keygen().key_for(&a), keygen().key_for(&b));
    }

    #[test]
    fn test_parameter_name_changes_key() {
        let a = Command::new("q").param("@x", CellValue::Int32(1), "int");
        let b = Command::new("q").param("@y", CellValue::Int32(1), "int");
        assert_ne!(keygen().key_for(&a), keygen().key_for(&b));
    }

    #[test]
    fn test_null_and_text_null_differ() {
        // A null parameter and the literal string "NULL" hash over different
        // declared types, so the keys must not collide by accident here.
        let a = Command::new("q").param("@x", CellValue::Null, "text");
        let b = Command::new("q").param("@x", CellValue::Str("NULL".into()), "int");
        assert_ne!(keygen().key_for(&a), keygen().key_for(&b));
    }

    #[test]
    fn test_key_shape() {
        let key = keygen().key_for(&Command::new("SELECT 1"));
        assert!(key.starts_with("stash:"));
        let hexpart = &key["stash:".len()..];
        assert_eq!(hexpart.len(), 64);
        assert!(hexpart.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
