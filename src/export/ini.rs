//! Minimal INI writer for the runtime's companion config files.

use crate::errors::ExportError;
use indexmap::IndexMap;
use std::fmt;
use std::path::Path;

/// Sections and keys in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IniDocument {
    sections: IndexMap<String, IndexMap<String, String>>,
}

impl IniDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` in `section`, creating the section on first use.
    pub fn set(&mut self, section: &str, key: &str, value: impl ToString) -> &mut Self {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|s| s.get(key))
            .map(|v| v.as_str())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        std::fs::write(path.as_ref(), self.to_string())?;
        Ok(())
    }
}

impl fmt::Display for IniDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, entries) in &self.sections {
            writeln!(f, "[{}]", name)?;
            for (key, value) in entries {
                writeln!(f, "{}={}", key, value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_in_insertion_order() {
        let mut ini = IniDocument::new();
        ini.set("model", "params_file", "gpt2.params.bin")
            .set("config", "n_embd", 768)
            .set("config", "n_ctx", 1024);
        assert_eq!(
            ini.to_string(),
            "[model]\nparams_file=gpt2.params.bin\n[config]\nn_embd=768\nn_ctx=1024\n"
        );
        assert_eq!(ini.get("config", "n_ctx"), Some("1024"));
        assert_eq!(ini.get("tokenizer", "type"), None);
    }
}
