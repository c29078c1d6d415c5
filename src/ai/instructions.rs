//! Системні інструкції режимів AI, що зберігаються у JSON `{mode: prompt}`.

use crate::admins::write_json_atomically;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MODE_ASSISTANT: &str = "assistant";
pub const MODE_PROGRAMMER: &str = "programmer";
pub const BUILTIN_MODES: [&str; 2] = [MODE_ASSISTANT, MODE_PROGRAMMER];

/// Обмеження в байтах, щоб `mode_del:<name>` вміщався в callback data.
pub const MAX_MODE_NAME_BYTES: usize = 40;

const ASSISTANT_PROMPT: &str = "Ти дружній помічник учнів ліцею. Відповідай українською, \
просто і по суті. Якщо питання стосується навчання, пояснюй так, щоб зрозумів школяр.";
const PROGRAMMER_PROMPT: &str = "Ти досвідчений програміст і наставник. Відповідай українською. \
Давай робочі приклади коду з короткими поясненнями, вказуй на типові помилки.";

#[derive(Debug, Error)]
pub enum ModeError {
    #[error("режим «{0}» вбудований і не може бути видалений")]
    BuiltIn(String),
    #[error("режим «{0}» не знайдено")]
    NotFound(String),
    #[error("назва режиму має бути одним словом до {MAX_MODE_NAME_BYTES} байт")]
    InvalidName,
    #[error("інструкція режиму порожня")]
    EmptyPrompt,
    #[error("не вдалося прочитати {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("некоректний JSON у {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("не вдалося записати {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub fn is_builtin(mode: &str) -> bool {
    BUILTIN_MODES.contains(&mode)
}

pub fn normalize_mode_name(raw: &str) -> Result<String, ModeError> {
    let name = raw.trim().to_lowercase();
    if name.is_empty() || name.len() > MAX_MODE_NAME_BYTES || name.chars().any(char::is_whitespace) {
        return Err(ModeError::InvalidName);
    }
    Ok(name)
}

#[derive(Debug)]
pub struct InstructionStore {
    path: PathBuf,
    modes: BTreeMap<String, String>,
}

impl InstructionStore {
    /// Відсутній файл засівається вбудованими режимами і записується на диск.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ModeError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            let modes = BTreeMap::from([
                (MODE_ASSISTANT.to_string(), ASSISTANT_PROMPT.to_string()),
                (MODE_PROGRAMMER.to_string(), PROGRAMMER_PROMPT.to_string()),
            ]);
            let store = Self { path, modes };
            store.save()?;
            tracing::info!(path = %store.path.display(), "Seeded default AI instructions");
            return Ok(store);
        }

        let raw = std::fs::read_to_string(&path).map_err(|source| ModeError::Read {
            path: path.clone(),
            source,
        })?;
        let mut modes: BTreeMap<String, String> =
            serde_json::from_str(&raw).map_err(|source| ModeError::Parse {
                path: path.clone(),
                source,
            })?;
        // Назва йде в callback data кнопок, тож задовгі режими не завантажуються.
        modes.retain(|name, _| {
            let valid = normalize_mode_name(name).is_ok();
            if !valid {
                tracing::warn!(path = %path.display(), mode = %name, "Skipping AI mode with invalid name");
            }
            valid
        });
        modes
            .entry(MODE_ASSISTANT.to_string())
            .or_insert_with(|| ASSISTANT_PROMPT.to_string());
        modes
            .entry(MODE_PROGRAMMER.to_string())
            .or_insert_with(|| PROGRAMMER_PROMPT.to_string());
        tracing::info!(path = %path.display(), modes = modes.len(), "AI instructions loaded");
        Ok(Self { path, modes })
    }

    pub fn list_modes(&self) -> Vec<String> {
        self.modes.keys().cloned().collect()
    }

    pub fn has_mode(&self, mode: &str) -> bool {
        self.modes.contains_key(mode)
    }

    pub fn instruction(&self, mode: &str) -> Option<&str> {
        self.modes.get(mode).map(String::as_str)
    }

    /// Додає або перезаписує режим. Повертає `true`, якщо режим новий.
    pub fn add_mode(&mut self, name: &str, prompt: &str) -> Result<bool, ModeError> {
        let name = normalize_mode_name(name)?;
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ModeError::EmptyPrompt);
        }
        let is_new = self.modes.insert(name.clone(), prompt.to_string()).is_none();
        self.save()?;
        tracing::info!(mode = %name, is_new = is_new, "AI mode saved");
        Ok(is_new)
    }

    pub fn delete_mode(&mut self, name: &str) -> Result<(), ModeError> {
        let name = name.trim();
        if is_builtin(name) {
            return Err(ModeError::BuiltIn(name.to_string()));
        }
        if self.modes.remove(name).is_none() {
            return Err(ModeError::NotFound(name.to_string()));
        }
        self.save()?;
        tracing::info!(mode = %name, "AI mode deleted");
        Ok(())
    }

    fn save(&self) -> Result<(), ModeError> {
        write_json_atomically(&self.path, &self.modes).map_err(|source| ModeError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> InstructionStore {
        InstructionStore::open(dir.path().join("instructions.json")).unwrap()
    }

    #[test]
    fn missing_file_is_seeded_with_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        assert_eq!(store.list_modes(), vec![MODE_ASSISTANT, MODE_PROGRAMMER]);
        assert!(dir.path().join("instructions.json").exists());
    }

    #[test]
    fn builtin_modes_cannot_be_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(&dir);
        assert!(matches!(
            store.delete_mode(MODE_ASSISTANT),
            Err(ModeError::BuiltIn(_))
        ));
        assert!(matches!(
            store.delete_mode(MODE_PROGRAMMER),
            Err(ModeError::BuiltIn(_))
        ));
        assert!(store.has_mode(MODE_ASSISTANT));
        assert!(store.has_mode(MODE_PROGRAMMER));
    }

    #[test]
    fn added_mode_persists_and_can_be_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(&dir);
        assert!(store.add_mode("  Historian ", "Ти історик.").unwrap());
        assert!(!store.add_mode("historian", "Ти історик України.").unwrap());

        let reopened = InstructionStore::open(dir.path().join("instructions.json")).unwrap();
        assert_eq!(reopened.instruction("historian"), Some("Ти історик України."));

        store.delete_mode("historian").unwrap();
        assert!(matches!(
            store.delete_mode("historian"),
            Err(ModeError::NotFound(_))
        ));
    }

    #[test]
    fn mode_names_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store(&dir);
        assert!(matches!(store.add_mode("two words", "x"), Err(ModeError::InvalidName)));
        assert!(matches!(store.add_mode("", "x"), Err(ModeError::InvalidName)));
        assert!(matches!(
            store.add_mode(&"я".repeat(MAX_MODE_NAME_BYTES), "x"),
            Err(ModeError::InvalidName)
        ));
        assert!(matches!(store.add_mode("poet", "   "), Err(ModeError::EmptyPrompt)));
    }

    #[test]
    fn existing_file_gets_missing_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("instructions.json");
        std::fs::write(&path, r#"{"poet": "Пиши віршами."}"#).unwrap();
        let store = InstructionStore::open(&path).unwrap();
        assert_eq!(store.list_modes(), vec![MODE_ASSISTANT, "poet", MODE_PROGRAMMER]);
    }

    #[test]
    fn overlong_and_spaced_names_are_skipped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("instructions.json");
        let long_name = "a".repeat(MAX_MODE_NAME_BYTES + 20);
        let raw = BTreeMap::from([
            (long_name.clone(), "Задовга назва".to_string()),
            ("two words".to_string(), "Пробіл у назві".to_string()),
            ("poet".to_string(), "Пиши віршами.".to_string()),
        ]);
        std::fs::write(&path, serde_json::to_string(&raw).unwrap()).unwrap();

        let store = InstructionStore::open(&path).unwrap();
        assert!(!store.has_mode(&long_name));
        assert!(!store.has_mode("two words"));
        assert_eq!(store.list_modes(), vec![MODE_ASSISTANT, "poet", MODE_PROGRAMMER]);
        assert!(store.list_modes().iter().all(|mode| format!("mode_del:{mode}").len() <= 64));
    }
}
