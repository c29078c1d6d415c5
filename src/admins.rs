//! JSON-документ адмінів: список адмінів, поточний пароль і донатери.

use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

const GENERATED_PASSWORD_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum AdminStoreError {
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
    #[error("пароль має бути від {min} символів")]
    PasswordTooShort { min: usize },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminDocument {
    #[serde(default)]
    pub admins: Vec<i64>,
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub donors: Vec<i64>,
}

#[derive(Debug)]
pub struct AdminStore {
    path: PathBuf,
    doc: AdminDocument,
    min_password_len: usize,
}

pub fn generate_password() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), GENERATED_PASSWORD_LEN)
}

impl AdminStore {
    /// Завантажує документ. Якщо файла немає, створює його з bootstrap-значень;
    /// без заданого пароля генерується випадковий.
    pub fn open(
        path: impl AsRef<Path>,
        bootstrap_admins: &[i64],
        bootstrap_password: Option<&str>,
        min_password_len: usize,
    ) -> Result<Self, AdminStoreError> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|source| AdminStoreError::Read {
                path: path.clone(),
                source,
            })?;
            let doc: AdminDocument =
                serde_json::from_str(&raw).map_err(|source| AdminStoreError::Parse {
                    path: path.clone(),
                    source,
                })?;
            tracing::info!(
                path = %path.display(),
                admins = doc.admins.len(),
                donors = doc.donors.len(),
                "Admin document loaded"
            );
            return Ok(Self {
                path,
                doc,
                min_password_len,
            });
        }

        let current_password = match bootstrap_password.map(str::trim).filter(|p| !p.is_empty()) {
            Some(password) => password.to_string(),
            None => {
                let password = generate_password();
                tracing::warn!(
                    path = %path.display(),
                    password = %password,
                    "Admin document missing, generated a new admin password"
                );
                password
            }
        };
        let store = Self {
            path,
            doc: AdminDocument {
                admins: bootstrap_admins.to_vec(),
                current_password,
                donors: Vec::new(),
            },
            min_password_len,
        };
        store.save()?;
        Ok(store)
    }

    pub fn admin_ids(&self) -> &[i64] {
        &self.doc.admins
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.doc.admins.contains(&user_id)
    }

    pub fn is_donor(&self, user_id: i64) -> bool {
        self.doc.donors.contains(&user_id)
    }

    pub fn donor_count(&self) -> usize {
        self.doc.donors.len()
    }

    pub fn current_password(&self) -> &str {
        &self.doc.current_password
    }

    /// Точний збіг з поточним паролем. Порожній пароль ніколи не приймається.
    pub fn verify_password(&self, candidate: &str) -> bool {
        !self.doc.current_password.is_empty() && candidate == self.doc.current_password
    }

    /// Перевіряє пароль і при успіху додає користувача до адмінів на диску.
    pub fn authorize(&mut self, user_id: i64, candidate: &str) -> Result<bool, AdminStoreError> {
        if !self.verify_password(candidate) {
            tracing::warn!(user_id = user_id, "Rejected admin password attempt");
            return Ok(false);
        }
        if !self.doc.admins.contains(&user_id) {
            self.doc.admins.push(user_id);
            self.save()?;
        }
        tracing::info!(user_id = user_id, "Admin authorized by password");
        Ok(true)
    }

    /// Змінює пароль і повертає попередній.
    pub fn change_password(&mut self, new_password: &str) -> Result<String, AdminStoreError> {
        let new_password = new_password.trim();
        if new_password.chars().count() < self.min_password_len {
            return Err(AdminStoreError::PasswordTooShort {
                min: self.min_password_len,
            });
        }
        let old = std::mem::replace(&mut self.doc.current_password, new_password.to_string());
        self.save()?;
        tracing::info!("Admin password rotated");
        Ok(old)
    }

    pub fn add_donor(&mut self, user_id: i64) -> Result<bool, AdminStoreError> {
        if self.doc.donors.contains(&user_id) {
            return Ok(false);
        }
        self.doc.donors.push(user_id);
        self.save()?;
        tracing::info!(user_id = user_id, "Donor added");
        Ok(true)
    }

    fn save(&self) -> Result<(), AdminStoreError> {
        write_json_atomically(&self.path, &self.doc).map_err(|source| AdminStoreError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// Пише JSON у тимчасовий файл поруч і перейменовує його поверх цільового.
pub fn write_json_atomically<T: Serialize>(path: &Path, value: &T) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let raw = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, raw)?;
    std::fs::rename(&tmp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_with(dir: &tempfile::TempDir, password: &str) -> AdminStore {
        AdminStore::open(dir.path().join("admins.json"), &[1], Some(password), 4).unwrap()
    }

    #[test]
    fn missing_file_is_bootstrapped_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_with(&dir, "secret");
        assert!(store.is_admin(1));
        assert_eq!(store.current_password(), "secret");

        let reopened = AdminStore::open(dir.path().join("admins.json"), &[], None, 4).unwrap();
        assert_eq!(reopened.doc, store.doc);
    }

    #[test]
    fn missing_password_is_generated() {
        let dir = tempfile::tempdir().unwrap();
        let store = AdminStore::open(dir.path().join("admins.json"), &[], None, 4).unwrap();
        assert_eq!(store.current_password().len(), GENERATED_PASSWORD_LEN);
        assert!(store.current_password().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn only_exact_password_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_with(&dir, "admin123");
        assert!(!store.authorize(5, "admin1234").unwrap());
        assert!(!store.authorize(5, " admin123").unwrap());
        assert!(!store.authorize(5, "ADMIN123").unwrap());
        assert!(!store.is_admin(5));

        assert!(store.authorize(5, "admin123").unwrap());
        assert!(store.is_admin(5));
    }

    #[test]
    fn successful_authorization_persists_admin_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_with(&dir, "admin123");
        store.authorize(77, "admin123").unwrap();
        store.authorize(77, "admin123").unwrap();

        let reopened = AdminStore::open(dir.path().join("admins.json"), &[], None, 4).unwrap();
        assert_eq!(reopened.admin_ids(), [1, 77]);
    }

    #[test]
    fn password_rotation_validates_length_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_with(&dir, "admin123");
        let error = store.change_password(" ab ").unwrap_err();
        assert!(matches!(error, AdminStoreError::PasswordTooShort { min: 4 }));

        let old = store.change_password("  new-pass ").unwrap();
        assert_eq!(old, "admin123");
        assert!(store.verify_password("new-pass"));
        assert!(!store.verify_password("admin123"));

        let reopened = AdminStore::open(dir.path().join("admins.json"), &[], None, 4).unwrap();
        assert_eq!(reopened.current_password(), "new-pass");
    }

    #[test]
    fn donors_are_added_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_with(&dir, "admin123");
        assert!(store.add_donor(9).unwrap());
        assert!(!store.add_donor(9).unwrap());
        assert!(store.is_donor(9));
        assert_eq!(store.donor_count(), 1);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admins.json");
        std::fs::write(&path, "{not json").unwrap();
        let error = AdminStore::open(&path, &[], None, 4).unwrap_err();
        assert!(matches!(error, AdminStoreError::Parse { .. }));
    }
}
