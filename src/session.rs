//! Сесії користувачів у пам'яті процесу: поточне меню, вибір класу/дня,
//! режим AI та очікуване введення.

use crate::schedule::SchoolDay;
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub const DEFAULT_AI_MODE: &str = "assistant";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Menu {
    Main,
    Ai,
    Schedule,
    Admin,
    AiManagement,
}

/// Яке введення зараз перехоплюється замість звичайної обробки кнопок.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Awaiting {
    #[default]
    Nothing,
    Password,
    NewPassword,
    BroadcastText,
    ModeName,
    ModePrompt { name: String },
}

#[derive(Debug, Clone)]
pub struct Session {
    pub menu: Menu,
    pub selected_class: Option<String>,
    pub selected_day: Option<SchoolDay>,
    pub ai_mode: String,
    pub detail_next: bool,
    pub is_admin: bool,
    pub is_donor: bool,
    pub donate_hidden: bool,
    pub awaiting: Awaiting,
    pub first_seen: DateTime<Local>,
    pub last_active: DateTime<Local>,
}

impl Session {
    fn new(is_admin: bool, is_donor: bool) -> Self {
        let now = Local::now();
        Self {
            menu: Menu::Main,
            selected_class: None,
            selected_day: None,
            ai_mode: DEFAULT_AI_MODE.to_string(),
            detail_next: false,
            is_admin,
            is_donor,
            donate_hidden: is_donor,
            awaiting: Awaiting::Nothing,
            first_seen: now,
            last_active: now,
        }
    }

    pub fn shows_donate(&self) -> bool {
        !self.is_donor && !self.donate_hidden
    }

    /// Скидання, яке виконує /start.
    pub fn reset(&mut self) {
        self.menu = Menu::Main;
        self.selected_class = None;
        self.selected_day = None;
        self.ai_mode = DEFAULT_AI_MODE.to_string();
        self.detail_next = false;
        self.awaiting = Awaiting::Nothing;
        self.donate_hidden = self.is_donor;
    }

    pub fn go_main(&mut self) {
        self.menu = Menu::Main;
        self.selected_class = None;
        self.selected_day = None;
        self.awaiting = Awaiting::Nothing;
    }

    /// Одноразовий прапорець детальної відповіді: читання його скидає.
    pub fn take_detail_flag(&mut self) -> bool {
        std::mem::take(&mut self.detail_next)
    }
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<i64, Session>,
    ai_locks: HashMap<i64, Arc<Mutex<()>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Повертає сесію користувача, створюючи її при першому зверненні.
    /// Другий елемент — чи була сесія щойно створена.
    pub fn get_or_create(&mut self, user_id: i64, is_admin: bool, is_donor: bool) -> (&mut Session, bool) {
        let mut created = false;
        let session = self.sessions.entry(user_id).or_insert_with(|| {
            created = true;
            Session::new(is_admin, is_donor)
        });
        session.last_active = Local::now();
        (session, created)
    }

    pub fn get_mut(&mut self, user_id: i64) -> Option<&mut Session> {
        self.sessions.get_mut(&user_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn user_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.sessions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Користувачі, активні протягом останнього `window`, найсвіжіші першими.
    pub fn online_ids(&self, window: Duration) -> Vec<i64> {
        let window =
            chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::days(365));
        let threshold = Local::now() - window;
        let mut online: Vec<(i64, DateTime<Local>)> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.last_active >= threshold)
            .map(|(user_id, session)| (*user_id, session.last_active))
            .collect();
        online.sort_by(|a, b| b.1.cmp(&a.1));
        online.into_iter().map(|(user_id, _)| user_id).collect()
    }

    /// М'ютекс, що серіалізує AI-запити одного користувача.
    pub fn ai_lock(&mut self, user_id: i64) -> Arc<Mutex<()>> {
        self.ai_locks.entry(user_id).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_is_idempotent_per_user() {
        let mut store = SessionStore::new();
        let (session, created) = store.get_or_create(7, false, false);
        assert!(created);
        session.selected_class = Some("5-А".to_string());
        session.menu = Menu::Schedule;

        let (session, created) = store.get_or_create(7, true, true);
        assert!(!created);
        assert_eq!(session.selected_class.as_deref(), Some("5-А"));
        assert_eq!(session.menu, Menu::Schedule);
        assert!(!session.is_admin);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn donors_start_with_donate_hidden() {
        let mut store = SessionStore::new();
        let (donor, _) = store.get_or_create(1, false, true);
        assert!(!donor.shows_donate());
        let (regular, _) = store.get_or_create(2, false, false);
        assert!(regular.shows_donate());
    }

    #[test]
    fn detail_flag_is_one_shot() {
        let mut store = SessionStore::new();
        let (session, _) = store.get_or_create(3, false, false);
        session.detail_next = true;
        assert!(session.take_detail_flag());
        assert!(!session.take_detail_flag());
    }

    #[test]
    fn reset_restores_donate_button_for_non_donors() {
        let mut store = SessionStore::new();
        let (session, _) = store.get_or_create(4, false, false);
        session.donate_hidden = true;
        session.awaiting = Awaiting::BroadcastText;
        session.ai_mode = "programmer".to_string();
        session.reset();
        assert!(session.shows_donate());
        assert_eq!(session.awaiting, Awaiting::Nothing);
        assert_eq!(session.ai_mode, DEFAULT_AI_MODE);
    }

    #[test]
    fn ai_lock_is_shared_per_user() {
        let mut store = SessionStore::new();
        let first = store.ai_lock(10);
        let second = store.ai_lock(10);
        let other = store.ai_lock(11);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[test]
    fn online_ids_respect_window() {
        let mut store = SessionStore::new();
        store.get_or_create(1, false, false);
        let (stale, _) = store.get_or_create(2, false, false);
        stale.last_active = Local::now() - chrono::Duration::minutes(30);

        let online = store.online_ids(Duration::from_secs(300));
        assert_eq!(online, vec![1]);
        assert_eq!(store.user_ids(), vec![1, 2]);
    }
}
