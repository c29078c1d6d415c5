use crate::admins::AdminStore;
use crate::ai::AiGateway;
use crate::config::Config;
use crate::schedule::ScheduleStore;
use crate::session::{Session, SessionStore};
use crate::stats::Stats;
use std::sync::Arc;
use teloxide::types::{Message, User};
use tokio::sync::{Mutex, RwLock};

#[derive(Clone)]
pub struct BotState {
    pub config: Arc<Config>,
    pub schedule: Arc<RwLock<ScheduleStore>>,
    pub admins: Arc<Mutex<AdminStore>>,
    pub ai: Arc<AiGateway>,
    pub sessions: Arc<Mutex<SessionStore>>,
    pub stats: Arc<Stats>,
}

impl BotState {
    pub fn new(config: Config, schedule: ScheduleStore, admins: AdminStore, ai: AiGateway) -> Self {
        Self {
            config: Arc::new(config),
            schedule: Arc::new(RwLock::new(schedule)),
            admins: Arc::new(Mutex::new(admins)),
            ai: Arc::new(ai),
            sessions: Arc::new(Mutex::new(SessionStore::new())),
            stats: Arc::new(Stats::new()),
        }
    }

    pub async fn is_admin(&self, user_id: i64) -> bool {
        self.admins.lock().await.is_admin(user_id)
    }

    /// Виконує `f` над сесією користувача, створюючи її за потреби.
    /// Лок адмінів береться й відпускається до локу сесій.
    pub async fn with_session<R>(&self, user_id: i64, f: impl FnOnce(&mut Session) -> R) -> R {
        let (is_admin, is_donor) = {
            let admins = self.admins.lock().await;
            (admins.is_admin(user_id), admins.is_donor(user_id))
        };
        let (result, created) = {
            let mut sessions = self.sessions.lock().await;
            let (session, created) = sessions.get_or_create(user_id, is_admin, is_donor);
            // Права могли змінитися поза сесією (інший адмін, /donor).
            session.is_admin = is_admin;
            if is_donor && !session.is_donor {
                session.is_donor = true;
                session.donate_hidden = true;
            }
            (f(session), created)
        };
        if created {
            self.stats.record_new_user();
            tracing::info!(user_id = user_id, "New session created");
        }
        self.stats.record_active(user_id).await;
        result
    }

    pub async fn session_snapshot(&self, user_id: i64) -> Session {
        self.with_session(user_id, |session| session.clone()).await
    }
}

pub fn sender_user_id(msg: &Message) -> Option<i64> {
    msg.from.as_ref().map(|user| user.id.0 as i64)
}

pub fn user_id_of(user: &User) -> i64 {
    user.id.0 as i64
}

#[cfg(test)]
pub fn test_state(dir: &std::path::Path) -> BotState {
    use crate::ai::instructions::InstructionStore;
    use crate::schedule::{BellsDocument, ScheduleDocument};

    let config = Config::default();
    let admins = AdminStore::open(dir.join("admins.json"), &[1], Some("secret-pass"), 4).unwrap();
    let instructions = InstructionStore::open(dir.join("instructions.json")).unwrap();
    let ai = AiGateway::new(&config.ai, "test-key".to_string(), instructions).unwrap();
    let schedule = ScheduleStore::from_documents(
        ScheduleDocument::default(),
        ScheduleDocument::default(),
        BellsDocument::default(),
        &config.shifts.second_shift_classes,
    );
    BotState::new(config, schedule, admins, ai)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn session_reflects_admin_and_donor_files() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        state.admins.lock().await.add_donor(5).unwrap();

        let admin = state.session_snapshot(1).await;
        assert!(admin.is_admin);
        let donor = state.session_snapshot(5).await;
        assert!(donor.is_donor);
        assert!(!donor.shows_donate());

        let snapshot = state.stats.snapshot(0, 1).await;
        assert_eq!(snapshot.total_users, 2);
    }
}
