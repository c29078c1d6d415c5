use super::format::{active_users_text, admin_panel_text, broadcast_text, stats_text};
use super::shared::{HandlerResult, as_markup, delete_quietly, send_html};
use super::state::BotState;
use crate::admins::AdminStoreError;
use crate::bot::keyboards;
use crate::session::{Awaiting, Menu};
use teloxide::prelude::*;
use teloxide::utils::html::escape;

/// Перевіряє права адміна. Якщо їх немає, відповідає і повертає в головне меню.
pub async fn require_admin(
    bot: &Bot,
    chat_id: ChatId,
    state: &BotState,
    user_id: i64,
) -> Result<bool, teloxide::RequestError> {
    if state.is_admin(user_id).await {
        return Ok(true);
    }
    tracing::warn!(user_id = user_id, "Admin action denied");
    let show_donate = state
        .with_session(user_id, |session| {
            session.go_main();
            session.shows_donate()
        })
        .await;
    send_html(
        bot,
        chat_id,
        "⛔ Недостатньо прав. Увійдіть через /admin.",
        as_markup(keyboards::main_menu(show_donate)),
    )
    .await?;
    Ok(false)
}

pub async fn require_admin_callback(
    bot: &Bot,
    q: &CallbackQuery,
    state: &BotState,
) -> Result<Option<i64>, teloxide::RequestError> {
    let admin_id = super::state::user_id_of(&q.from);
    if !state.is_admin(admin_id).await {
        bot.answer_callback_query(q.id.clone())
            .text("Недостатньо прав")
            .show_alert(true)
            .await?;
        return Ok(None);
    }
    Ok(Some(admin_id))
}

/// Показує адмін-панель або просить пароль.
pub async fn open_admin(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64) -> HandlerResult {
    state.stats.record_command();
    if state.is_admin(user_id).await {
        state
            .with_session(user_id, |session| {
                session.awaiting = Awaiting::Nothing;
                session.menu = Menu::Admin;
            })
            .await;
        send_html(bot, chat_id, admin_panel_text(), as_markup(keyboards::admin_menu())).await?;
        return Ok(());
    }

    state
        .with_session(user_id, |session| session.awaiting = Awaiting::Password)
        .await;
    send_html(
        bot,
        chat_id,
        "🔒 <b>Введіть пароль адміністратора:</b>\n\n<i>Повідомлення з паролем буде видалено.</i>",
        as_markup(keyboards::cancel_menu()),
    )
    .await?;
    Ok(())
}

/// Перевіряє пароль і при успіху відкриває сесії адмінське меню.
pub async fn try_admin_login(state: &BotState, user_id: i64, candidate: &str) -> Result<bool, AdminStoreError> {
    let authorized = state.admins.lock().await.authorize(user_id, candidate)?;
    if authorized {
        state
            .with_session(user_id, |session| {
                session.is_admin = true;
                session.awaiting = Awaiting::Nothing;
                session.menu = Menu::Admin;
            })
            .await;
    }
    Ok(authorized)
}

pub async fn finish_login(bot: &Bot, msg: &Message, state: &BotState, user_id: i64, text: &str) -> HandlerResult {
    delete_quietly(bot, msg.chat.id, msg.id).await;
    if try_admin_login(state, user_id, text).await? {
        let greeting = format!("✅ <b>Авторизація успішна!</b>\n\n{}", admin_panel_text());
        send_html(bot, msg.chat.id, &greeting, as_markup(keyboards::admin_menu())).await?;
    } else {
        send_html(
            bot,
            msg.chat.id,
            "❌ Невірний пароль! Спробуйте ще раз або скасуйте.",
            as_markup(keyboards::cancel_menu()),
        )
        .await?;
    }
    Ok(())
}

pub async fn show_stats(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64) -> HandlerResult {
    if !require_admin(bot, chat_id, state, user_id).await? {
        return Ok(());
    }
    let online_now = state
        .sessions
        .lock()
        .await
        .online_ids(state.config.online_window())
        .len();
    let donors = state.admins.lock().await.donor_count();
    let snapshot = state.stats.snapshot(online_now, donors).await;
    send_html(bot, chat_id, &stats_text(&snapshot), as_markup(keyboards::admin_menu())).await?;
    Ok(())
}

pub async fn show_active_users(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64) -> HandlerResult {
    if !require_admin(bot, chat_id, state, user_id).await? {
        return Ok(());
    }
    let (online, total) = {
        let sessions = state.sessions.lock().await;
        (sessions.online_ids(state.config.online_window()), sessions.len() as u64)
    };
    let active_today = state.stats.active_today().await;
    let text = active_users_text(&online, state.config.limits.active_users_shown, active_today, total);
    send_html(bot, chat_id, &text, as_markup(keyboards::admin_menu())).await?;
    Ok(())
}

pub async fn reload_schedule(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64) -> HandlerResult {
    if !require_admin(bot, chat_id, state, user_id).await? {
        return Ok(());
    }
    let (classes, loaded_at) = {
        let mut schedule = state.schedule.write().await;
        let classes = schedule.reload();
        (classes, schedule.loaded_at())
    };
    tracing::info!(admin_id = user_id, classes = classes, "Schedule reloaded by admin");
    let text = if classes == 0 {
        "⚠️ Розклад перезавантажено, але жодного класу не знайдено.".to_string()
    } else {
        format!(
            "🔄 <b>Розклад оновлено!</b>\n\nКласів завантажено: {classes}\nЧас: {}",
            loaded_at.format("%H:%M:%S")
        )
    };
    send_html(bot, chat_id, &text, as_markup(keyboards::admin_menu())).await?;
    Ok(())
}

pub async fn start_password_change(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64) -> HandlerResult {
    if !require_admin(bot, chat_id, state, user_id).await? {
        return Ok(());
    }
    state
        .with_session(user_id, |session| session.awaiting = Awaiting::NewPassword)
        .await;
    let current = state.admins.lock().await.current_password().to_string();
    send_html(
        bot,
        chat_id,
        &format!(
            "🔑 <b>Зміна пароля</b>\n\nПоточний пароль: <code>{}</code>\n\n\
             Введіть новий пароль (від {} символів) або згенеруйте його:",
            escape(&current),
            state.config.limits.min_password_len
        ),
        as_markup(keyboards::password_generate_button()),
    )
    .await?;
    send_html(
        bot,
        chat_id,
        "<i>Повідомлення з паролем буде видалено.</i>",
        as_markup(keyboards::cancel_menu()),
    )
    .await?;
    Ok(())
}

/// Змінює пароль і повертає адміна в панель. `Ok(None)` означає закороткий пароль.
pub async fn apply_password_change(
    state: &BotState,
    user_id: i64,
    new_password: &str,
) -> Result<Option<String>, AdminStoreError> {
    let result = state.admins.lock().await.change_password(new_password);
    match result {
        Ok(_) => {
            state
                .with_session(user_id, |session| {
                    session.awaiting = Awaiting::Nothing;
                    session.menu = Menu::Admin;
                })
                .await;
            tracing::info!(admin_id = user_id, "Admin password changed");
            Ok(Some(new_password.trim().to_string()))
        }
        Err(AdminStoreError::PasswordTooShort { .. }) => Ok(None),
        Err(error) => Err(error),
    }
}

pub fn password_changed_text(new_password: &str) -> String {
    format!(
        "✅ <b>Пароль змінено!</b>\n\nНовий пароль: <code>{}</code>",
        escape(new_password)
    )
}

pub async fn finish_password_change(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    user_id: i64,
    text: &str,
) -> HandlerResult {
    delete_quietly(bot, msg.chat.id, msg.id).await;
    if !require_admin(bot, msg.chat.id, state, user_id).await? {
        return Ok(());
    }
    match apply_password_change(state, user_id, text).await? {
        Some(new_password) => {
            send_html(
                bot,
                msg.chat.id,
                &password_changed_text(&new_password),
                as_markup(keyboards::admin_menu()),
            )
            .await?;
        }
        None => {
            send_html(
                bot,
                msg.chat.id,
                &format!(
                    "❌ Пароль закороткий. Мінімум {} символів, спробуйте ще раз.",
                    state.config.limits.min_password_len
                ),
                as_markup(keyboards::cancel_menu()),
            )
            .await?;
        }
    }
    Ok(())
}

pub async fn start_broadcast(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64) -> HandlerResult {
    if !require_admin(bot, chat_id, state, user_id).await? {
        return Ok(());
    }
    state
        .with_session(user_id, |session| session.awaiting = Awaiting::BroadcastText)
        .await;
    send_html(
        bot,
        chat_id,
        "📢 <b>Розсилка</b>\n\nНадішліть текст оголошення для всіх користувачів:",
        as_markup(keyboards::cancel_menu()),
    )
    .await?;
    Ok(())
}

pub async fn finish_broadcast(
    bot: &Bot,
    chat_id: ChatId,
    state: &BotState,
    user_id: i64,
    text: &str,
) -> HandlerResult {
    if !require_admin(bot, chat_id, state, user_id).await? {
        return Ok(());
    }
    if text.trim().is_empty() {
        send_html(bot, chat_id, "❌ Текст порожній. Надішліть оголошення ще раз.", None).await?;
        return Ok(());
    }
    state
        .with_session(user_id, |session| {
            session.awaiting = Awaiting::Nothing;
            session.menu = Menu::Admin;
        })
        .await;

    let recipients = state.sessions.lock().await.user_ids();
    tracing::info!(admin_id = user_id, recipients = recipients.len(), "Broadcast started");
    send_html(
        bot,
        chat_id,
        &format!("📤 Розсилка запущена для {} користувачів...", recipients.len()),
        None,
    )
    .await?;

    let body = broadcast_text(text.trim());
    let delay = state.config.broadcast_delay();
    let (mut sent, mut failed) = (0usize, 0usize);
    for recipient in recipients {
        match send_html(bot, ChatId(recipient), &body, None).await {
            Ok(_) => sent += 1,
            Err(error) => {
                failed += 1;
                tracing::warn!(user_id = recipient, error = %error, "Broadcast delivery failed");
            }
        }
        tokio::time::sleep(delay).await;
    }
    tracing::info!(admin_id = user_id, sent = sent, failed = failed, "Broadcast finished");

    send_html(
        bot,
        chat_id,
        &format!("✅ <b>Розсилка завершена</b>\n\nНадіслано: {sent}\nПомилок: {failed}"),
        as_markup(keyboards::admin_menu()),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admins::AdminStore;
    use crate::bot::handlers::state::test_state;

    #[tokio::test]
    async fn wrong_password_keeps_user_out() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        state
            .with_session(42, |session| session.awaiting = Awaiting::Password)
            .await;

        assert!(!try_admin_login(&state, 42, "guess").await.unwrap());
        let session = state.session_snapshot(42).await;
        assert!(!session.is_admin);
        assert_eq!(session.awaiting, Awaiting::Password);
    }

    #[tokio::test]
    async fn correct_password_grants_and_persists_admin() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        assert!(try_admin_login(&state, 42, "secret-pass").await.unwrap());
        let session = state.session_snapshot(42).await;
        assert!(session.is_admin);
        assert_eq!(session.menu, Menu::Admin);

        let reopened = AdminStore::open(dir.path().join("admins.json"), &[], None, 4).unwrap();
        assert!(reopened.is_admin(42));
    }

    #[tokio::test]
    async fn padded_password_is_not_an_exact_match() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        assert!(!try_admin_login(&state, 99, "  secret-pass\t").await.unwrap());
        assert!(!try_admin_login(&state, 99, "secret-pass ").await.unwrap());
        assert!(!state.session_snapshot(99).await.is_admin);
        assert!(!state.admins.lock().await.is_admin(99));
    }

    #[tokio::test]
    async fn short_password_is_rejected_without_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        assert_eq!(apply_password_change(&state, 1, "abc").await.unwrap(), None);
        assert!(state.admins.lock().await.verify_password("secret-pass"));

        let changed = apply_password_change(&state, 1, "new-secret").await.unwrap();
        assert_eq!(changed.as_deref(), Some("new-secret"));
        assert!(state.admins.lock().await.verify_password("new-secret"));
    }
}
