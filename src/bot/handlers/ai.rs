use super::admin::require_admin;
use super::format::{ai_intro_text, modes_list_text};
use super::shared::{HandlerResult, as_markup, send_html, send_long};
use super::state::BotState;
use crate::ai::instructions::{ModeError, is_builtin, normalize_mode_name};
use crate::ai::{AskOptions, build_user_prompt};
use crate::bot::keyboards;
use crate::session::{Awaiting, Menu};
use teloxide::prelude::*;
use teloxide::types::ChatAction;
use teloxide::utils::html::escape;

pub async fn open_ai_menu(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64) -> HandlerResult {
    let (mode, show_donate) = state
        .with_session(user_id, |session| {
            session.menu = Menu::Ai;
            session.selected_class = None;
            session.selected_day = None;
            (session.ai_mode.clone(), session.shows_donate())
        })
        .await;
    state.stats.record_command();
    send_html(bot, chat_id, &ai_intro_text(&mode), as_markup(keyboards::ai_menu(show_donate))).await?;
    Ok(())
}

pub async fn set_mode(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64, mode: &str) -> HandlerResult {
    if !state.ai.has_mode(mode).await {
        tracing::warn!(user_id = user_id, mode = %mode, "Requested AI mode is missing");
        send_html(bot, chat_id, "❌ Режим недоступний", None).await?;
        return Ok(());
    }
    let show_donate = state
        .with_session(user_id, |session| {
            session.ai_mode = mode.to_string();
            session.shows_donate()
        })
        .await;
    tracing::debug!(user_id = user_id, mode = %mode, "AI mode switched");
    send_html(
        bot,
        chat_id,
        &format!("✅ Режим: <code>{}</code>", escape(mode)),
        as_markup(keyboards::ai_menu(show_donate)),
    )
    .await?;
    Ok(())
}

pub async fn detail_once(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64) -> HandlerResult {
    let show_donate = state
        .with_session(user_id, |session| {
            session.detail_next = true;
            session.shows_donate()
        })
        .await;
    send_html(
        bot,
        chat_id,
        "🔍 Наступна відповідь буде детальною.",
        as_markup(keyboards::ai_menu(show_donate)),
    )
    .await?;
    Ok(())
}

pub async fn clear(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64) -> HandlerResult {
    let show_donate = state
        .with_session(user_id, |session| {
            session.detail_next = false;
            session.shows_donate()
        })
        .await;
    send_html(
        bot,
        chat_id,
        "🧹 Налаштування відповіді скинуто.",
        as_markup(keyboards::ai_menu(show_donate)),
    )
    .await?;
    Ok(())
}

pub async fn show_modes(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64) -> HandlerResult {
    let current = state.with_session(user_id, |session| session.ai_mode.clone()).await;
    let modes = state.ai.list_modes().await;
    let text = modes_list_text(&modes, Some(&current));
    if modes.is_empty() {
        send_html(bot, chat_id, &text, None).await?;
    } else {
        send_html(
            bot,
            chat_id,
            &text,
            as_markup(keyboards::mode_pick_buttons(&modes, &current)),
        )
        .await?;
    }
    Ok(())
}

/// Перемикає режим з inline-кнопки. Повертає `false`, якщо режиму вже немає.
pub async fn pick_mode(state: &BotState, user_id: i64, mode: &str) -> bool {
    if !state.ai.has_mode(mode).await {
        return false;
    }
    state
        .with_session(user_id, |session| session.ai_mode = mode.to_string())
        .await;
    true
}

/// Відповідь AI на вільний текст. Запити одного користувача йдуть по черзі.
pub async fn answer_question(
    bot: &Bot,
    chat_id: ChatId,
    state: &BotState,
    user_id: i64,
    question: &str,
) -> HandlerResult {
    let user_lock = state.sessions.lock().await.ai_lock(user_id);
    let _guard = user_lock.lock().await;

    let (mode, detailed, show_donate) = state
        .with_session(user_id, |session| {
            (session.ai_mode.clone(), session.take_detail_flag(), session.shows_donate())
        })
        .await;
    state.stats.record_command();
    state.stats.record_ai_query();
    tracing::info!(user_id = user_id, mode = %mode, detailed = detailed, "AI question received");

    if let Err(error) = bot.send_chat_action(chat_id, ChatAction::Typing).await {
        tracing::debug!(chat_id = chat_id.0, error = %error, "Typing action failed");
    }

    let options = if detailed {
        AskOptions::detailed(&state.config.ai)
    } else {
        AskOptions::short(&state.config.ai)
    };
    let prompt = build_user_prompt(question, detailed);
    let answer = state.ai.ask_or_apology(&prompt, &mode, options).await;

    send_long(
        bot,
        chat_id,
        &answer,
        false,
        as_markup(keyboards::ai_menu(show_donate)),
        state.config.limits.max_message_len,
    )
    .await?;
    Ok(())
}

pub async fn open_ai_management(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64) -> HandlerResult {
    if !require_admin(bot, chat_id, state, user_id).await? {
        return Ok(());
    }
    state
        .with_session(user_id, |session| {
            session.menu = Menu::AiManagement;
            session.awaiting = Awaiting::Nothing;
        })
        .await;
    let modes = state.ai.list_modes().await;
    let text = format!("🧠 <b>Керування AI режимами</b>\n\n{}", modes_list_text(&modes, None));
    send_html(bot, chat_id, &text, as_markup(keyboards::ai_management_menu())).await?;
    Ok(())
}

pub async fn list_modes_for_admin(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64) -> HandlerResult {
    if !require_admin(bot, chat_id, state, user_id).await? {
        return Ok(());
    }
    let modes = state.ai.list_modes().await;
    send_html(
        bot,
        chat_id,
        &modes_list_text(&modes, None),
        as_markup(keyboards::ai_management_menu()),
    )
    .await?;
    Ok(())
}

pub async fn start_add_mode(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64) -> HandlerResult {
    if !require_admin(bot, chat_id, state, user_id).await? {
        return Ok(());
    }
    state
        .with_session(user_id, |session| session.awaiting = Awaiting::ModeName)
        .await;
    send_html(
        bot,
        chat_id,
        "➕ <b>Новий режим</b>\n\nВведіть назву режиму одним словом (латиницею або кирилицею):",
        as_markup(keyboards::cancel_menu()),
    )
    .await?;
    Ok(())
}

pub async fn capture_mode_name(
    bot: &Bot,
    chat_id: ChatId,
    state: &BotState,
    user_id: i64,
    raw_name: &str,
) -> HandlerResult {
    if !require_admin(bot, chat_id, state, user_id).await? {
        return Ok(());
    }
    let name = match normalize_mode_name(raw_name) {
        Ok(name) => name,
        Err(error) => {
            send_html(bot, chat_id, &format!("❌ {}", escape(&error.to_string())), None).await?;
            return Ok(());
        }
    };
    let exists = state.ai.has_mode(&name).await;
    state
        .with_session(user_id, |session| {
            session.awaiting = Awaiting::ModePrompt { name: name.clone() };
        })
        .await;
    let note = if exists {
        "\n<i>Режим вже існує, його інструкцію буде замінено.</i>"
    } else {
        ""
    };
    send_html(
        bot,
        chat_id,
        &format!(
            "📝 Режим <code>{}</code>.{note}\n\nТепер надішліть системну інструкцію для AI:",
            escape(&name)
        ),
        as_markup(keyboards::cancel_menu()),
    )
    .await?;
    Ok(())
}

pub async fn capture_mode_prompt(
    bot: &Bot,
    chat_id: ChatId,
    state: &BotState,
    user_id: i64,
    name: &str,
    prompt: &str,
) -> HandlerResult {
    if !require_admin(bot, chat_id, state, user_id).await? {
        return Ok(());
    }
    match state.ai.add_mode(name, prompt).await {
        Ok(created) => {
            state
                .with_session(user_id, |session| {
                    session.awaiting = Awaiting::Nothing;
                    session.menu = Menu::AiManagement;
                })
                .await;
            tracing::info!(admin_id = user_id, mode = %name, created = created, "AI mode saved");
            let verb = if created { "додано" } else { "оновлено" };
            send_html(
                bot,
                chat_id,
                &format!("✅ Режим <code>{}</code> {verb}", escape(name)),
                as_markup(keyboards::ai_management_menu()),
            )
            .await?;
        }
        Err(ModeError::EmptyPrompt) => {
            send_html(bot, chat_id, "❌ Інструкція порожня. Надішліть текст ще раз.", None).await?;
        }
        Err(error) => return Err(error.into()),
    }
    Ok(())
}

pub async fn start_delete_mode(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64) -> HandlerResult {
    if !require_admin(bot, chat_id, state, user_id).await? {
        return Ok(());
    }
    let removable: Vec<String> = state
        .ai
        .list_modes()
        .await
        .into_iter()
        .filter(|mode| !is_builtin(mode))
        .collect();
    if removable.is_empty() {
        send_html(
            bot,
            chat_id,
            "📭 Немає режимів для видалення. Вбудовані режими видалити не можна.",
            as_markup(keyboards::ai_management_menu()),
        )
        .await?;
        return Ok(());
    }
    send_html(
        bot,
        chat_id,
        "➖ <b>Оберіть режим для видалення:</b>",
        as_markup(keyboards::mode_delete_buttons(&removable)),
    )
    .await?;
    Ok(())
}

/// Видаляє режим і переводить на асистента всіх, хто ним користувався.
pub async fn delete_mode(state: &BotState, admin_id: i64, mode: &str) -> Result<(), ModeError> {
    state.ai.delete_mode(mode).await?;
    let mut sessions = state.sessions.lock().await;
    for user_id in sessions.user_ids() {
        if let Some(session) = sessions.get_mut(user_id) {
            if session.ai_mode == mode {
                session.ai_mode = crate::session::DEFAULT_AI_MODE.to_string();
            }
        }
    }
    tracing::info!(admin_id = admin_id, mode = %mode, "AI mode deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::instructions::MODE_PROGRAMMER;
    use crate::bot::handlers::state::test_state;
    use crate::session::DEFAULT_AI_MODE;

    #[tokio::test]
    async fn unknown_mode_is_not_picked() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        assert!(!pick_mode(&state, 7, "poet").await);
        assert_eq!(state.session_snapshot(7).await.ai_mode, DEFAULT_AI_MODE);
        assert!(pick_mode(&state, 7, MODE_PROGRAMMER).await);
        assert_eq!(state.session_snapshot(7).await.ai_mode, MODE_PROGRAMMER);
    }

    #[tokio::test]
    async fn deleting_a_mode_moves_its_users_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        state.ai.add_mode("poet", "Пиши віршами").await.unwrap();
        assert!(pick_mode(&state, 7, "poet").await);
        assert!(pick_mode(&state, 8, MODE_PROGRAMMER).await);

        delete_mode(&state, 1, "poet").await.unwrap();

        assert_eq!(state.session_snapshot(7).await.ai_mode, DEFAULT_AI_MODE);
        assert_eq!(state.session_snapshot(8).await.ai_mode, MODE_PROGRAMMER);
        assert!(matches!(
            delete_mode(&state, 1, MODE_PROGRAMMER).await,
            Err(ModeError::BuiltIn(_))
        ));
    }
}
