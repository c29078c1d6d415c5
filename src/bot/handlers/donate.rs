use super::format::{donate_text, donation_notice_text};
use super::shared::{HandlerResult, as_markup, build_qr_png_bytes, donation_link, send_html};
use super::state::BotState;
use crate::bot::keyboards;
use teloxide::prelude::*;
use teloxide::types::InputFile;

pub async fn show_donate(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64) -> HandlerResult {
    let (is_donor, show_donate) = state
        .with_session(user_id, |session| (session.is_donor, session.shows_donate()))
        .await;
    state.stats.record_command();

    if is_donor {
        send_html(
            bot,
            chat_id,
            "⭐ <b>Ви вже підтримали проєкт!</b>\n\nДякуємо, що допомагаєте боту працювати.",
            as_markup(keyboards::main_menu(show_donate)),
        )
        .await?;
        return Ok(());
    }

    let link = donation_link(&state.config.donation_url, user_id);
    send_html(
        bot,
        chat_id,
        &donate_text(user_id),
        as_markup(keyboards::donate_buttons(link)),
    )
    .await?;
    Ok(())
}

pub async fn send_donation_qr(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64) -> HandlerResult {
    let Some(link) = donation_link(&state.config.donation_url, user_id) else {
        send_html(bot, chat_id, "❌ Посилання для донату не налаштоване.", None).await?;
        return Ok(());
    };
    let png = build_qr_png_bytes(link.as_str())?;
    bot.send_photo(chat_id, InputFile::memory(png).file_name("donate_qr.png"))
        .caption(format!("📷 QR-код для донату\n\nTelegram ID для коментаря: {user_id}"))
        .await?;
    Ok(())
}

/// Ховає кнопку донату до наступного /start.
pub async fn hide_donate(state: &BotState, user_id: i64) {
    state
        .with_session(user_id, |session| session.donate_hidden = true)
        .await;
}

/// Надсилає адмінам повідомлення про заявлений донат. Повертає кількість доставлених.
pub async fn notify_admins_about_donation(bot: &Bot, state: &BotState, user_id: i64, username: Option<&str>) -> usize {
    let admin_ids = state.admins.lock().await.admin_ids().to_vec();
    let text = donation_notice_text(user_id, username);
    let mut delivered = 0;
    for admin_id in admin_ids {
        match send_html(bot, ChatId(admin_id), &text, None).await {
            Ok(_) => delivered += 1,
            Err(error) => {
                tracing::warn!(admin_id = admin_id, error = %error, "Donation notice delivery failed");
            }
        }
    }
    tracing::info!(user_id = user_id, delivered = delivered, "Donation claim forwarded to admins");
    delivered
}

/// Позначає користувача донатером і ховає йому кнопки донату.
/// Повертає `false`, якщо він уже був у списку.
pub async fn mark_donor(state: &BotState, donor_id: i64) -> Result<bool, crate::admins::AdminStoreError> {
    let added = state.admins.lock().await.add_donor(donor_id)?;
    if let Some(session) = state.sessions.lock().await.get_mut(donor_id) {
        session.is_donor = true;
        session.donate_hidden = true;
    }
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::handlers::state::test_state;

    #[tokio::test]
    async fn hidden_donate_returns_after_reset() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        hide_donate(&state, 9).await;
        assert!(!state.session_snapshot(9).await.shows_donate());

        state.with_session(9, |session| session.reset()).await;
        assert!(state.session_snapshot(9).await.shows_donate());
    }

    #[tokio::test]
    async fn marked_donor_never_sees_donate_again() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        state.session_snapshot(9).await;

        assert!(mark_donor(&state, 9).await.unwrap());
        assert!(!mark_donor(&state, 9).await.unwrap());

        state.with_session(9, |session| session.reset()).await;
        let session = state.session_snapshot(9).await;
        assert!(session.is_donor);
        assert!(!session.shows_donate());
    }
}
