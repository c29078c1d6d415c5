use super::admin::{apply_password_change, password_changed_text, require_admin_callback};
use super::ai::{delete_mode, pick_mode};
use super::donate::{hide_donate, notify_admins_about_donation, send_donation_qr};
use super::shared::{
    HandlerResult, as_markup, callback_message_target, callback_payload, callback_prefix_filter, send_html,
};
use super::state::{BotState, user_id_of};
use crate::admins::generate_password;
use crate::bot::keyboards::{
    self, CB_DONATE_DONE, CB_DONATE_HIDE, CB_DONATE_QR, CB_MODE_DELETE, CB_MODE_PICK, CB_PASSWORD_GENERATE,
};
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, ParseMode};
use teloxide::utils::html::escape;

pub fn handler() -> teloxide::dispatching::UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    Update::filter_callback_query()
        .branch(dptree::filter_map(callback_prefix_filter(CB_DONATE_DONE)).endpoint(callback_donate_done))
        .branch(dptree::filter_map(callback_prefix_filter(CB_DONATE_HIDE)).endpoint(callback_donate_hide))
        .branch(dptree::filter_map(callback_prefix_filter(CB_DONATE_QR)).endpoint(callback_donate_qr))
        .branch(dptree::filter_map(callback_prefix_filter(CB_MODE_PICK)).endpoint(callback_mode_pick))
        .branch(dptree::filter_map(callback_prefix_filter(CB_MODE_DELETE)).endpoint(callback_mode_delete))
        .branch(
            dptree::filter_map(callback_prefix_filter(CB_PASSWORD_GENERATE))
                .endpoint(callback_password_generate),
        )
}

async fn callback_donate_done(bot: Bot, q: CallbackQuery, state: BotState) -> HandlerResult {
    let user_id = user_id_of(&q.from);
    tracing::info!(user_id = user_id, "Donation claimed by user");
    bot.answer_callback_query(q.id.clone())
        .text("Дякуємо! Адміністратор перевірить платіж.")
        .await?;

    if let Some((chat_id, message_id)) = callback_message_target(&q) {
        bot.edit_message_text(
            chat_id,
            message_id,
            "✅ <b>Дякуємо за підтримку!</b>\n\nАдміністратор перевірить платіж і надасть вам статус донатера.",
        )
        .parse_mode(ParseMode::Html)
        .reply_markup(InlineKeyboardMarkup::default())
        .await?;
    }
    notify_admins_about_donation(&bot, &state, user_id, q.from.username.as_deref()).await;
    Ok(())
}

async fn callback_donate_hide(bot: Bot, q: CallbackQuery, state: BotState) -> HandlerResult {
    let user_id = user_id_of(&q.from);
    hide_donate(&state, user_id).await;
    bot.answer_callback_query(q.id.clone()).text("Кнопку сховано").await?;

    if let Some((chat_id, _)) = callback_message_target(&q) {
        send_html(
            &bot,
            chat_id,
            "👌 Кнопку донату сховано. Щоб повернути її, надішліть /start.",
            as_markup(keyboards::main_menu(false)),
        )
        .await?;
    }
    Ok(())
}

async fn callback_donate_qr(bot: Bot, q: CallbackQuery, state: BotState) -> HandlerResult {
    let user_id = user_id_of(&q.from);
    bot.answer_callback_query(q.id.clone()).await?;
    let Some((chat_id, _)) = callback_message_target(&q) else {
        return Ok(());
    };
    send_donation_qr(&bot, chat_id, &state, user_id).await
}

async fn callback_mode_pick(bot: Bot, q: CallbackQuery, state: BotState) -> HandlerResult {
    let user_id = user_id_of(&q.from);
    let mode = callback_payload(&q, CB_MODE_PICK)?;

    if !pick_mode(&state, user_id, mode).await {
        bot.answer_callback_query(q.id.clone())
            .text("Режим більше недоступний")
            .show_alert(true)
            .await?;
        return Ok(());
    }
    tracing::debug!(user_id = user_id, mode = %mode, "AI mode picked from list");
    bot.answer_callback_query(q.id.clone())
        .text(format!("Режим: {mode}"))
        .await?;

    if let Some((chat_id, message_id)) = callback_message_target(&q) {
        let modes = state.ai.list_modes().await;
        bot.edit_message_reply_markup(chat_id, message_id)
            .reply_markup(keyboards::mode_pick_buttons(&modes, mode))
            .await?;
    }
    Ok(())
}

async fn callback_mode_delete(bot: Bot, q: CallbackQuery, state: BotState) -> HandlerResult {
    let Some(admin_id) = require_admin_callback(&bot, &q, &state).await? else {
        return Ok(());
    };
    let mode = callback_payload(&q, CB_MODE_DELETE)?;

    if let Err(error) = delete_mode(&state, admin_id, mode).await {
        bot.answer_callback_query(q.id.clone())
            .text(format!("❌ {error}"))
            .show_alert(true)
            .await?;
        return Ok(());
    }
    bot.answer_callback_query(q.id.clone()).text("Видалено").await?;

    if let Some((chat_id, message_id)) = callback_message_target(&q) {
        bot.edit_message_text(
            chat_id,
            message_id,
            format!("🗑 Режим <code>{}</code> видалено", escape(mode)),
        )
        .parse_mode(ParseMode::Html)
        .reply_markup(InlineKeyboardMarkup::default())
        .await?;
    }
    Ok(())
}

async fn callback_password_generate(bot: Bot, q: CallbackQuery, state: BotState) -> HandlerResult {
    let Some(admin_id) = require_admin_callback(&bot, &q, &state).await? else {
        return Ok(());
    };
    let new_password = generate_password();
    let Some(new_password) = apply_password_change(&state, admin_id, &new_password).await? else {
        bot.answer_callback_query(q.id.clone())
            .text("Згенерований пароль закороткий, збільште налаштування")
            .show_alert(true)
            .await?;
        return Ok(());
    };
    bot.answer_callback_query(q.id.clone()).text("Пароль змінено").await?;

    if let Some((chat_id, message_id)) = callback_message_target(&q) {
        bot.edit_message_reply_markup(chat_id, message_id)
            .reply_markup(InlineKeyboardMarkup::default())
            .await?;
        send_html(
            &bot,
            chat_id,
            &password_changed_text(&new_password),
            as_markup(keyboards::admin_menu()),
        )
        .await?;
    }
    Ok(())
}
