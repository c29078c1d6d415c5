use super::admin::{open_admin, require_admin};
use super::donate::mark_donor;
use super::format::{help_text, welcome_text};
use super::menu::cancel_input;
use super::shared::{HandlerResult, as_markup, send_html};
use super::state::{BotState, sender_user_id};
use crate::bot::keyboards;
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
pub enum BotCommand {
    #[command(description = "Головне меню")]
    Start,
    #[command(description = "Довідка")]
    Help,
    #[command(description = "Адмін-панель")]
    Admin,
    #[command(description = "Скасувати введення")]
    Cancel,
    #[command(description = "Позначити донатера (адмін)")]
    Donor,
}

pub fn handler() -> teloxide::dispatching::UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    teloxide::filter_command::<BotCommand, _>()
        .branch(dptree::case![BotCommand::Start].endpoint(start_cmd))
        .branch(dptree::case![BotCommand::Help].endpoint(cmd_help))
        .branch(dptree::case![BotCommand::Admin].endpoint(cmd_admin))
        .branch(dptree::case![BotCommand::Cancel].endpoint(cmd_cancel))
        .branch(dptree::case![BotCommand::Donor].endpoint(cmd_donor))
}

async fn start_cmd(bot: Bot, msg: Message, state: BotState) -> HandlerResult {
    let Some(user_id) = sender_user_id(&msg) else {
        tracing::warn!("Received /start without sender");
        return Ok(());
    };
    tracing::info!(
        user_id = user_id,
        username = ?msg.from.as_ref().and_then(|user| user.username.clone()),
        "Received /start command"
    );

    let (is_donor, show_donate) = state
        .with_session(user_id, |session| {
            session.reset();
            (session.is_donor, session.shows_donate())
        })
        .await;
    state.stats.record_command();

    send_html(
        &bot,
        msg.chat.id,
        &welcome_text(&state.config.school_name, is_donor),
        as_markup(keyboards::main_menu(show_donate)),
    )
    .await?;
    Ok(())
}

async fn cmd_help(bot: Bot, msg: Message, state: BotState) -> HandlerResult {
    let Some(user_id) = sender_user_id(&msg) else {
        return Ok(());
    };
    state.stats.record_command();
    let is_admin = state.is_admin(user_id).await;
    bot.send_message(msg.chat.id, help_text(is_admin)).await?;
    Ok(())
}

async fn cmd_admin(bot: Bot, msg: Message, state: BotState) -> HandlerResult {
    let Some(user_id) = sender_user_id(&msg) else {
        return Ok(());
    };
    tracing::info!(user_id = user_id, "Received /admin command");
    open_admin(&bot, msg.chat.id, &state, user_id).await
}

async fn cmd_cancel(bot: Bot, msg: Message, state: BotState) -> HandlerResult {
    let Some(user_id) = sender_user_id(&msg) else {
        return Ok(());
    };
    cancel_input(&bot, msg.chat.id, &state, user_id).await
}

async fn cmd_donor(bot: Bot, msg: Message, state: BotState) -> HandlerResult {
    let Some(admin_id) = sender_user_id(&msg) else {
        return Ok(());
    };
    if !require_admin(&bot, msg.chat.id, &state, admin_id).await? {
        return Ok(());
    }

    let text = msg.text().unwrap_or("");
    let donor_id: i64 = match text.split_whitespace().nth(1).unwrap_or("").parse() {
        Ok(id) => id,
        Err(_) => {
            bot.send_message(msg.chat.id, "Використання: /donor <telegram_id>")
                .await?;
            return Ok(());
        }
    };
    tracing::info!(admin_id = admin_id, donor_id = donor_id, "Admin command /donor");

    if !mark_donor(&state, donor_id).await? {
        bot.send_message(msg.chat.id, format!("Користувач {donor_id} вже є донатером"))
            .await?;
        return Ok(());
    }
    bot.send_message(msg.chat.id, format!("✅ Користувача {donor_id} позначено донатером"))
        .await?;

    if let Err(error) = send_html(
        &bot,
        ChatId(donor_id),
        "⭐ <b>Дякуємо за підтримку!</b>\n\nВаш донат підтверджено, кнопки донату більше не з'являтимуться.",
        as_markup(keyboards::main_menu(false)),
    )
    .await
    {
        tracing::warn!(donor_id = donor_id, error = %error, "Could not notify donor");
    }
    Ok(())
}

pub fn bot_commands() -> Vec<teloxide::types::BotCommand> {
    BotCommand::bot_commands()
}
