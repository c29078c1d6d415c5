use super::shared::{HandlerResult, as_markup, loading_animation, send_html, send_long};
use super::state::BotState;
use crate::bot::keyboards;
use crate::schedule::{RelativeDay, SchoolDay, Shift};
use crate::session::Menu;
use chrono::{Datelike, Local, Timelike};
use teloxide::prelude::*;
use teloxide::utils::html::escape;

const NOT_LOADED: &str = "❌ Розклад не завантажено. Зверніться до адміністратора.";

pub async fn open_schedule(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64) -> HandlerResult {
    let show_donate = state
        .with_session(user_id, |session| {
            session.menu = Menu::Schedule;
            session.selected_class = None;
            session.selected_day = None;
            session.shows_donate()
        })
        .await;
    state.stats.record_command();

    if state.schedule.read().await.classes().is_empty() {
        send_html(bot, chat_id, NOT_LOADED, as_markup(keyboards::main_menu(show_donate))).await?;
        return Ok(());
    }
    let text = format!(
        "📋 <b>Розклад {}</b>\n\nОберіть опцію:",
        escape(&state.config.school_name)
    );
    send_html(bot, chat_id, &text, as_markup(keyboards::schedule_menu(show_donate))).await?;
    Ok(())
}

pub async fn choose_class(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64) -> HandlerResult {
    let show_donate = state
        .with_session(user_id, |session| {
            session.selected_class = None;
            session.selected_day = None;
            session.shows_donate()
        })
        .await;
    send_classes(bot, chat_id, state, show_donate, "● <b>Оберіть клас:</b>").await
}

async fn send_classes(
    bot: &Bot,
    chat_id: ChatId,
    state: &BotState,
    show_donate: bool,
    prompt: &str,
) -> HandlerResult {
    let classes = state.schedule.read().await.classes().to_vec();
    if classes.is_empty() {
        send_html(bot, chat_id, NOT_LOADED, as_markup(keyboards::schedule_menu(show_donate))).await?;
        return Ok(());
    }
    send_html(
        bot,
        chat_id,
        prompt,
        as_markup(keyboards::classes_menu(&classes, show_donate)),
    )
    .await?;
    Ok(())
}

pub async fn select_class(
    bot: &Bot,
    chat_id: ChatId,
    state: &BotState,
    user_id: i64,
    class_name: &str,
) -> HandlerResult {
    let (known, shift) = {
        let schedule = state.schedule.read().await;
        (schedule.has_class(class_name), schedule.shift_for_class(class_name))
    };
    if !known {
        let show_donate = state.with_session(user_id, |session| session.shows_donate()).await;
        return send_classes(bot, chat_id, state, show_donate, "❓ Невідомий клас. Оберіть зі списку:").await;
    }

    let show_donate = state
        .with_session(user_id, |session| {
            session.selected_class = Some(class_name.to_string());
            session.selected_day = None;
            session.shows_donate()
        })
        .await;
    tracing::debug!(user_id = user_id, class_name = class_name, "Class selected");
    let text = format!(
        "📋 <b>Обрано клас: {}</b>\n{}\n\nТепер оберіть день 👇",
        escape(class_name),
        shift.label()
    );
    send_html(bot, chat_id, &text, as_markup(keyboards::days_menu(show_donate))).await?;
    Ok(())
}

/// Повертає вибраний клас або просить його обрати.
async fn require_class(
    bot: &Bot,
    chat_id: ChatId,
    state: &BotState,
    user_id: i64,
) -> Result<Option<String>, teloxide::RequestError> {
    let (class_name, show_donate) = state
        .with_session(user_id, |session| (session.selected_class.clone(), session.shows_donate()))
        .await;
    if class_name.is_none() {
        let classes = state.schedule.read().await.classes().to_vec();
        send_html(
            bot,
            chat_id,
            "❌ Спочатку оберіть клас!",
            as_markup(keyboards::classes_menu(&classes, show_donate)),
        )
        .await?;
    }
    Ok(class_name)
}

pub async fn select_day(
    bot: &Bot,
    chat_id: ChatId,
    state: &BotState,
    user_id: i64,
    day: SchoolDay,
) -> HandlerResult {
    let Some(class_name) = require_class(bot, chat_id, state, user_id).await? else {
        return Ok(());
    };
    let show_donate = state
        .with_session(user_id, |session| {
            session.selected_day = Some(day);
            session.shows_donate()
        })
        .await;
    state.stats.record_schedule_view();

    loading_animation(bot, chat_id, "Завантаження розкладу", &state.config.ui).await;
    let text = state
        .schedule
        .read()
        .await
        .class_day_text(Some(&class_name), Some(day));
    send_long(
        bot,
        chat_id,
        &text,
        true,
        as_markup(keyboards::schedule_result_menu(show_donate)),
        state.config.limits.max_message_len,
    )
    .await?;
    Ok(())
}

pub async fn show_relative_day(
    bot: &Bot,
    chat_id: ChatId,
    state: &BotState,
    user_id: i64,
    relative: RelativeDay,
) -> HandlerResult {
    let Some(class_name) = require_class(bot, chat_id, state, user_id).await? else {
        return Ok(());
    };
    let today = Local::now().weekday();
    let show_donate = state
        .with_session(user_id, |session| {
            session.selected_day = Some(relative.resolve(today));
            session.shows_donate()
        })
        .await;
    state.stats.record_schedule_view();

    loading_animation(bot, chat_id, "Завантаження розкладу", &state.config.ui).await;
    let text = state
        .schedule
        .read()
        .await
        .relative_day_text(&class_name, relative, today);
    send_long(
        bot,
        chat_id,
        &text,
        true,
        as_markup(keyboards::schedule_result_menu(show_donate)),
        state.config.limits.max_message_len,
    )
    .await?;
    Ok(())
}

pub async fn show_full_week(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64) -> HandlerResult {
    let Some(class_name) = require_class(bot, chat_id, state, user_id).await? else {
        return Ok(());
    };
    let show_donate = state.with_session(user_id, |session| session.shows_donate()).await;
    state.stats.record_schedule_view();

    loading_animation(bot, chat_id, "Завантаження тижня", &state.config.ui).await;
    let text = state.schedule.read().await.full_week_text(&class_name);
    send_long(
        bot,
        chat_id,
        &text,
        true,
        as_markup(keyboards::schedule_result_menu(show_donate)),
        state.config.limits.max_message_len,
    )
    .await?;
    Ok(())
}

pub async fn other_day(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64) -> HandlerResult {
    let Some(class_name) = require_class(bot, chat_id, state, user_id).await? else {
        return Ok(());
    };
    let show_donate = state
        .with_session(user_id, |session| {
            session.selected_day = None;
            session.shows_donate()
        })
        .await;
    let text = format!("📋 <b>Клас: {}</b>\n\nОберіть інший день:", escape(&class_name));
    send_html(bot, chat_id, &text, as_markup(keyboards::days_menu(show_donate))).await?;
    Ok(())
}

pub async fn other_class(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64) -> HandlerResult {
    let show_donate = state
        .with_session(user_id, |session| {
            session.selected_class = None;
            session.selected_day = None;
            session.shows_donate()
        })
        .await;
    send_classes(bot, chat_id, state, show_donate, "● <b>Оберіть інший клас:</b>").await
}

pub async fn back_to_schedule_menu(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64) -> HandlerResult {
    let show_donate = state
        .with_session(user_id, |session| {
            session.selected_class = None;
            session.selected_day = None;
            session.shows_donate()
        })
        .await;
    send_html(
        bot,
        chat_id,
        "📋 Оберіть опцію:",
        as_markup(keyboards::schedule_menu(show_donate)),
    )
    .await?;
    Ok(())
}

/// Зміна для дзвінків: за вибраним класом, інакше за поточною годиною.
fn bells_shift(class_shift: Option<Shift>, hour: u32, second_shift_from_hour: u32) -> Shift {
    match class_shift {
        Some(shift) => shift,
        None if hour >= second_shift_from_hour => Shift::Second,
        None => Shift::First,
    }
}

pub async fn show_bells(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64) -> HandlerResult {
    let selected_class = state
        .with_session(user_id, |session| session.selected_class.clone())
        .await;
    state.stats.record_command();

    loading_animation(bot, chat_id, "Завантаження дзвінків", &state.config.ui).await;
    let text = {
        let schedule = state.schedule.read().await;
        let class_shift = selected_class
            .as_deref()
            .map(|class_name| schedule.shift_for_class(class_name));
        let shift = bells_shift(
            class_shift,
            Local::now().hour(),
            state.config.shifts.second_shift_from_hour,
        );
        schedule.bells_text(shift)
    };
    send_html(bot, chat_id, &text, as_markup(keyboards::bells_menu())).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selected_class_decides_bells_shift() {
        assert_eq!(bells_shift(Some(Shift::First), 15, 12), Shift::First);
        assert_eq!(bells_shift(Some(Shift::Second), 8, 12), Shift::Second);
    }

    #[test]
    fn hour_decides_bells_shift_without_class() {
        assert_eq!(bells_shift(None, 11, 12), Shift::First);
        assert_eq!(bells_shift(None, 12, 12), Shift::Second);
    }
}
