use super::shared::{HandlerResult, as_markup, send_html};
use super::state::{BotState, sender_user_id};
use super::{admin, ai, donate, schedule};
use crate::bot::keyboards::{self as kb, CLASS_ICON, DAY_ICON};
use crate::schedule::{RelativeDay, SchoolDay};
use crate::session::{Awaiting, Menu, Session};
use teloxide::prelude::*;
use teloxide::types::ReplyMarkup;

/// Розпізнана кнопка reply-клавіатури.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuButton {
    Ai,
    Schedule,
    Bells,
    Donate,
    MainMenu,
    Back,
    ChooseClass,
    Class(String),
    Day(SchoolDay),
    Relative(RelativeDay),
    FullWeek,
    OtherDay,
    OtherClass,
    ModeAssistant,
    ModeProgrammer,
    DetailOnce,
    Modes,
    Clear,
    AdminStats,
    AdminReload,
    AdminPassword,
    AdminBroadcast,
    AdminActive,
    AdminAiModes,
    ModesList,
    ModeAdd,
    ModeDelete,
    AdminPanel,
}

impl MenuButton {
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let exact = match text {
            kb::BTN_AI => Some(Self::Ai),
            kb::BTN_SCHEDULE => Some(Self::Schedule),
            kb::BTN_BELLS => Some(Self::Bells),
            kb::BTN_DONATE => Some(Self::Donate),
            kb::BTN_MAIN_MENU => Some(Self::MainMenu),
            kb::BTN_BACK => Some(Self::Back),
            kb::BTN_CHOOSE_CLASS => Some(Self::ChooseClass),
            kb::BTN_TODAY => Some(Self::Relative(RelativeDay::Today)),
            kb::BTN_TOMORROW => Some(Self::Relative(RelativeDay::Tomorrow)),
            kb::BTN_FULL_WEEK => Some(Self::FullWeek),
            kb::BTN_OTHER_DAY => Some(Self::OtherDay),
            kb::BTN_OTHER_CLASS => Some(Self::OtherClass),
            kb::BTN_MODE_ASSISTANT => Some(Self::ModeAssistant),
            kb::BTN_MODE_PROGRAMMER => Some(Self::ModeProgrammer),
            kb::BTN_DETAIL_ONCE => Some(Self::DetailOnce),
            kb::BTN_MODES => Some(Self::Modes),
            kb::BTN_CLEAR => Some(Self::Clear),
            kb::BTN_ADMIN_STATS => Some(Self::AdminStats),
            kb::BTN_ADMIN_RELOAD => Some(Self::AdminReload),
            kb::BTN_ADMIN_PASSWORD => Some(Self::AdminPassword),
            kb::BTN_ADMIN_BROADCAST => Some(Self::AdminBroadcast),
            kb::BTN_ADMIN_ACTIVE => Some(Self::AdminActive),
            kb::BTN_ADMIN_AI_MODES => Some(Self::AdminAiModes),
            kb::BTN_MODES_LIST => Some(Self::ModesList),
            kb::BTN_MODE_ADD => Some(Self::ModeAdd),
            kb::BTN_MODE_DELETE => Some(Self::ModeDelete),
            kb::BTN_ADMIN_PANEL => Some(Self::AdminPanel),
            _ => None,
        };
        if exact.is_some() {
            return exact;
        }

        if let Some(class_name) = text.strip_prefix(CLASS_ICON) {
            let class_name = class_name.trim();
            return (!class_name.is_empty()).then(|| Self::Class(class_name.to_string()));
        }
        if let Some(day_name) = text.strip_prefix(DAY_ICON) {
            return SchoolDay::from_name_ua(day_name).map(Self::Day);
        }
        None
    }

    /// Меню, у якому кнопка має сенс. `None` — кнопка працює звідусіль.
    fn required_menu(&self) -> Option<Menu> {
        match self {
            Self::Ai
            | Self::Schedule
            | Self::Bells
            | Self::Donate
            | Self::MainMenu
            | Self::Back => None,
            Self::ChooseClass
            | Self::Class(_)
            | Self::Day(_)
            | Self::Relative(_)
            | Self::FullWeek
            | Self::OtherDay
            | Self::OtherClass => Some(Menu::Schedule),
            Self::ModeAssistant | Self::ModeProgrammer | Self::DetailOnce | Self::Modes | Self::Clear => {
                Some(Menu::Ai)
            }
            Self::AdminStats
            | Self::AdminReload
            | Self::AdminPassword
            | Self::AdminBroadcast
            | Self::AdminActive
            | Self::AdminAiModes => Some(Menu::Admin),
            Self::ModesList | Self::ModeAdd | Self::ModeDelete | Self::AdminPanel => {
                Some(Menu::AiManagement)
            }
        }
    }
}

/// Клавіатура, яка відповідає поточному стану сесії.
pub fn current_keyboard(session: &Session, classes: &[String]) -> ReplyMarkup {
    let show_donate = session.shows_donate();
    match session.menu {
        Menu::Main => kb::main_menu(show_donate).into(),
        Menu::Ai => kb::ai_menu(show_donate).into(),
        Menu::Schedule => match (&session.selected_class, session.selected_day) {
            (Some(_), Some(_)) => kb::schedule_result_menu(show_donate).into(),
            (Some(_), None) => kb::days_menu(show_donate).into(),
            (None, _) if !classes.is_empty() => kb::schedule_menu(show_donate).into(),
            (None, _) => kb::main_menu(show_donate).into(),
        },
        Menu::Admin => kb::admin_menu().into(),
        Menu::AiManagement => kb::ai_management_menu().into(),
    }
}

pub async fn handle_menu_buttons(bot: Bot, msg: Message, state: BotState) -> HandlerResult {
    let Some(raw_text) = msg.text() else {
        return Ok(());
    };
    let text = raw_text.trim();
    let Some(user_id) = sender_user_id(&msg) else {
        return Ok(());
    };
    let chat_id = msg.chat.id;
    let (awaiting, menu) = state
        .with_session(user_id, |session| (session.awaiting.clone(), session.menu))
        .await;

    if text == kb::BTN_CANCEL {
        return cancel_input(&bot, chat_id, &state, user_id).await;
    }
    if awaiting != Awaiting::Nothing {
        return capture_input(&bot, &msg, &state, user_id, awaiting, raw_text).await;
    }

    let button = MenuButton::parse(text)
        .filter(|button| button.required_menu().is_none_or(|required| required == menu));
    let Some(button) = button else {
        if menu == Menu::Ai && !text.starts_with('/') {
            return ai::answer_question(&bot, chat_id, &state, user_id, text).await;
        }
        return reply_not_understood(&bot, chat_id, &state, user_id).await;
    };
    tracing::debug!(user_id = user_id, button = ?button, "Menu button pressed");

    match button {
        MenuButton::Ai => ai::open_ai_menu(&bot, chat_id, &state, user_id).await,
        MenuButton::Schedule => schedule::open_schedule(&bot, chat_id, &state, user_id).await,
        MenuButton::Bells => schedule::show_bells(&bot, chat_id, &state, user_id).await,
        MenuButton::Donate => donate::show_donate(&bot, chat_id, &state, user_id).await,
        MenuButton::MainMenu => go_main(&bot, chat_id, &state, user_id).await,
        MenuButton::Back if menu == Menu::Schedule => {
            schedule::back_to_schedule_menu(&bot, chat_id, &state, user_id).await
        }
        MenuButton::Back => go_main(&bot, chat_id, &state, user_id).await,
        MenuButton::ChooseClass => schedule::choose_class(&bot, chat_id, &state, user_id).await,
        MenuButton::Class(class_name) => {
            schedule::select_class(&bot, chat_id, &state, user_id, &class_name).await
        }
        MenuButton::Day(day) => schedule::select_day(&bot, chat_id, &state, user_id, day).await,
        MenuButton::Relative(relative) => {
            schedule::show_relative_day(&bot, chat_id, &state, user_id, relative).await
        }
        MenuButton::FullWeek => schedule::show_full_week(&bot, chat_id, &state, user_id).await,
        MenuButton::OtherDay => schedule::other_day(&bot, chat_id, &state, user_id).await,
        MenuButton::OtherClass => schedule::other_class(&bot, chat_id, &state, user_id).await,
        MenuButton::ModeAssistant => {
            ai::set_mode(&bot, chat_id, &state, user_id, crate::ai::instructions::MODE_ASSISTANT).await
        }
        MenuButton::ModeProgrammer => {
            ai::set_mode(&bot, chat_id, &state, user_id, crate::ai::instructions::MODE_PROGRAMMER).await
        }
        MenuButton::DetailOnce => ai::detail_once(&bot, chat_id, &state, user_id).await,
        MenuButton::Modes => ai::show_modes(&bot, chat_id, &state, user_id).await,
        MenuButton::Clear => ai::clear(&bot, chat_id, &state, user_id).await,
        MenuButton::AdminStats => admin::show_stats(&bot, chat_id, &state, user_id).await,
        MenuButton::AdminReload => admin::reload_schedule(&bot, chat_id, &state, user_id).await,
        MenuButton::AdminPassword => {
            admin::start_password_change(&bot, chat_id, &state, user_id).await
        }
        MenuButton::AdminBroadcast => admin::start_broadcast(&bot, chat_id, &state, user_id).await,
        MenuButton::AdminActive => admin::show_active_users(&bot, chat_id, &state, user_id).await,
        MenuButton::AdminAiModes => ai::open_ai_management(&bot, chat_id, &state, user_id).await,
        MenuButton::ModesList => ai::list_modes_for_admin(&bot, chat_id, &state, user_id).await,
        MenuButton::ModeAdd => ai::start_add_mode(&bot, chat_id, &state, user_id).await,
        MenuButton::ModeDelete => ai::start_delete_mode(&bot, chat_id, &state, user_id).await,
        MenuButton::AdminPanel => admin::open_admin(&bot, chat_id, &state, user_id).await,
    }
}

async fn capture_input(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    user_id: i64,
    awaiting: Awaiting,
    raw_text: &str,
) -> HandlerResult {
    // Пароль порівнюється як є, решта введення без крайових пробілів.
    let text = raw_text.trim();
    match awaiting {
        Awaiting::Nothing => Ok(()),
        Awaiting::Password => admin::finish_login(bot, msg, state, user_id, raw_text).await,
        Awaiting::NewPassword => admin::finish_password_change(bot, msg, state, user_id, text).await,
        Awaiting::BroadcastText => admin::finish_broadcast(bot, msg.chat.id, state, user_id, text).await,
        Awaiting::ModeName => ai::capture_mode_name(bot, msg.chat.id, state, user_id, text).await,
        Awaiting::ModePrompt { name } => {
            ai::capture_mode_prompt(bot, msg.chat.id, state, user_id, &name, text).await
        }
    }
}

/// Скасовує очікуване введення. Адмін лишається у своєму меню.
pub async fn cancel_input(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64) -> HandlerResult {
    let session = state
        .with_session(user_id, |session| {
            session.awaiting = Awaiting::Nothing;
            let admin_menu = matches!(session.menu, Menu::Admin | Menu::AiManagement);
            if !(admin_menu && session.is_admin) {
                session.go_main();
            }
            session.clone()
        })
        .await;
    let classes = state.schedule.read().await.classes().to_vec();
    send_html(bot, chat_id, "■ Скасовано", Some(current_keyboard(&session, &classes))).await?;
    Ok(())
}

pub async fn go_main(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64) -> HandlerResult {
    let show_donate = state
        .with_session(user_id, |session| {
            session.go_main();
            session.shows_donate()
        })
        .await;
    state.stats.record_command();
    send_html(
        bot,
        chat_id,
        "■ <b>Головне меню</b>",
        as_markup(kb::main_menu(show_donate)),
    )
    .await?;
    Ok(())
}

async fn reply_not_understood(bot: &Bot, chat_id: ChatId, state: &BotState, user_id: i64) -> HandlerResult {
    let session = state.session_snapshot(user_id).await;
    let classes = state.schedule.read().await.classes().to_vec();
    send_html(
        bot,
        chat_id,
        "Не зрозумів запит. Скористайтеся кнопками меню нижче.",
        Some(current_keyboard(&session, &classes)),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_labels_win_over_icon_prefixes() {
        assert_eq!(MenuButton::parse(kb::BTN_CHOOSE_CLASS), Some(MenuButton::ChooseClass));
        assert_eq!(MenuButton::parse(kb::BTN_FULL_WEEK), Some(MenuButton::FullWeek));
        assert_eq!(MenuButton::parse(kb::BTN_SCHEDULE), Some(MenuButton::Schedule));
    }

    #[test]
    fn class_and_day_buttons_are_recognised_by_prefix() {
        assert_eq!(
            MenuButton::parse(&kb::class_button_label("10-Б")),
            Some(MenuButton::Class("10-Б".to_string()))
        );
        assert_eq!(
            MenuButton::parse(&kb::day_button_label(SchoolDay::Thursday)),
            Some(MenuButton::Day(SchoolDay::Thursday))
        );
        assert_eq!(MenuButton::parse("▶ Субота"), None);
        assert_eq!(MenuButton::parse(CLASS_ICON), None);
    }

    #[test]
    fn cancel_is_not_routed_as_a_menu_button() {
        assert_eq!(MenuButton::parse(kb::BTN_CANCEL), None);
    }

    #[test]
    fn free_text_is_not_a_button() {
        assert_eq!(MenuButton::parse("Що таке інтеграл?"), None);
        assert_eq!(MenuButton::parse("асистент"), None);
    }

    #[test]
    fn buttons_are_bound_to_their_menus() {
        assert_eq!(MenuButton::ModeAssistant.required_menu(), Some(Menu::Ai));
        assert_eq!(MenuButton::Day(SchoolDay::Monday).required_menu(), Some(Menu::Schedule));
        assert_eq!(MenuButton::AdminReload.required_menu(), Some(Menu::Admin));
        assert_eq!(MenuButton::ModeDelete.required_menu(), Some(Menu::AiManagement));
        assert_eq!(MenuButton::Bells.required_menu(), None);
    }
}
