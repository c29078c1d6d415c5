//! Клавіатури бота: постійні reply-кнопки меню та inline-кнопки.

use crate::schedule::SchoolDay;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};

pub const CLASS_ICON: &str = "● ";
pub const DAY_ICON: &str = "▶ ";

pub const BTN_AI: &str = "🤖 AI Помічник";
pub const BTN_SCHEDULE: &str = "📋 Розклад";
pub const BTN_BELLS: &str = "⏰ Дзвінки";
pub const BTN_DONATE: &str = "💰 Підтримати";
pub const BTN_MAIN_MENU: &str = "■ Головне меню";
pub const BTN_BACK: &str = "◀ Назад";
pub const BTN_CANCEL: &str = "❌ Скасувати";

pub const BTN_CHOOSE_CLASS: &str = "● Вибрати клас";
pub const BTN_TODAY: &str = "📆 Сьогодні";
pub const BTN_TOMORROW: &str = "📅 Завтра";
pub const BTN_FULL_WEEK: &str = "📋 Весь розклад";
pub const BTN_OTHER_DAY: &str = "◀ Інший день";
pub const BTN_OTHER_CLASS: &str = "◀ Інший клас";

pub const BTN_MODE_ASSISTANT: &str = "Асистент";
pub const BTN_MODE_PROGRAMMER: &str = "Програміст";
pub const BTN_DETAIL_ONCE: &str = "Детально (1 раз)";
pub const BTN_MODES: &str = "Режими";
pub const BTN_CLEAR: &str = "Очистити";

pub const BTN_ADMIN_STATS: &str = "📊 Статистика реального часу";
pub const BTN_ADMIN_RELOAD: &str = "🔄 Оновити розклад";
pub const BTN_ADMIN_PASSWORD: &str = "🔑 Змінити пароль";
pub const BTN_ADMIN_BROADCAST: &str = "📢 Розсилка";
pub const BTN_ADMIN_ACTIVE: &str = "👥 Активні користувачі";
pub const BTN_ADMIN_AI_MODES: &str = "🧠 AI режими";

pub const BTN_MODES_LIST: &str = "📜 Список режимів";
pub const BTN_MODE_ADD: &str = "➕ Додати режим";
pub const BTN_MODE_DELETE: &str = "➖ Видалити режим";
pub const BTN_ADMIN_PANEL: &str = "⚙️ Адмін-панель";

pub const CB_DONATE_DONE: &str = "donate_done";
pub const CB_DONATE_HIDE: &str = "donate_hide";
pub const CB_DONATE_QR: &str = "donate_qr";
pub const CB_MODE_PICK: &str = "mode_pick:";
pub const CB_MODE_DELETE: &str = "mode_del:";
pub const CB_PASSWORD_GENERATE: &str = "pwd_gen";

const CLASSES_PER_ROW: usize = 4;

fn buttons(labels: &[&str]) -> Vec<KeyboardButton> {
    labels.iter().map(|label| KeyboardButton::new(*label)).collect()
}

fn reply_keyboard(rows: Vec<Vec<KeyboardButton>>) -> KeyboardMarkup {
    KeyboardMarkup::new(rows).resize_keyboard()
}

/// Останній ряд: кнопка донату (якщо показується) і кнопка виходу.
fn footer_row(show_donate: bool, exit_label: &str) -> Vec<KeyboardButton> {
    let mut row = Vec::with_capacity(2);
    if show_donate {
        row.push(KeyboardButton::new(BTN_DONATE));
    }
    row.push(KeyboardButton::new(exit_label));
    row
}

pub fn main_menu(show_donate: bool) -> KeyboardMarkup {
    let mut second = Vec::with_capacity(2);
    if show_donate {
        second.push(KeyboardButton::new(BTN_DONATE));
    }
    second.push(KeyboardButton::new(BTN_BELLS));
    reply_keyboard(vec![buttons(&[BTN_AI, BTN_SCHEDULE]), second])
}

pub fn ai_menu(show_donate: bool) -> KeyboardMarkup {
    reply_keyboard(vec![
        buttons(&[BTN_MODE_ASSISTANT, BTN_MODE_PROGRAMMER]),
        buttons(&[BTN_DETAIL_ONCE, BTN_MODES]),
        buttons(&[BTN_CLEAR]),
        footer_row(show_donate, BTN_MAIN_MENU),
    ])
}

pub fn schedule_menu(show_donate: bool) -> KeyboardMarkup {
    reply_keyboard(vec![
        buttons(&[BTN_CHOOSE_CLASS]),
        buttons(&[BTN_TODAY, BTN_TOMORROW]),
        buttons(&[BTN_BELLS]),
        footer_row(show_donate, BTN_MAIN_MENU),
    ])
}

pub fn class_button_label(class_name: &str) -> String {
    format!("{CLASS_ICON}{class_name}")
}

pub fn day_button_label(day: SchoolDay) -> String {
    format!("{DAY_ICON}{}", day.name_ua())
}

pub fn classes_menu(classes: &[String], show_donate: bool) -> KeyboardMarkup {
    let mut rows: Vec<Vec<KeyboardButton>> = classes
        .chunks(CLASSES_PER_ROW)
        .map(|chunk| {
            chunk
                .iter()
                .map(|name| KeyboardButton::new(class_button_label(name)))
                .collect()
        })
        .collect();
    rows.push(footer_row(show_donate, BTN_BACK));
    reply_keyboard(rows)
}

pub fn days_menu(show_donate: bool) -> KeyboardMarkup {
    let day = |day: SchoolDay| KeyboardButton::new(day_button_label(day));
    reply_keyboard(vec![
        vec![day(SchoolDay::Monday), day(SchoolDay::Tuesday)],
        vec![day(SchoolDay::Wednesday), day(SchoolDay::Thursday)],
        vec![day(SchoolDay::Friday)],
        footer_row(show_donate, BTN_OTHER_CLASS),
    ])
}

pub fn schedule_result_menu(show_donate: bool) -> KeyboardMarkup {
    reply_keyboard(vec![
        buttons(&[BTN_TODAY, BTN_TOMORROW]),
        buttons(&[BTN_OTHER_DAY, BTN_OTHER_CLASS]),
        buttons(&[BTN_FULL_WEEK, BTN_BELLS]),
        footer_row(show_donate, BTN_MAIN_MENU),
    ])
}

pub fn bells_menu() -> KeyboardMarkup {
    reply_keyboard(vec![buttons(&[BTN_BACK]), buttons(&[BTN_MAIN_MENU])])
}

pub fn admin_menu() -> KeyboardMarkup {
    reply_keyboard(vec![
        buttons(&[BTN_ADMIN_STATS]),
        buttons(&[BTN_ADMIN_RELOAD, BTN_ADMIN_PASSWORD]),
        buttons(&[BTN_ADMIN_BROADCAST, BTN_ADMIN_ACTIVE]),
        buttons(&[BTN_ADMIN_AI_MODES]),
        buttons(&[BTN_MAIN_MENU]),
    ])
}

pub fn ai_management_menu() -> KeyboardMarkup {
    reply_keyboard(vec![
        buttons(&[BTN_MODES_LIST]),
        buttons(&[BTN_MODE_ADD, BTN_MODE_DELETE]),
        buttons(&[BTN_ADMIN_PANEL]),
    ])
}

pub fn cancel_menu() -> KeyboardMarkup {
    reply_keyboard(vec![buttons(&[BTN_CANCEL])])
}

pub fn donate_buttons(donation_link: Option<reqwest::Url>) -> InlineKeyboardMarkup {
    let mut keyboard = InlineKeyboardMarkup::default();
    if let Some(url) = donation_link {
        keyboard = keyboard.append_row(vec![InlineKeyboardButton::url(
            "💰 Підтримати бота (Monobank)",
            url,
        )]);
    }
    keyboard
        .append_row(vec![InlineKeyboardButton::callback(
            "📷 QR-код для донату",
            CB_DONATE_QR,
        )])
        .append_row(vec![InlineKeyboardButton::callback(
            "✅ Я задонатив",
            CB_DONATE_DONE,
        )])
        .append_row(vec![InlineKeyboardButton::callback(
            "❌ Сховати назавжди",
            CB_DONATE_HIDE,
        )])
}

pub fn mode_pick_buttons(modes: &[String], current: &str) -> InlineKeyboardMarkup {
    modes.iter().fold(InlineKeyboardMarkup::default(), |keyboard, mode| {
        let label = if mode == current {
            format!("✅ {mode}")
        } else {
            mode.clone()
        };
        keyboard.append_row(vec![InlineKeyboardButton::callback(
            label,
            format!("{CB_MODE_PICK}{mode}"),
        )])
    })
}

pub fn mode_delete_buttons(modes: &[String]) -> InlineKeyboardMarkup {
    modes.iter().fold(InlineKeyboardMarkup::default(), |keyboard, mode| {
        keyboard.append_row(vec![InlineKeyboardButton::callback(
            format!("🗑 {mode}"),
            format!("{CB_MODE_DELETE}{mode}"),
        )])
    })
}

pub fn password_generate_button() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::default().append_row(vec![InlineKeyboardButton::callback(
        "🎲 Згенерувати пароль",
        CB_PASSWORD_GENERATE,
    )])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(keyboard: &KeyboardMarkup) -> Vec<Vec<String>> {
        keyboard
            .keyboard
            .iter()
            .map(|row| row.iter().map(|button| button.text.clone()).collect())
            .collect()
    }

    #[test]
    fn main_menu_hides_donate_when_requested() {
        assert_eq!(labels(&main_menu(true))[1], vec![BTN_DONATE, BTN_BELLS]);
        assert_eq!(labels(&main_menu(false))[1], vec![BTN_BELLS]);
    }

    #[test]
    fn classes_are_laid_out_four_per_row() {
        let classes: Vec<String> = ["5-А", "5-Б", "5-В", "6-А", "6-Б"]
            .into_iter()
            .map(String::from)
            .collect();
        let rows = labels(&classes_menu(&classes, false));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].len(), 4);
        assert_eq!(rows[1], vec!["● 6-Б"]);
        assert_eq!(rows[2], vec![BTN_BACK]);
    }

    #[test]
    fn day_buttons_carry_day_icon() {
        let rows = labels(&days_menu(false));
        assert_eq!(rows[0][0], "▶ Понеділок");
        assert_eq!(rows[2][0], "▶ П'ятниця");
    }
}
