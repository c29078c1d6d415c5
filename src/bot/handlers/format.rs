use crate::stats::StatsSnapshot;
use std::time::Duration;
use teloxide::utils::html::escape;

pub fn welcome_text(school_name: &str, is_donor: bool) -> String {
    let mut text = format!(
        "■ <b>Вітаю в боті {}!</b>\n\n\
         🤖 <b>AI Помічник</b> — відповіді на питання\n\
         📋 <b>Розклад</b> — уроки твого класу, 2 зміни\n\
         ⏰ <b>Дзвінки</b> — розклад дзвінків\n\
         💰 <b>Підтримка</b> — допомогти проєкту\n\n",
        escape(school_name)
    );
    if is_donor {
        text.push_str("⭐ <b>Дякуємо за підтримку!</b>");
    }
    text
}

pub fn help_text(is_admin: bool) -> String {
    let mut text = String::from(
        "Команди:\n\
         /start — головне меню\n\
         /help — ця довідка\n\
         /admin — адмін-панель (потрібен пароль)\n\
         /cancel — скасувати введення",
    );
    if is_admin {
        text.push_str("\n\nДля адміністраторів:\n/donor <telegram_id> — позначити донатера");
    }
    text
}

pub fn ai_intro_text(mode: &str) -> String {
    format!(
        "🤖 <b>Режим AI Помічника</b>\n\n\
         ▸ <b>Асистент</b> — загальні питання\n\
         ▸ <b>Програміст</b> — технічні питання\n\
         ▸ <b>Детально (1 раз)</b> — розгорнута відповідь\n\
         ▸ <b>Режими</b> — усі доступні режими\n\
         ▸ <b>Очистити</b> — скинути налаштування відповіді\n\n\
         Поточний режим: <code>{}</code>\n\
         <i>Просто напишіть ваше питання...</i>",
        escape(mode)
    )
}

pub fn admin_panel_text() -> &'static str {
    "⚙️ <b>Адмін-панель</b>\n\n\
     📊 Статистика реального часу\n\
     🔄 Оновити розклад\n\
     🔑 Змінити пароль\n\
     📢 Розсилка\n\
     👥 Активні користувачі\n\
     🧠 AI режими\n\n\
     <i>Адміни додаються через пароль або JSON-файл</i>"
}

pub fn format_uptime(uptime: Duration) -> String {
    let total_minutes = uptime.as_secs() / 60;
    format!("{} год {} хв", total_minutes / 60, total_minutes % 60)
}

pub fn stats_text(stats: &StatsSnapshot) -> String {
    format!(
        "⚙️ <b>Статистика в реальному часі</b>\n\n\
         🟢 <b>Онлайн зараз:</b> {}\n\
         📅 <b>Активні сьогодні:</b> {}\n\
         👥 <b>Всього користувачів:</b> {}\n\
         📊 <b>Всього команд:</b> {}\n\
         📋 <b>Переглядів розкладу:</b> {}\n\
         🤖 <b>AI запитів:</b> {}\n\
         ⏱ <b>Аптайм:</b> {}\n\
         💰 <b>Донатерів:</b> {}\n\n\
         <i>Дані в ОЗУ, скидаються при перезапуску</i>",
        stats.online_now,
        stats.active_today,
        stats.total_users,
        stats.commands_used,
        stats.schedule_views,
        stats.ai_queries,
        format_uptime(stats.uptime),
        stats.donors,
    )
}

pub fn active_users_text(online: &[i64], shown: usize, active_today: usize, total: u64) -> String {
    let list = if online.is_empty() {
        "• Немає активних".to_string()
    } else {
        online
            .iter()
            .take(shown)
            .map(|user_id| format!("• <code>{user_id}</code>"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "👥 <b>Активні користувачі</b>\n\n\
         🟢 <b>Зараз онлайн:</b> {}\n\
         {list}\n\n\
         📅 <b>Сьогодні:</b> {active_today}\n\
         👤 <b>Всього:</b> {total}",
        online.len()
    )
}

pub fn donate_text(user_id: i64) -> String {
    format!(
        "💰 <b>Підтримати розробку бота</b>\n\n\
         Бот працює безкоштовно 24/7, але сервери та API потребують коштів.\n\n\
         <b>Як допомогти:</b>\n\
         1️⃣ Перейдіть за посиланням або відскануйте QR-код\n\
         2️⃣ Зробіть донат від 50 грн\n\
         3️⃣ В описі до платежу вкажіть свій Telegram ID: <code>{user_id}</code>\n\
         4️⃣ Натисніть <b>«Я задонатив»</b>\n\n\
         <b>Після перевірки ви отримаєте:</b>\n\
         ⭐ Спеціальний статус\n\
         🚫 Зникнуть кнопки донату\n\n\
         <b>Ваш Telegram ID:</b> <code>{user_id}</code>"
    )
}

pub fn donation_notice_text(user_id: i64, username: Option<&str>) -> String {
    format!(
        "💰 <b>Новий донат!</b>\n\n\
         Користувач: <code>{user_id}</code>\n\
         Username: @{}\n\
         Після перевірки: <code>/donor {user_id}</code>",
        escape(username.unwrap_or("немає"))
    )
}

pub fn modes_list_text(modes: &[String], current: Option<&str>) -> String {
    if modes.is_empty() {
        return "📭 <b>Немає доступних режимів</b>".to_string();
    }
    let lines = modes
        .iter()
        .map(|mode| {
            if current == Some(mode.as_str()) {
                format!("▸ <b>{}</b> ✅", escape(mode))
            } else {
                format!("▸ {}", escape(mode))
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("📋 <b>Доступні режими:</b>\n\n{lines}")
}

pub fn broadcast_text(body: &str) -> String {
    format!("📢 <b>Оголошення адміністратора:</b>\n\n{}", escape(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_is_hours_and_minutes() {
        assert_eq!(format_uptime(Duration::from_secs(3 * 3600 + 25 * 60 + 59)), "3 год 25 хв");
        assert_eq!(format_uptime(Duration::from_secs(59)), "0 год 0 хв");
    }

    #[test]
    fn active_users_list_is_truncated() {
        let online: Vec<i64> = (1..=30).collect();
        let text = active_users_text(&online, 20, 31, 40);
        assert_eq!(text.matches("• <code>").count(), 20);
        assert!(text.contains("Зараз онлайн:</b> 30"));
        assert!(active_users_text(&[], 20, 0, 0).contains("Немає активних"));
    }

    #[test]
    fn broadcast_escapes_admin_text() {
        assert!(broadcast_text("<script>").ends_with("&lt;script&gt;"));
    }

    #[test]
    fn current_mode_is_marked() {
        let modes = vec!["assistant".to_string(), "programmer".to_string()];
        let text = modes_list_text(&modes, Some("programmer"));
        assert!(text.contains("▸ <b>programmer</b> ✅"));
        assert!(text.contains("▸ assistant"));
    }
}
