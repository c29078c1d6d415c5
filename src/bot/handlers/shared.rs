use crate::config::UiConfig;
use anyhow::anyhow;
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;
use std::io::Cursor;
use std::time::Duration;
use teloxide::{ApiError, RequestError};
use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode, ReplyMarkup};

pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

const LOADING_FRAMES: [&str; 4] = ["⏳", "⌛", "⏳", "⌛"];

/// Надсилає HTML-повідомлення. Якщо Telegram відхиляє розмітку, повторює
/// відправку простим текстом без тегів.
pub async fn send_html(
    bot: &Bot,
    chat_id: ChatId,
    text: &str,
    markup: Option<ReplyMarkup>,
) -> Result<Message, RequestError> {
    let mut request = bot.send_message(chat_id, text).parse_mode(ParseMode::Html);
    if let Some(markup) = markup.clone() {
        request = request.reply_markup(markup);
    }
    match request.await {
        Ok(message) => Ok(message),
        Err(error) if is_markup_rejection(&error) => {
            tracing::warn!(
                chat_id = chat_id.0,
                error = %error,
                "HTML rejected by Telegram, resending as plain text"
            );
            let mut plain = bot.send_message(chat_id, strip_html(text));
            if let Some(markup) = markup {
                plain = plain.reply_markup(markup);
            }
            plain.await
        }
        Err(error) => Err(error),
    }
}

/// Повторна відправка простим текстом має сенс лише тоді, коли Telegram
/// не зміг розібрати розмітку.
pub fn is_markup_rejection(error: &RequestError) -> bool {
    matches!(error, RequestError::Api(ApiError::CantParseEntities(_)))
}

/// Розбиває довгий текст на частини; клавіатура чіпляється до останньої.
pub async fn send_long(
    bot: &Bot,
    chat_id: ChatId,
    text: &str,
    html: bool,
    markup: Option<ReplyMarkup>,
    max_len: usize,
) -> Result<(), RequestError> {
    let chunks = split_chunks(text, max_len);
    let last = chunks.len().saturating_sub(1);
    for (index, chunk) in chunks.iter().enumerate() {
        let chunk_markup = if index == last { markup.clone() } else { None };
        if html {
            send_html(bot, chat_id, chunk, chunk_markup).await?;
        } else {
            let mut request = bot.send_message(chat_id, chunk.as_str());
            if let Some(markup) = chunk_markup {
                request = request.reply_markup(markup);
            }
            request.await?;
        }
    }
    Ok(())
}

/// Ріже по межах рядків, не перевищуючи `max_len` символів на частину.
pub fn split_chunks(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > max_len && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > max_len {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(max_len) {
                if piece.len() == max_len {
                    chunks.push(piece.iter().collect());
                } else {
                    current = piece.iter().collect();
                    current_len = piece.len();
                }
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}

pub fn strip_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.replace("&lt;", "<").replace("&gt;", ">").replace("&amp;", "&")
}

pub fn as_markup(markup: impl Into<ReplyMarkup>) -> Option<ReplyMarkup> {
    Some(markup.into())
}

pub async fn delete_quietly(bot: &Bot, chat_id: ChatId, message_id: MessageId) {
    if let Err(error) = bot.delete_message(chat_id, message_id).await {
        tracing::debug!(chat_id = chat_id.0, error = %error, "Could not delete message");
    }
}

/// Одне повідомлення з пісочним годинником, яке редагується і видаляється.
pub async fn loading_animation(bot: &Bot, chat_id: ChatId, label: &str, ui: &UiConfig) {
    if !ui.loading_animation {
        return;
    }
    let message = match bot
        .send_message(chat_id, format!("{} {label}...", LOADING_FRAMES[0]))
        .await
    {
        Ok(message) => message,
        Err(error) => {
            tracing::debug!(chat_id = chat_id.0, error = %error, "Loading message failed");
            return;
        }
    };
    let frame_delay = Duration::from_millis(ui.loading_frame_ms);
    for frame in LOADING_FRAMES.iter().skip(1) {
        tokio::time::sleep(frame_delay).await;
        if let Err(error) = bot
            .edit_message_text(chat_id, message.id, format!("{frame} {label}..."))
            .await
        {
            tracing::debug!(chat_id = chat_id.0, error = %error, "Loading frame edit failed");
        }
    }
    delete_quietly(bot, chat_id, message.id).await;
}

pub fn callback_message_target(q: &CallbackQuery) -> Option<(ChatId, MessageId)> {
    q.message.as_ref().map(|msg| (msg.chat().id, msg.id()))
}

pub fn callback_prefix_filter(prefix: &'static str) -> impl Fn(CallbackQuery) -> Option<CallbackQuery> {
    move |q: CallbackQuery| {
        if q.data.as_deref().is_some_and(|payload| payload.starts_with(prefix)) {
            Some(q)
        } else {
            None
        }
    }
}

pub fn callback_payload<'a>(q: &'a CallbackQuery, prefix: &str) -> Result<&'a str, anyhow::Error> {
    q.data
        .as_deref()
        .and_then(|data| data.strip_prefix(prefix))
        .filter(|payload| !payload.is_empty())
        .ok_or_else(|| anyhow!("Некоректний callback payload"))
}

/// Посилання на банку з Telegram ID користувача в коментарі до платежу.
pub fn donation_link(base: &str, user_id: i64) -> Option<reqwest::Url> {
    let base = base.trim();
    if base.is_empty() {
        return None;
    }
    let separator = if base.contains('?') { '&' } else { '?' };
    let comment = format!("Telegram ID {user_id}");
    let link = format!("{base}{separator}t={}", urlencoding::encode(&comment));
    match reqwest::Url::parse(&link) {
        Ok(url) => Some(url),
        Err(error) => {
            tracing::warn!(link = %link, error = %error, "Donation URL is invalid");
            None
        }
    }
}

pub fn build_qr_png_bytes(payload: &str) -> Result<Vec<u8>, anyhow::Error> {
    let qr = QrCode::new(payload.as_bytes())?;
    let image = qr
        .render::<Luma<u8>>()
        .quiet_zone(true)
        .min_dimensions(512, 512)
        .build();
    let mut bytes = Vec::new();
    {
        let mut cursor = Cursor::new(&mut bytes);
        DynamicImage::ImageLuma8(image).write_to(&mut cursor, ImageFormat::Png)?;
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        assert_eq!(split_chunks("привіт\nсвіт", 100), vec!["привіт\nсвіт"]);
        assert_eq!(split_chunks("", 100), vec![""]);
    }

    #[test]
    fn chunks_break_on_lines_and_respect_limit() {
        let text = "аааа\nбббб\nвввв\n";
        let chunks = split_chunks(text, 10);
        assert_eq!(chunks, vec!["аааа\nбббб\n", "вввв\n"]);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 10));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn overlong_line_is_cut_by_chars() {
        let text = format!("{}\nкінець", "я".repeat(25));
        let chunks = split_chunks(&text, 10);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 10));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn html_is_stripped_for_fallback() {
        assert_eq!(
            strip_html("<b>5-А</b> — <i>Понеділок</i> &lt;3 &amp; більше"),
            "5-А — Понеділок <3 & більше"
        );
    }

    #[test]
    fn only_entity_errors_trigger_plain_fallback() {
        let entities = RequestError::Api(ApiError::CantParseEntities(
            "Bad Request: can't parse entities: Unsupported start tag".to_string(),
        ));
        assert!(is_markup_rejection(&entities));
        assert!(!is_markup_rejection(&RequestError::Api(ApiError::BotBlocked)));
        assert!(!is_markup_rejection(&RequestError::Api(ApiError::ChatNotFound)));
        assert!(!is_markup_rejection(&RequestError::Api(ApiError::Unknown(
            "Bad Request: reply markup is invalid".to_string()
        ))));
    }

    #[test]
    fn donation_link_carries_user_id_comment() {
        let url = donation_link("https://send.monobank.ua/jar/96YBXc4K6g", 42).unwrap();
        assert_eq!(url.query(), Some("t=Telegram%20ID%2042"));
        let with_query = donation_link("https://example.com/jar?a=50", 1).unwrap();
        assert_eq!(with_query.query(), Some("a=50&t=Telegram%20ID%201"));
        assert!(donation_link("  ", 1).is_none());
    }

    #[test]
    fn qr_code_is_png() {
        let bytes = build_qr_png_bytes("https://send.monobank.ua/jar/96YBXc4K6g").unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}
