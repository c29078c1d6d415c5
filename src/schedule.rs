//! Розклад уроків і дзвінків: завантаження JSON, злиття з розкладом молодшої
//! школи та рендер тексту для Telegram (HTML).

use chrono::{DateTime, Local, Weekday};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use teloxide::utils::html::escape;

pub const SCHEDULE_ICON: &str = "📋";
pub const BELL_ICON: &str = "⏰";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchoolDay {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl SchoolDay {
    pub const ALL: [SchoolDay; 5] = [
        SchoolDay::Monday,
        SchoolDay::Tuesday,
        SchoolDay::Wednesday,
        SchoolDay::Thursday,
        SchoolDay::Friday,
    ];

    pub fn key(self) -> &'static str {
        match self {
            SchoolDay::Monday => "monday",
            SchoolDay::Tuesday => "tuesday",
            SchoolDay::Wednesday => "wednesday",
            SchoolDay::Thursday => "thursday",
            SchoolDay::Friday => "friday",
        }
    }

    pub fn name_ua(self) -> &'static str {
        match self {
            SchoolDay::Monday => "Понеділок",
            SchoolDay::Tuesday => "Вівторок",
            SchoolDay::Wednesday => "Середа",
            SchoolDay::Thursday => "Четвер",
            SchoolDay::Friday => "П'ятниця",
        }
    }

    pub fn from_name_ua(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|day| day.name_ua() == name)
    }

    /// Вихідні відображаються на понеділок.
    pub fn from_weekday(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Tue => SchoolDay::Tuesday,
            Weekday::Wed => SchoolDay::Wednesday,
            Weekday::Thu => SchoolDay::Thursday,
            Weekday::Fri => SchoolDay::Friday,
            Weekday::Mon | Weekday::Sat | Weekday::Sun => SchoolDay::Monday,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeDay {
    Today,
    Tomorrow,
}

impl RelativeDay {
    pub fn resolve(self, today: Weekday) -> SchoolDay {
        match self {
            RelativeDay::Today => SchoolDay::from_weekday(today),
            RelativeDay::Tomorrow => SchoolDay::from_weekday(today.succ()),
        }
    }

    fn label(self) -> &'static str {
        match self {
            RelativeDay::Today => "📆 <b>СЬОГОДНІ</b>",
            RelativeDay::Tomorrow => "📅 <b>ЗАВТРА</b>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    First,
    Second,
}

impl Shift {
    pub fn label(self) -> &'static str {
        match self {
            Shift::First => "🇦 І зміна",
            Shift::Second => "🇧 ІІ зміна",
        }
    }

    fn number(self) -> u8 {
        match self {
            Shift::First => 1,
            Shift::Second => 2,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleDocument {
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub schedule: BTreeMap<String, Vec<LessonSlot>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LessonSlot {
    #[serde(default)]
    pub lesson_number: Option<serde_json::Value>,
    #[serde(default)]
    pub classes: HashMap<String, ClassLesson>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassLesson {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub room: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BellsDocument {
    #[serde(default)]
    pub shift_1: Option<ShiftBells>,
    #[serde(default)]
    pub shift_2: Option<ShiftBells>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShiftBells {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lessons: Vec<BellLesson>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BellLesson {
    pub number: u32,
    pub start: String,
    pub end: String,
    #[serde(rename = "break", default)]
    pub break_minutes: u32,
}

#[derive(Debug, Clone)]
pub struct SchedulePaths {
    pub main: PathBuf,
    pub elementary: PathBuf,
    pub bells: PathBuf,
}

#[derive(Debug)]
pub struct ScheduleStore {
    paths: SchedulePaths,
    second_shift: HashSet<String>,
    document: ScheduleDocument,
    bells: BellsDocument,
    loaded_at: DateTime<Local>,
}

impl ScheduleStore {
    pub fn load(paths: SchedulePaths, second_shift_classes: &[String]) -> Self {
        let mut store = Self {
            paths,
            second_shift: second_shift_classes.iter().cloned().collect(),
            document: ScheduleDocument::default(),
            bells: BellsDocument::default(),
            loaded_at: Local::now(),
        };
        store.reload();
        store
    }

    pub fn from_documents(
        main: ScheduleDocument,
        elementary: ScheduleDocument,
        bells: BellsDocument,
        second_shift_classes: &[String],
    ) -> Self {
        Self {
            paths: SchedulePaths {
                main: PathBuf::new(),
                elementary: PathBuf::new(),
                bells: PathBuf::new(),
            },
            second_shift: second_shift_classes.iter().cloned().collect(),
            document: merge_documents(main, elementary),
            bells,
            loaded_at: Local::now(),
        }
    }

    /// Перечитує всі файли й замінює стан цілком. Повертає кількість класів.
    pub fn reload(&mut self) -> usize {
        let main: ScheduleDocument = read_json_or_default(&self.paths.main);
        let elementary: ScheduleDocument = read_json_or_default(&self.paths.elementary);
        self.bells = read_json_or_default(&self.paths.bells);
        self.document = merge_documents(main, elementary);
        self.loaded_at = Local::now();
        tracing::info!(
            classes = self.document.classes.len(),
            days = self.document.schedule.len(),
            "Schedule loaded"
        );
        self.document.classes.len()
    }

    pub fn classes(&self) -> &[String] {
        &self.document.classes
    }

    pub fn has_class(&self, class_name: &str) -> bool {
        self.document.classes.iter().any(|name| name == class_name)
    }

    pub fn loaded_at(&self) -> DateTime<Local> {
        self.loaded_at
    }

    fn is_configured(&self) -> bool {
        !self.document.classes.is_empty() || !self.document.schedule.is_empty()
    }

    pub fn shift_for_class(&self, class_name: &str) -> Shift {
        if self.second_shift.contains(class_name) {
            Shift::Second
        } else {
            Shift::First
        }
    }

    pub fn bells_text(&self, shift: Shift) -> String {
        let bells = match shift {
            Shift::First => self.bells.shift_1.as_ref(),
            Shift::Second => self.bells.shift_2.as_ref(),
        };
        let Some(bells) = bells.filter(|bells| !bells.lessons.is_empty()) else {
            return format!("{BELL_ICON} Розклад дзвінків не знайдено");
        };

        let title = bells
            .name
            .clone()
            .unwrap_or_else(|| format!("{} зміна", shift.number()));
        let mut out = format!("{BELL_ICON} <b>{}</b>\n\n", escape(&title));
        let last_index = bells.lessons.len() - 1;
        for (index, lesson) in bells.lessons.iter().enumerate() {
            let start = escape(&lesson.start);
            let end = escape(&lesson.end);
            if lesson.number == 0 {
                out.push_str(&format!("<b>0.</b> {start}–{end} (підготовчий)\n"));
            } else {
                out.push_str(&format!("<b>{}.</b> {start}–{end}\n", lesson.number));
            }
            if lesson.break_minutes > 0 && index < last_index {
                out.push_str(&format!("   └ перерва {} хв\n", lesson.break_minutes));
            }
        }
        out
    }

    /// Розклад класу на день. `None` у будь-якому аргументі дає повідомлення
    /// про невідомий клас або день.
    pub fn class_day_text(&self, class_name: Option<&str>, day: Option<SchoolDay>) -> String {
        let (Some(class_name), Some(day)) = (class_name, day) else {
            return "❓ Невідомий клас або день".to_string();
        };
        self.render_day(class_name, day, &escape(day.name_ua()))
    }

    pub fn relative_day_text(&self, class_name: &str, relative: RelativeDay, today: Weekday) -> String {
        let day = relative.resolve(today);
        let heading = format!("{} ({})", relative.label(), escape(day.name_ua()));
        self.render_day(class_name, day, &heading)
    }

    fn render_day(&self, class_name: &str, day: SchoolDay, heading: &str) -> String {
        if !self.is_configured() {
            return "❌ Розклад не знайдено".to_string();
        }
        if !self.has_class(class_name) {
            return "❓ Невідомий клас або день".to_string();
        }

        let lessons = self
            .document
            .schedule
            .get(day.key())
            .map(Vec::as_slice)
            .unwrap_or_default();
        if lessons.is_empty() {
            return format!("📭 На {} розкладу немає", escape(day.name_ua()));
        }

        let shift = self.shift_for_class(class_name);
        let mut out = format!(
            "{SCHEDULE_ICON} <b>{}</b> — {heading} ({})\n\n",
            escape(class_name),
            shift.label()
        );
        let lines = lesson_lines(lessons, class_name, "");
        if lines.is_empty() {
            out.push_str("Уроків немає\n");
        } else {
            out.push_str(&lines.join("\n"));
            out.push('\n');
        }
        out
    }

    pub fn full_week_text(&self, class_name: &str) -> String {
        if !self.is_configured() {
            return "❌ Розклад не знайдено".to_string();
        }
        if !self.has_class(class_name) {
            return "❓ Невідомий клас або день".to_string();
        }

        let shift = self.shift_for_class(class_name);
        let mut out = format!(
            "{SCHEDULE_ICON} <b>Повний розклад — {}</b> ({})\n\n",
            escape(class_name),
            shift.label()
        );
        for day in SchoolDay::ALL {
            out.push_str(&format!("▬▬▬ <b>{}</b> ▬▬▬\n", escape(day.name_ua())));
            let lessons = self
                .document
                .schedule
                .get(day.key())
                .map(Vec::as_slice)
                .unwrap_or_default();
            let lines = lesson_lines(lessons, class_name, "  ");
            if lines.is_empty() {
                out.push_str("  <i>Немає уроків</i>\n");
            } else {
                out.push_str(&lines.join("\n"));
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }
}

fn lesson_lines(lessons: &[LessonSlot], class_name: &str, indent: &str) -> Vec<String> {
    lessons
        .iter()
        .filter_map(|slot| {
            let lesson = slot.classes.get(class_name)?;
            let subject = lesson.subject.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
            let number = slot
                .lesson_number
                .as_ref()
                .map(json_scalar_label)
                .unwrap_or_else(|| "?".to_string());
            let room = lesson
                .room
                .as_ref()
                .map(json_scalar_label)
                .filter(|room| !room.is_empty())
                .map(|room| format!(" (каб. {})", escape(&room)))
                .unwrap_or_default();
            Some(format!(
                "{indent}<b>{}.</b> {}{room}",
                escape(&number),
                escape(subject)
            ))
        })
        .collect()
}

fn json_scalar_label(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.trim().to_string(),
        serde_json::Value::Number(number) => number.to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn merge_documents(mut main: ScheduleDocument, elementary: ScheduleDocument) -> ScheduleDocument {
    let mut seen: HashSet<String> = HashSet::new();
    let mut classes: Vec<String> = main
        .classes
        .drain(..)
        .chain(elementary.classes)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty() && seen.insert(name.clone()))
        .collect();
    classes.sort_by(|a, b| class_sort_key(a).cmp(&class_sort_key(b)));
    main.classes = classes;

    for (day, lessons) in elementary.schedule {
        main.schedule.entry(day).or_default().extend(lessons);
    }
    main
}

fn class_sort_key(class_name: &str) -> (u32, &str) {
    let grade = class_name
        .split('-')
        .next()
        .and_then(|prefix| prefix.trim().parse::<u32>().ok())
        .unwrap_or(u32::MAX);
    (grade, class_name)
}

fn read_json_or_default<T>(path: &Path) -> T
where
    T: for<'de> Deserialize<'de> + Default,
{
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            tracing::warn!(path = %path.display(), error = %error, "Schedule file unavailable");
            return T::default();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(document) => document,
        Err(error) => {
            tracing::warn!(path = %path.display(), error = %error, "Schedule file is malformed");
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(value: serde_json::Value) -> ScheduleDocument {
        serde_json::from_value(value).unwrap()
    }

    fn sample_store() -> ScheduleStore {
        let main = document(json!({
            "classes": ["10-А", "5-Б", "7-А"],
            "schedule": {
                "monday": [
                    {"lesson_number": 1, "classes": {"5-Б": {"subject": "Математика", "room": 12}}},
                    {"lesson_number": 2, "classes": {"5-Б": {"subject": "Історія", "room": ""}, "7-А": {"subject": "Фізика", "room": "3"}}}
                ],
                "tuesday": [],
                "wednesday": [
                    {"lesson_number": 1, "classes": {"7-А": {"subject": "Хімія"}}}
                ]
            }
        }));
        let elementary = document(json!({
            "classes": ["2-А", "5-Б"],
            "schedule": {
                "monday": [{"lesson_number": 1, "classes": {"2-А": {"subject": "Читання", "room": 1}}}],
                "friday": [{"lesson_number": 1, "classes": {"2-А": {"subject": "Малювання"}}}]
            }
        }));
        let bells: BellsDocument = serde_json::from_value(json!({
            "shift_1": {
                "name": "І зміна",
                "lessons": [
                    {"number": 0, "start": "7:45", "end": "8:15", "break": 5},
                    {"number": 1, "start": "8:20", "end": "9:05", "break": 10},
                    {"number": 2, "start": "9:15", "end": "10:00", "break": 15}
                ]
            }
        }))
        .unwrap();
        ScheduleStore::from_documents(main, elementary, bells, &["7-А".to_string()])
    }

    #[test]
    fn merge_unions_and_sorts_classes_by_grade() {
        let store = sample_store();
        assert_eq!(store.classes(), ["2-А", "5-Б", "7-А", "10-А"]);
    }

    #[test]
    fn merge_appends_elementary_lessons_per_day() {
        let store = sample_store();
        let monday = store.class_day_text(Some("2-А"), Some(SchoolDay::Monday));
        assert!(monday.contains("Читання"));
        let friday = store.class_day_text(Some("2-А"), Some(SchoolDay::Friday));
        assert!(friday.contains("Малювання"));
    }

    #[test]
    fn class_day_renders_subjects_and_rooms() {
        let store = sample_store();
        let text = store.class_day_text(Some("5-Б"), Some(SchoolDay::Monday));
        assert!(text.contains("<b>5-Б</b> — Понеділок"));
        assert!(text.contains("<b>1.</b> Математика (каб. 12)"));
        assert!(text.contains("<b>2.</b> Історія\n"));
        assert!(text.contains(Shift::First.label()));
    }

    #[test]
    fn empty_day_reports_no_lessons() {
        let store = sample_store();
        let text = store.class_day_text(Some("5-Б"), Some(SchoolDay::Tuesday));
        assert_eq!(text, "📭 На Вівторок розкладу немає");
        let missing_day = store.class_day_text(Some("5-Б"), Some(SchoolDay::Thursday));
        assert_eq!(missing_day, "📭 На Четвер розкладу немає");
    }

    #[test]
    fn absent_class_or_day_reports_unknown() {
        let store = sample_store();
        assert_eq!(
            store.class_day_text(None, Some(SchoolDay::Monday)),
            "❓ Невідомий клас або день"
        );
        assert_eq!(store.class_day_text(Some("5-Б"), None), "❓ Невідомий клас або день");
        assert_eq!(
            store.class_day_text(Some("99-Я"), Some(SchoolDay::Monday)),
            "❓ Невідомий клас або день"
        );
    }

    #[test]
    fn day_without_lessons_for_class_says_so() {
        let store = sample_store();
        let text = store.class_day_text(Some("10-А"), Some(SchoolDay::Monday));
        assert!(text.ends_with("Уроків немає\n"));
    }

    #[test]
    fn unconfigured_store_reports_missing_schedule() {
        let store = ScheduleStore::from_documents(
            ScheduleDocument::default(),
            ScheduleDocument::default(),
            BellsDocument::default(),
            &[],
        );
        assert_eq!(
            store.class_day_text(Some("5-Б"), Some(SchoolDay::Monday)),
            "❌ Розклад не знайдено"
        );
        assert_eq!(store.full_week_text("5-Б"), "❌ Розклад не знайдено");
    }

    #[test]
    fn weekend_maps_to_monday() {
        assert_eq!(RelativeDay::Today.resolve(Weekday::Sat), SchoolDay::Monday);
        assert_eq!(RelativeDay::Today.resolve(Weekday::Sun), SchoolDay::Monday);
        assert_eq!(RelativeDay::Tomorrow.resolve(Weekday::Fri), SchoolDay::Monday);
        assert_eq!(RelativeDay::Tomorrow.resolve(Weekday::Sun), SchoolDay::Monday);
        assert_eq!(RelativeDay::Tomorrow.resolve(Weekday::Wed), SchoolDay::Thursday);
    }

    #[test]
    fn relative_day_replaces_heading() {
        let store = sample_store();
        let text = store.relative_day_text("7-А", RelativeDay::Tomorrow, Weekday::Tue);
        assert!(text.contains("📅 <b>ЗАВТРА</b> (Середа)"));
        assert!(text.contains("Хімія"));
        assert!(text.contains(Shift::Second.label()));
    }

    #[test]
    fn full_week_lists_every_day() {
        let store = sample_store();
        let text = store.full_week_text("7-А");
        for day in SchoolDay::ALL {
            assert!(text.contains(day.name_ua()));
        }
        assert!(text.contains("  <b>2.</b> Фізика (каб. 3)"));
        assert_eq!(text.matches("<i>Немає уроків</i>").count(), 3);
    }

    #[test]
    fn bells_mark_preparatory_lesson_and_skip_last_break() {
        let store = sample_store();
        let text = store.bells_text(Shift::First);
        assert!(text.starts_with("⏰ <b>І зміна</b>"));
        assert!(text.contains("<b>0.</b> 7:45–8:15 (підготовчий)"));
        assert!(text.contains("перерва 10 хв"));
        assert!(!text.contains("перерва 15 хв"));
        assert_eq!(store.bells_text(Shift::Second), "⏰ Розклад дзвінків не знайдено");
    }

    #[test]
    fn missing_files_load_as_empty_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScheduleStore::load(
            SchedulePaths {
                main: dir.path().join("main.json"),
                elementary: dir.path().join("elementary.json"),
                bells: dir.path().join("bells.json"),
            },
            &[],
        );
        assert!(store.classes().is_empty());
    }

    #[test]
    fn reload_replaces_state_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("main.json");
        std::fs::write(&main, r#"{"classes": ["5-А"], "schedule": {}}"#).unwrap();
        let mut store = ScheduleStore::load(
            SchedulePaths {
                main: main.clone(),
                elementary: dir.path().join("elementary.json"),
                bells: dir.path().join("bells.json"),
            },
            &[],
        );
        assert_eq!(store.classes(), ["5-А"]);

        std::fs::write(&main, r#"{"classes": ["6-А", "6-Б"], "schedule": {}}"#).unwrap();
        assert_eq!(store.reload(), 2);
        assert!(!store.has_class("5-А"));
    }

    #[test]
    fn day_names_round_trip_through_lookup() {
        assert_eq!(SchoolDay::from_name_ua("П'ятниця"), Some(SchoolDay::Friday));
        assert_eq!(SchoolDay::from_name_ua(" Середа "), Some(SchoolDay::Wednesday));
        assert_eq!(SchoolDay::from_name_ua("Субота"), None);
    }
}
