//! User-facing message text for lesson cards and change notifications.
//! Plain text, no markup — notifications must never fail on formatting.

use chrono::{Datelike, NaiveDate};

use lectio_core::normalize::normalize;
use lectio_core::types::{ChangeField, ChangeKind, Event};

/// Russian display names for upstream lesson kinds; unknown kinds pass
/// through unchanged.
fn kind_display(kind: &str) -> &str {
    match kind.to_lowercase().as_str() {
        "lecture" | "лекция" => "Лекция",
        "seminar" | "семинар" => "Семинар",
        "practical" | "практика" => "Практика",
        "laboratory" | "лабораторная" => "Лабораторная",
        "consultation" | "консультация" => "Консультация",
        "exam" | "экзамен" => "Экзамен",
        "credit" | "test" | "зачет" | "зачёт" => "Зачёт",
        "attestation" => "Аттестация",
        "project review" | "показ работ" => "Показ работ",
        "independent work" => "Самостоятельная работа",
        _ => kind,
    }
}

/// "Пн, 01.09.2026"; falls back to the raw string on parse failure.
fn display_date(date: &str) -> String {
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(d) => {
            let weekdays = ["Пн", "Вт", "Ср", "Чт", "Пт", "Сб", "Вс"];
            let weekday = weekdays[d.weekday().num_days_from_monday() as usize];
            format!("{weekday}, {}", d.format("%d.%m.%Y"))
        }
        Err(_) => date.to_string(),
    }
}

/// Strip seconds from "HH:MM:SS"-shaped times.
fn display_time(time: &str) -> &str {
    if time.matches(':').count() == 2 {
        time.get(..5).unwrap_or(time)
    } else {
        time
    }
}

/// One lesson as a card. Only fields that exist produce lines.
pub fn event_card(event: &Event) -> String {
    let n = normalize(event);
    let mut lines = Vec::new();

    if !n.date.is_empty() {
        lines.push(format!("📅 {}", display_date(&n.date)));
    }

    // Fall back to the raw interval when start/end are absent.
    let (start, end) = if n.time_start.is_empty() && n.time_interval.contains('–') {
        let mut parts = n.time_interval.splitn(2, '–');
        (
            parts.next().unwrap_or("").trim().to_string(),
            parts.next().unwrap_or("").trim().to_string(),
        )
    } else {
        (n.time_start.clone(), n.time_end.clone())
    };
    if !start.is_empty() {
        let mut time_line = format!("🕐 {}", display_time(&start));
        if !end.is_empty() {
            time_line.push_str(&format!(" – {}", display_time(&end)));
        }
        lines.push(time_line);
    }

    if !n.subject.is_empty() {
        lines.push(format!("📚 {}", n.subject));
    }
    if !n.kind.is_empty() {
        lines.push(format!("📝 {}", kind_display(&n.kind)));
    }
    if !n.educators.is_empty() {
        lines.push(format!("👨‍🏫 {}", n.educators.join(", ")));
    }
    if !n.locations.is_empty() {
        lines.push(format!("📍 {}", n.locations.join(", ")));
    }
    if n.is_online {
        lines.push(
            "💻 Занятие проводится с использованием коммуникационно-информационных технологий"
                .to_string(),
        );
    }

    lines.join("\n")
}

/// Full notification text: header, what-changed block, lesson card.
pub fn change_notification(
    kind: ChangeKind,
    event: &Event,
    changes: &[ChangeField],
    group_name: &str,
) -> String {
    let mut header = "🔔 Изменение в расписании".to_string();
    if !group_name.is_empty() {
        header.push(' ');
        header.push_str(group_name);
    }

    let what_changed = match kind {
        ChangeKind::Added => "➕ Добавлено занятие".to_string(),
        ChangeKind::Removed => "❌ Отменено занятие".to_string(),
        ChangeKind::Changed => {
            let parts: Vec<&str> = changes
                .iter()
                .map(|c| match c {
                    ChangeField::Time => "время",
                    ChangeField::Educator => "преподаватель",
                    ChangeField::Location => "аудитория",
                    ChangeField::Format => "формат",
                })
                .collect();
            format!("✏️ Изменено: {}", parts.join(", "))
        }
    };

    format!(
        "{header}\n\nЧто изменилось:\n• {what_changed}\n\n{}",
        event_card(event)
    )
}
