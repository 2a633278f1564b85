//! Message rendering for the line-based terminal view

use chrono::Local;
use crossterm::style::Color;
use talk_core::constants::users::SYSTEM_USER_ID;
use talk_core::{Message, Session};

/// Resolve a display colour (`#rgb`, `#rrggbb`, or a terminal colour name)
pub fn parse_color(value: &str) -> Color {
    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex).unwrap_or(Color::Reset);
    }
    Color::try_from(value.to_ascii_lowercase().as_str()).unwrap_or(Color::Reset)
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.is_ascii() {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        6 => Some(Color::Rgb {
            r: channel(&hex[0..2])?,
            g: channel(&hex[2..4])?,
            b: channel(&hex[4..6])?,
        }),
        3 => {
            let mut digits = hex.chars().map(|c| c.to_digit(16));
            let mut next = || digits.next().flatten().map(|d| (d * 17) as u8);
            Some(Color::Rgb {
                r: next()?,
                g: next()?,
                b: next()?,
            })
        }
        _ => None,
    }
}

/// Label and colour for a message's author
pub fn sender(message: &Message, session: &Session) -> (String, Color) {
    let display = session.display().cloned().unwrap_or_default();

    if message.is_command {
        return (">".to_string(), parse_color(&display.cmd_color));
    }
    if message.sender_id == SYSTEM_USER_ID {
        return ("System".to_string(), parse_color(&display.sys_color));
    }

    let me = session.current_user();
    if message.sender_id == me.user_id {
        return (me.username, parse_color(&display.my_color));
    }

    match session.users().and_then(|users| users.get(&message.sender_id)) {
        Some(user) => (user.username.clone(), parse_color(&user.color)),
        None => (message.sender_id.clone(), Color::Reset),
    }
}

/// Text body prefixed with the local time and the sender label
pub fn format_line(label: &str, message: &Message) -> String {
    let time = message.timestamp.with_timezone(&Local).format("%H:%M:%S");
    format!("[{time}] {label}: {}", message.text)
}

/// Uncoloured line, for non-interactive output
pub fn plain_line(message: &Message, session: &Session) -> String {
    let (label, _) = sender(message, session);
    format_line(&label, message)
}

/// Raw mode does not translate `\n`
pub fn raw_newlines(text: &str) -> String {
    text.replace('\n', "\r\n")
}
