//! Stateless keyboard rendering and callback payload codec.
//!
//! A tap resolves through the payload's encoded index straight into the
//! option list stored for that message — no re-ranking ever happens on a
//! tap. Payloads stay well under Telegram's 64-byte callback-data cap.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId};

use crate::bot::cb;
use crate::extract::{AudioProfile, FormatOption};
use crate::jobs::OptionKind;

/// Option buttons per keyboard row
pub const OPTIONS_PER_ROW: usize = 3;

/// A parsed callback payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// Category chooser tap: show the audio or video option list
    Category { kind: OptionKind, message: MessageId },
    /// Option tap: `{kind, originating message id, option index}`
    Pick {
        kind: OptionKind,
        message: MessageId,
        index: usize,
    },
    /// Back to the category chooser
    Back { message: MessageId },
    /// Cancel the job for this message
    Cancel { message: MessageId },
    /// Settings menu tap
    Settings(SettingsAction),
}

/// Settings menu taps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsAction {
    MaxHeight(u32),
    AudioProfile(AudioProfile),
    Close,
}

/// Parses a raw callback data string.
///
/// Unknown or malformed payloads return `None`; the caller answers the
/// query with a soft "no longer valid" response instead of crashing.
pub fn parse_callback(data: &str) -> Option<CallbackAction> {
    let mut parts = data.split(':');
    match parts.next()? {
        "cat" => {
            let kind = OptionKind::parse(parts.next()?)?;
            let message = MessageId(parts.next()?.parse().ok()?);
            Some(CallbackAction::Category { kind, message })
        }
        "pick" => {
            let kind = OptionKind::parse(parts.next()?)?;
            let message = MessageId(parts.next()?.parse().ok()?);
            let index = parts.next()?.parse().ok()?;
            Some(CallbackAction::Pick { kind, message, index })
        }
        "back" => {
            let message = MessageId(parts.next()?.parse().ok()?);
            Some(CallbackAction::Back { message })
        }
        "cancel" => {
            let message = MessageId(parts.next()?.parse().ok()?);
            Some(CallbackAction::Cancel { message })
        }
        "set" => match parts.next()? {
            "res" => Some(CallbackAction::Settings(SettingsAction::MaxHeight(
                parts.next()?.parse().ok()?,
            ))),
            "ap" => Some(CallbackAction::Settings(SettingsAction::AudioProfile(
                AudioProfile::parse(parts.next()?),
            ))),
            "close" => Some(CallbackAction::Settings(SettingsAction::Close)),
            _ => None,
        },
        _ => None,
    }
}

/// The two-category chooser shown right after a successful probe.
pub fn category_keyboard(message: MessageId) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            cb("🎬 Video", format!("cat:v:{}", message.0)),
            cb("🎵 Audio", format!("cat:a:{}", message.0)),
        ],
        vec![cb("❌ Cancel", format!("cancel:{}", message.0))],
    ])
}

/// Renders an option list as a grid of buttons, three per row, with a
/// back control and a trailing cancel control.
pub fn options_keyboard(kind: OptionKind, message: MessageId, options: &[FormatOption]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = Vec::new();
    let mut row: Vec<InlineKeyboardButton> = Vec::new();

    for (index, option) in options.iter().enumerate() {
        row.push(cb(
            option.label.clone(),
            format!("pick:{}:{}:{}", kind.as_str(), message.0, index),
        ));
        if row.len() == OPTIONS_PER_ROW {
            rows.push(std::mem::take(&mut row));
        }
    }
    if !row.is_empty() {
        rows.push(row);
    }

    rows.push(vec![
        cb("⬅️ Back", format!("back:{}", message.0)),
        cb("❌ Cancel", format!("cancel:{}", message.0)),
    ]);

    InlineKeyboardMarkup::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn option(label: &str) -> FormatOption {
        FormatOption {
            selector: "22".to_string(),
            label: label.to_string(),
            est_size: 0,
        }
    }

    // ==================== payload codec tests ====================

    #[test]
    fn test_parse_pick_payload() {
        assert_eq!(
            parse_callback("pick:v:123:4"),
            Some(CallbackAction::Pick {
                kind: OptionKind::Video,
                message: MessageId(123),
                index: 4
            })
        );
    }

    #[test]
    fn test_parse_category_and_cancel() {
        assert_eq!(
            parse_callback("cat:a:55"),
            Some(CallbackAction::Category {
                kind: OptionKind::Audio,
                message: MessageId(55)
            })
        );
        assert_eq!(parse_callback("cancel:55"), Some(CallbackAction::Cancel { message: MessageId(55) }));
        assert_eq!(parse_callback("back:55"), Some(CallbackAction::Back { message: MessageId(55) }));
    }

    #[test]
    fn test_parse_settings_payloads() {
        assert_eq!(
            parse_callback("set:res:720"),
            Some(CallbackAction::Settings(SettingsAction::MaxHeight(720)))
        );
        assert_eq!(
            parse_callback("set:ap:mp3-320"),
            Some(CallbackAction::Settings(SettingsAction::AudioProfile(AudioProfile::Mp3At320)))
        );
        assert_eq!(parse_callback("set:close"), Some(CallbackAction::Settings(SettingsAction::Close)));
    }

    #[test]
    fn test_parse_malformed_payloads() {
        assert_eq!(parse_callback(""), None);
        assert_eq!(parse_callback("pick"), None);
        assert_eq!(parse_callback("pick:x:1:2"), None);
        assert_eq!(parse_callback("pick:v:notanumber:2"), None);
        assert_eq!(parse_callback("dl:mp4:720p:abc"), None);
    }

    // ==================== keyboard layout tests ====================

    #[test]
    fn test_options_keyboard_three_per_row() {
        let options: Vec<FormatOption> = (0..7).map(|i| option(&format!("opt{}", i))).collect();
        let kb = options_keyboard(OptionKind::Video, MessageId(1), &options);
        // 3 + 3 + 1 option rows, then the back/cancel row
        assert_eq!(kb.inline_keyboard.len(), 4);
        assert_eq!(kb.inline_keyboard[0].len(), 3);
        assert_eq!(kb.inline_keyboard[2].len(), 1);
        assert_eq!(kb.inline_keyboard[3].len(), 2);
    }

    #[test]
    fn test_options_keyboard_payload_indices_match_positions() {
        let options: Vec<FormatOption> = (0..4).map(|i| option(&format!("opt{}", i))).collect();
        let kb = options_keyboard(OptionKind::Audio, MessageId(9), &options);
        let flat: Vec<&InlineKeyboardButton> = kb.inline_keyboard.iter().flatten().collect();
        for (i, button) in flat.iter().take(4).enumerate() {
            match &button.kind {
                teloxide::types::InlineKeyboardButtonKind::CallbackData(data) => {
                    assert_eq!(data, &format!("pick:a:9:{}", i));
                }
                other => panic!("unexpected button kind: {:?}", other),
            }
        }
    }

    #[test]
    fn test_category_keyboard_has_cancel() {
        let kb = category_keyboard(MessageId(3));
        assert_eq!(kb.inline_keyboard.len(), 2);
        assert_eq!(kb.inline_keyboard[1].len(), 1);
    }

    #[test]
    fn test_payloads_fit_callback_data_limit() {
        // Telegram rejects callback data over 64 bytes
        let data = format!("pick:v:{}:{}", i32::MAX, usize::MAX);
        assert!(data.len() <= 64, "payload too long: {}", data.len());
    }
}
