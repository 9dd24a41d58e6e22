//! Rate-limit notice parsing.
//!
//! Pure functions, no I/O. The agent reports a session rate limit as an
//! API-error assistant message shaped like `Session limit reached ∙ resets
//! 7pm`; we extract the 12-hour token and turn it into an absolute resume
//! instant one minute past the reset boundary.

use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use crate::session::AssistantEntry;

/// A reset time of day in 24-hour form. Minutes are always zero; the
/// notice only carries whole hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetTime {
    pub hour: u32,
    pub minute: u32,
}

fn message_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // The separator between "reached" and "resets" varies across agent
    // versions (∙, ·, -, |, or plain whitespace); the keywords and the
    // token do not.
    RE.get_or_init(|| {
        Regex::new(r"(?i)Session limit reached\s*[∙·|-]*\s*resets\s+(\d{1,2}(?:am|pm))").unwrap()
    })
}

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(\d{1,2})(am|pm)$").unwrap())
}

/// Extract the reset-time token (e.g. `"7pm"`) from an assistant entry.
///
/// Returns `None` unless the entry is flagged as an API error message and
/// some text part of it matches the rate-limit notice.
pub fn parse_rate_limit_message(entry: &AssistantEntry) -> Option<String> {
    if !entry.is_api_error_message {
        return None;
    }

    entry.text_parts().find_map(extract_reset_token)
}

fn extract_reset_token(text: &str) -> Option<String> {
    message_regex()
        .captures(text)
        .map(|caps| caps[1].to_string())
}

/// Convert a 12-hour token to 24-hour time: `12am → 0`, `12pm → 12`,
/// anything outside `1..=12` is invalid.
pub fn parse_reset_time(token: &str) -> Option<ResetTime> {
    let caps = token_regex().captures(token)?;
    let hour: u32 = caps[1].parse().ok()?;
    if !(1..=12).contains(&hour) {
        return None;
    }

    let pm = caps[2].eq_ignore_ascii_case("pm");
    let hour24 = match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, false) => h,
        (h, true) => h + 12,
    };

    Some(ResetTime {
        hour: hour24,
        minute: 0,
    })
}

/// Resolve `token` against `now` (UTC): the soonest instant at that time
/// of day that is still ahead of `now`, plus a one-minute buffer past the
/// reset boundary.
pub fn calculate_resume_datetime(token: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let reset = parse_reset_time(token)?;

    let mut reset_at = now
        .date_naive()
        .and_hms_opt(reset.hour, reset.minute, 0)?
        .and_utc();
    if reset_at <= now {
        reset_at += Duration::days(1);
    }

    Some(reset_at + Duration::minutes(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ContentBlock, EntryMessage, MessageContent};
    use chrono::SecondsFormat;
    use proptest::prelude::*;

    fn api_error_entry(text: &str) -> AssistantEntry {
        AssistantEntry {
            is_api_error_message: true,
            message: EntryMessage {
                content: MessageContent::Blocks(vec![ContentBlock::Text {
                    text: text.to_string(),
                }]),
            },
        }
    }

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_rate_limit_message_extracts_token() {
        let entry = api_error_entry("Session limit reached ∙ resets 7pm");
        assert_eq!(parse_rate_limit_message(&entry), Some("7pm".to_string()));
    }

    #[test]
    fn test_parse_rate_limit_message_requires_api_error_flag() {
        let mut entry = api_error_entry("Session limit reached ∙ resets 7pm");
        entry.is_api_error_message = false;
        assert_eq!(parse_rate_limit_message(&entry), None);
    }

    #[test]
    fn test_parse_rate_limit_message_string_content() {
        let entry = AssistantEntry {
            is_api_error_message: true,
            message: EntryMessage {
                content: MessageContent::Text(
                    "Session limit reached ∙ resets 12am".to_string(),
                ),
            },
        };
        assert_eq!(parse_rate_limit_message(&entry), Some("12am".to_string()));
    }

    #[test]
    fn test_parse_rate_limit_message_separator_variants() {
        for text in [
            "Session limit reached ∙ resets 5am",
            "Session limit reached · resets 5am",
            "Session limit reached - resets 5am",
            "Session limit reached resets 5am",
        ] {
            let entry = api_error_entry(text);
            assert_eq!(
                parse_rate_limit_message(&entry),
                Some("5am".to_string()),
                "failed for {text:?}"
            );
        }
    }

    #[test]
    fn test_parse_rate_limit_message_unrelated_text() {
        let entry = api_error_entry("API error: overloaded, retry later");
        assert_eq!(parse_rate_limit_message(&entry), None);
    }

    #[test]
    fn test_parse_reset_time_boundaries() {
        assert_eq!(
            parse_reset_time("12am"),
            Some(ResetTime { hour: 0, minute: 0 })
        );
        assert_eq!(
            parse_reset_time("12pm"),
            Some(ResetTime {
                hour: 12,
                minute: 0
            })
        );
        assert_eq!(
            parse_reset_time("7pm"),
            Some(ResetTime {
                hour: 19,
                minute: 0
            })
        );
        assert_eq!(
            parse_reset_time("5am"),
            Some(ResetTime { hour: 5, minute: 0 })
        );
    }

    #[test]
    fn test_parse_reset_time_rejects_invalid() {
        assert_eq!(parse_reset_time("0am"), None);
        assert_eq!(parse_reset_time("13pm"), None);
        assert_eq!(parse_reset_time("99am"), None);
        assert_eq!(parse_reset_time("7"), None);
        assert_eq!(parse_reset_time("pm"), None);
        assert_eq!(parse_reset_time("7:30pm"), None);
    }

    #[test]
    fn test_parse_reset_time_round_trips_all_tokens() {
        for hour in 1..=12u32 {
            for (suffix, pm) in [("am", false), ("pm", true)] {
                let token = format!("{hour}{suffix}");
                let parsed = parse_reset_time(&token).unwrap();

                // Reconstruct the 12-hour label from the 24-hour result
                let (label_hour, label_pm) = match parsed.hour {
                    0 => (12, false),
                    12 => (12, true),
                    h if h < 12 => (h, false),
                    h => (h - 12, true),
                };
                assert_eq!((label_hour, label_pm), (hour, pm), "token {token}");
                assert_eq!(parsed.minute, 0);
            }
        }
    }

    #[test]
    fn test_resume_same_day_when_reset_ahead() {
        let now = utc("2025-11-15T10:00:00Z");
        let resume = calculate_resume_datetime("7pm", now).unwrap();
        assert_eq!(
            resume.to_rfc3339_opts(SecondsFormat::Millis, true),
            "2025-11-15T19:01:00.000Z"
        );
    }

    #[test]
    fn test_resume_rolls_to_next_day_when_past() {
        let now = utc("2025-11-15T20:00:00Z");
        let resume = calculate_resume_datetime("7pm", now).unwrap();
        assert_eq!(
            resume.to_rfc3339_opts(SecondsFormat::Millis, true),
            "2025-11-16T19:01:00.000Z"
        );
    }

    #[test]
    fn test_resume_rolls_when_reset_equals_now() {
        let now = utc("2025-11-15T19:00:00Z");
        let resume = calculate_resume_datetime("7pm", now).unwrap();
        assert_eq!(resume, utc("2025-11-16T19:01:00Z"));
    }

    #[test]
    fn test_resume_unparsable_token() {
        let now = utc("2025-11-15T10:00:00Z");
        assert_eq!(calculate_resume_datetime("25pm", now), None);
        assert_eq!(calculate_resume_datetime("soon", now), None);
    }

    proptest! {
        /// For every valid token the resume instant is exactly one minute
        /// past a reset boundary that is the soonest such boundary >= now.
        #[test]
        fn prop_resume_is_soonest_reset_plus_one_minute(
            hour in 1u32..=12,
            pm in any::<bool>(),
            offset_secs in 0i64..86_400,
        ) {
            let token = format!("{hour}{}", if pm { "pm" } else { "am" });
            let now = utc("2025-06-01T00:00:00Z") + Duration::seconds(offset_secs);

            let resume = calculate_resume_datetime(&token, now).unwrap();
            let reset_at = resume - Duration::minutes(1);

            // Strictly ahead of now, by at most one day
            prop_assert!(reset_at > now);
            prop_assert!(reset_at <= now + Duration::days(1));

            // Lands on the requested time of day
            let parsed = parse_reset_time(&token).unwrap();
            prop_assert_eq!(
                reset_at.format("%H:%M:%S").to_string(),
                format!("{:02}:00:00", parsed.hour)
            );
        }
    }
}
