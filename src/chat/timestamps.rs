use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

fn timestamp_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[(\d{1,2}):(\d{2})\]").expect("Invalid regex"))
}

/// A piece of bot text: either plain text or a clickable `[m:ss]` marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    Text { text: String },
    Timestamp { label: String, seconds: u32 },
}

pub fn parse_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;
    for caps in timestamp_pattern().captures_iter(text) {
        let (Some(whole), Some(min), Some(sec)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let (Ok(min), Ok(sec)) = (min.as_str().parse::<u32>(), sec.as_str().parse::<u32>()) else {
            continue;
        };
        if whole.start() > last {
            segments.push(Segment::Text {
                text: text[last..whole.start()].to_string(),
            });
        }
        segments.push(Segment::Timestamp {
            label: format!("{}:{}", &caps[1], &caps[2]),
            seconds: min * 60 + sec,
        });
        last = whole.end();
    }
    if last < text.len() {
        segments.push(Segment::Text {
            text: text[last..].to_string(),
        });
    }
    segments
}

/// `m:ss`, as used in reference lines.
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Segment {
        Segment::Text { text: s.into() }
    }

    #[test]
    fn test_splits_around_timestamp() {
        assert_eq!(
            parse_segments("abc [1:05] def"),
            vec![
                text("abc "),
                Segment::Timestamp {
                    label: "1:05".into(),
                    seconds: 65
                },
                text(" def"),
            ]
        );
    }

    #[test]
    fn test_multiple_and_edge_positions() {
        let segments = parse_segments("[12:30] then [0:07]");
        assert_eq!(segments.len(), 3);
        assert_eq!(
            segments[0],
            Segment::Timestamp {
                label: "12:30".into(),
                seconds: 750
            }
        );
        assert_eq!(segments[1], text(" then "));
        assert!(matches!(segments[2], Segment::Timestamp { seconds: 7, .. }));
    }

    #[test]
    fn test_non_matching_brackets_stay_text() {
        assert_eq!(
            parse_segments("see [123:45] or [1:5]"),
            vec![text("see [123:45] or [1:5]")]
        );
        assert!(parse_segments("").is_empty());
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(65.0), "1:05");
        assert_eq!(format_timestamp(0.4), "0:00");
        assert_eq!(format_timestamp(3599.9), "59:59");
        assert_eq!(format_timestamp(-3.0), "0:00");
    }
}
