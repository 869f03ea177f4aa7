use std::sync::OnceLock;

use time::OffsetDateTime;
use time::format_description::FormatItem;
use time::format_description::well_known::Rfc3339;

fn list_format() -> Option<&'static [FormatItem<'static>]> {
    static FMT: OnceLock<Option<Vec<FormatItem<'static>>>> = OnceLock::new();
    FMT.get_or_init(|| {
        time::format_description::parse(
            "[year]-[month repr:numerical padding:zero]-[day padding:zero] [hour padding:zero]:[minute padding:zero]:[second padding:zero]Z",
        )
        .ok()
    })
    .as_deref()
}

fn fmt_abs(ts: &str) -> Option<String> {
    let dt = OffsetDateTime::parse(ts, &Rfc3339).ok()?;
    dt.to_offset(time::UtcOffset::UTC).format(list_format()?).ok()
}

fn fmt_since(ts: &str, now: OffsetDateTime) -> Option<String> {
    let dt = OffsetDateTime::parse(ts, &Rfc3339).ok()?;
    let secs = (now - dt).whole_seconds();
    if secs < 0 {
        return None;
    }

    let mins = secs / 60;
    let hours = mins / 60;
    let s = if secs < 60 {
        "just now".to_string()
    } else if mins < 60 {
        format!("{}m ago", mins)
    } else if hours < 24 {
        format!("{}h ago", hours)
    } else {
        return None;
    };
    Some(s)
}

/// Alarm/event time for listings: relative within the last day, absolute UTC otherwise.
pub(crate) fn fmt_ts_list(ts: &str, now: OffsetDateTime) -> String {
    fmt_since(ts, now)
        .or_else(|| fmt_abs(ts))
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ts: &str) -> OffsetDateTime {
        OffsetDateTime::parse(ts, &Rfc3339).expect("parse timestamp")
    }

    #[test]
    fn recent_times_are_relative() {
        let now = at("2024-05-01T12:00:00Z");
        assert_eq!(fmt_ts_list("2024-05-01T11:59:30Z", now), "just now");
        assert_eq!(fmt_ts_list("2024-05-01T11:15:00Z", now), "45m ago");
        assert_eq!(fmt_ts_list("2024-05-01T02:00:00+02:00", now), "12h ago");
    }

    #[test]
    fn old_and_future_times_are_absolute_utc() {
        let now = at("2024-05-01T12:00:00Z");
        assert_eq!(
            fmt_ts_list("2024-04-20T08:30:05.123+02:00", now),
            "2024-04-20 06:30:05Z"
        );
        assert_eq!(
            fmt_ts_list("2024-05-02T00:00:00Z", now),
            "2024-05-02 00:00:00Z"
        );
    }

    #[test]
    fn unparsable_times_pass_through() {
        let now = at("2024-05-01T12:00:00Z");
        assert_eq!(fmt_ts_list("yesterday", now), "yesterday");
    }
}
