use time::OffsetDateTime;

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 365 * DAY;

/// Compact distance between `then` and `now`, like `5m ago` or `in 2d`.
#[must_use]
pub fn relative_time(then: OffsetDateTime, now: OffsetDateTime) -> String {
    let seconds = (now - then).whole_seconds();
    let amount = compact_amount(seconds.saturating_abs());

    if seconds < 0 {
        format!("in {amount}")
    } else {
        format!("{amount} ago")
    }
}

fn compact_amount(seconds: i64) -> String {
    let rounded = |unit: i64| seconds.saturating_add(unit / 2) / unit;

    match seconds {
        s if s < 90 => "1m".to_owned(),
        s if s < 45 * MINUTE => format!("{}m", rounded(MINUTE)),
        s if s < 90 * MINUTE => "1h".to_owned(),
        s if s < 22 * HOUR => format!("{}h", rounded(HOUR)),
        s if s < 36 * HOUR => "1d".to_owned(),
        s if s < 26 * DAY => format!("{}d", rounded(DAY)),
        s if s < 46 * DAY => "1M".to_owned(),
        s if s < 320 * DAY => format!("{}M", rounded(MONTH)),
        s if s < 548 * DAY => "1y".to_owned(),
        _ => format!("{}y", rounded(YEAR)),
    }
}
