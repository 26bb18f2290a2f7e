use chrono::{DateTime, Duration, Utc};

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 10;

/// Classification priority plus geo bonus, kept inside [1, 10].
pub fn final_priority(classification_priority: u8, geo_bonus: u8) -> u8 {
    classification_priority
        .saturating_add(geo_bonus)
        .clamp(MIN_PRIORITY, MAX_PRIORITY)
}

/// Time allowed to resolve a complaint of the given priority.
pub fn sla_window(priority: u8) -> Duration {
    match priority {
        9.. => Duration::hours(6),
        7..=8 => Duration::hours(24),
        4..=6 => Duration::hours(48),
        _ => Duration::hours(72),
    }
}

/// Absolute deadline, fixed once at creation.
pub fn compute_sla_deadline(priority: u8, now: DateTime<Utc>) -> DateTime<Utc> {
    now + sla_window(priority)
}
