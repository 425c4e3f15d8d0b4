use chrono::{NaiveTime, Timelike};
use waterping_models::settings::Settings;

/// Decides whether `now` falls inside the wake-to-sleep window, both ends inclusive.
///
/// A window whose wake time is later than its sleep time crosses midnight.
/// `wake == sleep` is a window of exactly that one minute.
pub fn is_within_window(settings: &Settings, now: NaiveTime) -> bool {
    let wake_total = settings.wake_time.minutes_since_midnight();
    let sleep_total = settings.sleep_time.minutes_since_midnight();
    let now_minutes = now.hour() * 60 + now.minute();

    if wake_total <= sleep_total {
        wake_total <= now_minutes && now_minutes <= sleep_total
    } else {
        now_minutes >= wake_total || now_minutes <= sleep_total
    }
}
