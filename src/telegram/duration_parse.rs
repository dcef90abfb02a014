//! Duration parsing for access approvals
//!
//! Supports human-readable durations like "36h", "7 days", "1d 12h".
//! A bare number is read as hours, matching the approval buttons.

/// Parse a human-readable access duration to whole hours.
///
/// - Bare integers are hours ("24" → 24)
/// - Anything else goes through humantime ("7d" → 168, "90m" → 2)
/// - Partial hours round up; zero is rejected
///
/// # Examples
/// ```
/// use timegate::telegram::duration_parse::parse_duration_to_hours;
///
/// assert_eq!(parse_duration_to_hours("24").unwrap(), 24);
/// assert_eq!(parse_duration_to_hours("36h").unwrap(), 36);
/// assert_eq!(parse_duration_to_hours("7 days").unwrap(), 168);
/// assert_eq!(parse_duration_to_hours("90m").unwrap(), 2);
/// ```
pub fn parse_duration_to_hours(input: &str) -> Result<u64, String> {
    let input = input.trim();

    if let Ok(hours) = input.parse::<u64>() {
        if hours == 0 {
            return Err("Duration must be at least one hour".to_string());
        }
        return Ok(hours);
    }

    let secs = humantime::parse_duration(input)
        .map_err(|e| format!("Invalid duration '{}': {}", input, e))?
        .as_secs();

    if secs == 0 {
        return Err("Duration must be at least one hour".to_string());
    }
    Ok(secs.div_ceil(3600))
}
