//! SLA band computation (spec §4.7 SLA escalation engine).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlaBand {
    Ok,
    Imminent,
    Confirmed,
}

/// `timeRemaining = slaDeadline − now − estimatedRemainingMin`. `>= 10 -> Ok`,
/// `[0, 10) -> Imminent`, `< 0 -> Confirmed`.
pub fn evaluate(deadline_min: f64, now_min: f64, estimated_remaining_min: f64, imminent_band_min: f64) -> (SlaBand, f64) {
    let time_remaining = deadline_min - now_min - estimated_remaining_min;
    let band = if time_remaining < 0.0 {
        SlaBand::Confirmed
    } else if time_remaining < imminent_band_min {
        SlaBand::Imminent
    } else {
        SlaBand::Ok
    };
    (band, time_remaining)
}
