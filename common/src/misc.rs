use std::time::Duration;

pub fn human_duration(duration: Duration) -> String {
    let ms = duration.as_millis() as f32;
    if ms < 1000.0 {
        format!("{ms}ms")
    } else if ms < 60_000.0 {
        format!("{:.2}s", ms / 1000.0)
    } else if ms < 3_600_000.0 {
        let minutes = ms / 60_000.0;
        let seconds = (minutes - minutes.floor()) * 60.0;
        format!("{:.0}m {:.2}s", minutes.floor(), seconds)
    } else {
        let hours = ms / 3_600_000.0;
        let minutes = (hours - hours.floor()) * 60.0;
        let seconds = (minutes - minutes.floor()) * 60.0;
        format!(
            "{:.0}h {:.0}m {:.2}s",
            hours.floor(),
            minutes.floor(),
            seconds
        )
    }
}

/// Formats a number with at most `decimals` digits after the point,
/// dropping trailing zeros.
pub fn trim_float(value: f64, decimals: usize) -> String {
    let out = format!("{value:.decimals$}");
    let out = if out.contains('.') {
        out.trim_end_matches('0').trim_end_matches('.')
    } else {
        &out
    };

    match out {
        "-0" => "0".to_owned(),
        x => x.to_owned(),
    }
}
