use common::{
    math::Pos,
    motion::{Motion, MotionEvent},
};

use crate::error::PostprocessError;

/// Totals of an event stream, used for the template tokens and by the
/// inspector.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GcodeStats {
    /// Sum of the filament amounts of all extrusions.
    pub filament_amount: f64,
    /// Seconds, from distance over feed of every move.
    pub print_time: f64,
    pub layers: usize,
    pub retracts: usize,
}

impl GcodeStats {
    pub fn of(events: &[MotionEvent]) -> Self {
        let mut out = Self::default();
        let mut head = Pos::zeros();

        for event in events {
            match &event.motion {
                Motion::Travel { to, feed } | Motion::Extrude { to, feed, .. } => {
                    if *feed > 0.0 {
                        out.print_time += (to - head).norm() / feed;
                    }
                    head = *to;
                }
                Motion::Retract { length, feed } | Motion::Unretract { length, feed } => {
                    if *feed > 0.0 {
                        out.print_time += length / feed;
                    }
                }
                Motion::Dwell { seconds } => out.print_time += seconds,
                _ => {}
            }

            match &event.motion {
                Motion::Extrude { e, .. } => out.filament_amount += e,
                Motion::Retract { .. } => out.retracts += 1,
                Motion::Comment { text } if text.starts_with("LAYER:") => out.layers += 1,
                _ => {}
            }
        }

        out
    }
}

/// Fails on the first event carrying a NaN or infinite number.
pub fn check_finite(events: &[MotionEvent]) -> Result<(), PostprocessError> {
    for (index, event) in events.iter().enumerate() {
        let fields: Vec<(&'static str, f64)> = match &event.motion {
            Motion::Travel { to, feed } => vec![("x", to.x), ("y", to.y), ("z", to.z), ("feed", *feed)],
            Motion::Extrude { to, feed, e } => vec![
                ("x", to.x),
                ("y", to.y),
                ("z", to.z),
                ("feed", *feed),
                ("extrusion", *e),
            ],
            Motion::Retract { length, feed } | Motion::Unretract { length, feed } => {
                vec![("length", *length), ("feed", *feed)]
            }
            Motion::SetTemperature { target, .. } => vec![("temperature", *target)],
            Motion::Dwell { seconds } => vec![("dwell", *seconds)],
            Motion::Comment { .. } | Motion::Extension { .. } => Vec::new(),
        };

        if let Some((field, _)) = fields.iter().find(|(_, x)| !x.is_finite()) {
            return Err(PostprocessError::FiniteNumberCheckFailed { index, field });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PostprocessErrorKind;

    #[test]
    fn totals() {
        let events = [
            MotionEvent::comment("LAYER:0"),
            MotionEvent::travel(Pos::new(3.0, 4.0, 0.0), 5.0),
            MotionEvent::extrude(Pos::new(3.0, 14.0, 0.0), 10.0, 0.5),
            MotionEvent::new(Motion::Retract {
                length: 2.0,
                feed: 20.0,
            }),
            MotionEvent::new(Motion::Dwell { seconds: 1.5 }),
            MotionEvent::comment("LAYER:1"),
        ];

        let stats = GcodeStats::of(&events);
        assert_eq!(stats.layers, 2);
        assert_eq!(stats.retracts, 1);
        assert_eq!(stats.filament_amount, 0.5);
        assert!((stats.print_time - (1.0 + 1.0 + 0.1 + 1.5)).abs() < 1e-9);
    }

    #[test]
    fn rejects_nan() {
        let events = [
            MotionEvent::travel(Pos::new(0.0, 0.0, 0.2), 100.0),
            MotionEvent::extrude(Pos::new(1.0, f64::NAN, 0.2), 50.0, 0.1),
        ];

        let err = check_finite(&events).unwrap_err();
        assert_eq!(err.kind(), PostprocessErrorKind::FiniteNumberCheckFailed);
        assert_eq!(err.to_string(), "event 1 has a non-finite y");
    }
}
