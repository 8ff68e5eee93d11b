use common::{
    math::Pos,
    motion::{Motion, MotionEvent},
};

/// Outcome of slowing down one layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cooling {
    /// Estimated layer time before slowing down, in seconds.
    pub time: f64,
    /// Factor applied to every feed rate, at most one.
    pub factor: f64,
    /// Some feed rate was held at the minimum feed rate, so the layer may
    /// still be faster than the minimum layer time.
    pub saturated: bool,
}

/// Estimated time of the moves in a layer, starting from `start`.
pub fn layer_time(events: &[MotionEvent], start: Pos) -> f64 {
    let mut head = start;
    let mut time = 0.0;
    for event in events {
        if let (Some(to), Some(feed)) = (event.target(), event.feed()) {
            if feed > 0.0 {
                time += (to - head).norm() / feed;
            }
            head = to;
        }
    }
    time
}

/// Scales the feed of every move in the layer so it takes at least
/// `min_time`. A feed is never brought below `min_feed`, or below its
/// own value when that is already slower.
pub fn slow_down(events: &mut [MotionEvent], start: Pos, min_time: f64, min_feed: f64) -> Cooling {
    let time = layer_time(events, start);
    if time <= 0.0 || time >= min_time {
        return Cooling {
            time,
            factor: 1.0,
            saturated: false,
        };
    }

    let factor = time / min_time;
    let mut saturated = false;
    for event in events.iter_mut() {
        if let Motion::Travel { feed, .. } | Motion::Extrude { feed, .. } = &mut event.motion {
            let scaled = *feed * factor;
            let floor = feed.min(min_feed);
            saturated |= scaled < floor;
            *feed = scaled.max(floor);
        }
    }

    Cooling {
        time,
        factor,
        saturated,
    }
}
