//! Motion events exchanged between the toolpath planner and the G-code
//! post-processor.

use crate::math::Pos;

/// One printer action. Feeds are in mm/s, lengths in mm and `e` is the
/// filament amount of a single move.
#[derive(Debug, Clone, PartialEq)]
pub enum Motion {
    Travel {
        to: Pos,
        feed: f64,
    },
    Extrude {
        to: Pos,
        feed: f64,
        e: f64,
    },
    Retract {
        length: f64,
        feed: f64,
    },
    Unretract {
        length: f64,
        feed: f64,
    },
    SetTemperature {
        target: f64,
        wait: bool,
    },
    Comment {
        text: String,
    },
    Dwell {
        seconds: f64,
    },
    /// A firmware specific command. Written verbatim when `pass_through`
    /// is set, rejected by the post-processor otherwise.
    Extension {
        name: String,
        line: String,
        pass_through: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotionEvent {
    pub tool: u8,
    pub motion: Motion,
}

impl MotionEvent {
    pub fn new(motion: Motion) -> Self {
        Self { tool: 0, motion }
    }

    pub fn with_tool(mut self, tool: u8) -> Self {
        self.tool = tool;
        self
    }

    pub fn travel(to: Pos, feed: f64) -> Self {
        Self::new(Motion::Travel { to, feed })
    }

    pub fn extrude(to: Pos, feed: f64, e: f64) -> Self {
        Self::new(Motion::Extrude { to, feed, e })
    }

    pub fn comment(text: impl Into<String>) -> Self {
        Self::new(Motion::Comment { text: text.into() })
    }

    pub fn extension(name: impl Into<String>, line: impl Into<String>) -> Self {
        Self::new(Motion::Extension {
            name: name.into(),
            line: line.into(),
            pass_through: true,
        })
    }

    /// Destination of a positioning move.
    pub fn target(&self) -> Option<Pos> {
        match self.motion {
            Motion::Travel { to, .. } | Motion::Extrude { to, .. } => Some(to),
            _ => None,
        }
    }

    pub fn feed(&self) -> Option<f64> {
        match self.motion {
            Motion::Travel { feed, .. }
            | Motion::Extrude { feed, .. }
            | Motion::Retract { feed, .. }
            | Motion::Unretract { feed, .. } => Some(feed),
            _ => None,
        }
    }

    pub fn is_extrude(&self) -> bool {
        matches!(self.motion, Motion::Extrude { .. })
    }

    pub fn is_travel(&self) -> bool {
        matches!(self.motion, Motion::Travel { .. })
    }
}
