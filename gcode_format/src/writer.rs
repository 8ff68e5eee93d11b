use std::fmt::Write;

use chrono::{DateTime, Local};
use common::{
    config::SliceConfig,
    misc::trim_float,
    motion::{Motion, MotionEvent},
};
use tracing::debug;

use crate::{
    error::PostprocessError,
    small,
    stats::{check_finite, GcodeStats},
    template::{substitute, TemplateContext},
};

/// Writes motion events as G-code for the given config.
pub struct PostProcessor<'a> {
    config: &'a SliceConfig,
    now: DateTime<Local>,
}

/// Modal state of the printer as seen through the written lines. Axes and
/// feeds are compared as they are printed, so values that round to the same
/// text are not repeated.
struct GcodeWriter {
    out: String,
    relative_e: bool,

    x: Option<String>,
    y: Option<String>,
    z: Option<String>,
    feed: Option<String>,
    e: f64,
    tool: u8,
}

impl<'a> PostProcessor<'a> {
    pub fn new(config: &'a SliceConfig) -> Self {
        Self {
            config,
            now: Local::now(),
        }
    }

    /// Time used for the `{day}`, `{date}` and `{time}` tokens.
    pub fn with_time(mut self, now: DateTime<Local>) -> Self {
        self.now = now;
        self
    }

    pub fn process(&self, events: &[MotionEvent]) -> Result<String, PostprocessError> {
        check_finite(events)?;
        let stats = GcodeStats::of(events);
        let context = TemplateContext {
            config: self.config,
            stats: &stats,
            now: self.now,
        };

        let mut writer = GcodeWriter::new(self.config.relative_e);
        writer.line("G21");
        writer.line("G90");
        writer.line(if self.config.relative_e { "M83" } else { "M82" });
        writer.line("G28");
        writer.template(&substitute(&self.config.start_gcode, &context));
        writer.line("G92 E0");

        for (index, event) in events.iter().enumerate() {
            writer.event(index, event)?;
        }

        writer.template(&substitute(&self.config.end_gcode, &context));

        let out = match self.config.gcode_small {
            true => small::shrink(&writer.out),
            false => writer.out,
        };

        debug!(
            events = events.len(),
            lines = out.lines().count(),
            filament = stats.filament_amount,
            "Wrote G-code"
        );
        Ok(out)
    }
}

impl GcodeWriter {
    fn new(relative_e: bool) -> Self {
        Self {
            out: String::new(),
            relative_e,
            x: None,
            y: None,
            z: None,
            feed: None,
            e: 0.0,
            tool: 0,
        }
    }

    fn line(&mut self, line: &str) {
        self.out.push_str(line);
        self.out.push('\n');
    }

    fn template(&mut self, text: &str) {
        for line in text.lines().map(str::trim_end).filter(|x| !x.is_empty()) {
            self.line(line);
        }
    }

    fn event(&mut self, index: usize, event: &MotionEvent) -> Result<(), PostprocessError> {
        if event.tool != self.tool {
            self.tool = event.tool;
            self.line(&format!("T{}", event.tool));
        }

        match &event.motion {
            Motion::Travel { to, feed } => self.movement(to.x, to.y, to.z, *feed, None),
            Motion::Extrude { to, feed, e } => {
                let e = match self.relative_e {
                    true => *e,
                    false => {
                        self.e += e;
                        self.e
                    }
                };
                self.movement(to.x, to.y, to.z, *feed, Some(e));
            }
            Motion::Retract { length, feed } => self.filament(-length, *feed),
            Motion::Unretract { length, feed } => self.filament(*length, *feed),
            Motion::SetTemperature { target, wait } => {
                let code = if *wait { "M109" } else { "M104" };
                self.line(&format!("{code} S{}", trim_float(*target, 1)));
            }
            Motion::Comment { text } => self.line(&format!(";{}", text.replace('\n', " "))),
            Motion::Dwell { seconds } => {
                self.line(&format!("G4 P{}", (seconds * 1000.0).round().max(0.0) as u64))
            }
            Motion::Extension {
                line, pass_through, ..
            } if *pass_through => self.line(line),
            Motion::Extension { name, .. } => {
                return Err(PostprocessError::UnknownEvent {
                    index,
                    name: name.clone(),
                })
            }
        }

        Ok(())
    }

    fn movement(&mut self, x: f64, y: f64, z: f64, feed: f64, e: Option<f64>) {
        let mut line = String::from("G1");
        modal_word(&mut line, 'X', trim_float(x, 3), &mut self.x);
        modal_word(&mut line, 'Y', trim_float(y, 3), &mut self.y);
        modal_word(&mut line, 'Z', trim_float(z, 3), &mut self.z);
        modal_word(&mut line, 'F', trim_float(feed * 60.0, 1), &mut self.feed);

        match e {
            Some(e) => {
                let _ = write!(line, " E{}", trim_float(e, 5));
            }
            None if line.len() == 2 => return,
            None => {}
        }

        self.line(&line);
    }

    /// Retract or unretract by `delta` mm of filament.
    fn filament(&mut self, delta: f64, feed: f64) {
        let e = match self.relative_e {
            true => delta,
            false => {
                self.e += delta;
                self.e
            }
        };

        let feed = trim_float(feed * 60.0, 1);
        self.line(&format!("G1 E{} F{feed}", trim_float(e, 5)));
        self.feed = Some(feed);
    }
}

/// Adds ` <axis><value>` to the line unless it matches the last written
/// value.
fn modal_word(line: &mut String, axis: char, value: String, last: &mut Option<String>) {
    if last.as_ref() == Some(&value) {
        return;
    }

    let _ = write!(line, " {axis}{value}");
    *last = Some(value);
}
