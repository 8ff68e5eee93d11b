//! Reads G-code back into motion events. Axes left out of a move keep their
//! previous value, and E is tracked in absolute or relative mode as set by
//! `M82`/`M83`. Commands without a motion counterpart come back as
//! pass-through extension events.

use common::{
    math::Pos,
    motion::{Motion, MotionEvent},
};

use crate::error::ReadError;

#[derive(Debug, Default)]
struct Modal {
    position: Pos,
    feed: f64,
    e: f64,
    relative_e: bool,
    tool: u8,
}

pub fn parse_gcode(gcode: &str) -> Result<Vec<MotionEvent>, ReadError> {
    let mut state = Modal::default();
    let mut out = Vec::new();

    for (index, raw) in gcode.lines().enumerate() {
        let line = index + 1;
        let (code, comment) = match raw.find(';') {
            Some(start) => (raw[..start].trim(), Some(raw[start + 1..].trim_end())),
            None => (raw.trim(), None),
        };

        if code.is_empty() {
            if let Some(text) = comment {
                out.push(MotionEvent::comment(text).with_tool(state.tool));
            }
            continue;
        }

        let mut words = code.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let params = words
            .map(|word| parse_word(line, word))
            .collect::<Result<Vec<_>, _>>()?;
        let param = |axis: char| params.iter().find(|(x, _)| *x == axis).map(|(_, v)| *v);

        let motion = match command {
            "G0" | "G1" => {
                if let Some(feed) = param('F') {
                    state.feed = feed / 60.0;
                }

                let mut to = state.position;
                let moved = ['X', 'Y', 'Z']
                    .iter()
                    .enumerate()
                    .filter_map(|(i, &axis)| param(axis).map(|v| to[i] = v))
                    .count()
                    > 0;

                let delta = param('E').map(|e| match state.relative_e {
                    true => e,
                    false => {
                        let delta = e - state.e;
                        state.e = e;
                        delta
                    }
                });
                state.position = to;
                let feed = state.feed;

                match (moved, delta) {
                    (true, Some(e)) if e > 0.0 => Some(Motion::Extrude { to, feed, e }),
                    (true, _) => Some(Motion::Travel { to, feed }),
                    (false, Some(e)) if e < 0.0 => Some(Motion::Retract { length: -e, feed }),
                    (false, Some(e)) if e > 0.0 => Some(Motion::Unretract { length: e, feed }),
                    _ => None,
                }
            }
            "G4" => Some(Motion::Dwell {
                seconds: param('P').map(|x| x / 1000.0).or(param('S')).unwrap_or(0.0),
            }),
            "G92" => {
                if let Some(e) = param('E') {
                    state.e = e;
                }
                None
            }
            "M82" | "M83" => {
                state.relative_e = command == "M83";
                None
            }
            "M104" | "M109" => Some(Motion::SetTemperature {
                target: param('S').unwrap_or(0.0),
                wait: command == "M109",
            }),
            tool if tool.starts_with('T') && tool.len() > 1 => {
                state.tool = tool[1..].parse().map_err(|_| ReadError::InvalidWord {
                    line,
                    word: tool.to_owned(),
                })?;
                None
            }
            _ => Some(Motion::Extension {
                name: command.to_owned(),
                line: code.to_owned(),
                pass_through: true,
            }),
        };

        if let Some(motion) = motion {
            out.push(MotionEvent::new(motion).with_tool(state.tool));
        }
    }

    Ok(out)
}

fn parse_word(line: usize, word: &str) -> Result<(char, f64), ReadError> {
    let invalid = || ReadError::InvalidWord {
        line,
        word: word.to_owned(),
    };

    let mut chars = word.chars();
    let axis = chars.next().ok_or_else(invalid)?.to_ascii_uppercase();
    let value = chars.as_str().parse::<f64>().map_err(|_| invalid())?;
    Ok((axis, value))
}
