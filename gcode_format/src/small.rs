//! Smaller G-code for slow links: informational comments are dropped along
//! with Z and F words that repeat the modal value. Layer markers are kept.

/// Rewrites G-code without comments or redundant Z/F words.
pub fn shrink(gcode: &str) -> String {
    let mut out = String::with_capacity(gcode.len() / 2);
    let mut z = None;
    let mut feed = None;

    for line in gcode.lines() {
        let line = line.trim();
        if line.starts_with(";LAYER:") {
            out.push_str(line);
            out.push('\n');
            continue;
        }

        let code = match line.find(';') {
            Some(start) => line[..start].trim_end(),
            None => line,
        };
        if code.is_empty() {
            continue;
        }

        let mut words = code.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        if command != "G0" && command != "G1" {
            out.push_str(code);
            out.push('\n');
            continue;
        }

        let mut shrunk = String::from(command);
        for word in words {
            let last = match word.as_bytes().first() {
                Some(b'Z') => &mut z,
                Some(b'F') => &mut feed,
                _ => {
                    shrunk.push(' ');
                    shrunk.push_str(word);
                    continue;
                }
            };

            if last.as_deref() != Some(word) {
                *last = Some(word.to_owned());
                shrunk.push(' ');
                shrunk.push_str(word);
            }
        }

        if shrunk.len() > command.len() {
            out.push_str(&shrunk);
            out.push('\n');
        }
    }

    out
}
