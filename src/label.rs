// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Per-instance display labels: a color and a prefix.

/// Placeholder replaced by the instance id in custom prefix templates
pub const ID_PLACEHOLDER: &str = "{id}";

/// Marker appended to every decorated line
pub const RESET: &str = "\x1b[0m";

/// ANSI colors handed out to instances in order, wrapping around
pub const PALETTE: [&str; 36] = [
    "\x1b[31m",   // red
    "\x1b[32m",   // green
    "\x1b[33m",   // yellow
    "\x1b[34m",   // blue
    "\x1b[35m",   // magenta
    "\x1b[36m",   // cyan
    "\x1b[91m",   // bright red
    "\x1b[92m",   // bright green
    "\x1b[93m",   // bright yellow
    "\x1b[94m",   // bright blue
    "\x1b[95m",   // bright magenta
    "\x1b[96m",   // bright cyan
    "\x1b[1;31m", // bold
    "\x1b[1;32m",
    "\x1b[1;33m",
    "\x1b[1;34m",
    "\x1b[1;35m",
    "\x1b[1;36m",
    "\x1b[1;91m",
    "\x1b[1;92m",
    "\x1b[1;93m",
    "\x1b[1;94m",
    "\x1b[1;95m",
    "\x1b[1;96m",
    "\x1b[4;31m", // underline
    "\x1b[4;32m",
    "\x1b[4;33m",
    "\x1b[4;34m",
    "\x1b[4;35m",
    "\x1b[4;36m",
    "\x1b[4;91m",
    "\x1b[4;92m",
    "\x1b[4;93m",
    "\x1b[4;94m",
    "\x1b[4;95m",
    "\x1b[4;96m",
];

/// Zero padded width of rendered instance ids, chosen so every label of a run lines up
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdWidth(usize);

impl IdWidth {
    pub fn for_total(total: usize) -> Self {
        match total {
            0..=9 => Self(1),
            10..=99 => Self(2),
            _ => Self(3),
        }
    }

    pub fn width(self) -> usize {
        self.0
    }

    pub fn render(self, id: usize) -> String {
        format!("{:0width$}", id, width = self.0)
    }
}

/// Builds the prefix for `id`
///
/// A non-empty `template` has every `{id}` replaced, otherwise the prefix is the bracketed id.
pub fn format_prefix(template: &str, id: usize, width: IdWidth) -> String {
    let id = width.render(id);
    if template.is_empty() {
        format!("[{}]", id)
    } else {
        template.replace(ID_PLACEHOLDER, &id)
    }
}

/// The color and prefix of one instance, fixed once assigned
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Label {
    id: usize,
    color: Option<&'static str>,
    prefix: String,
}

impl Label {
    pub fn new(id: usize, color: Option<&'static str>, prefix: String) -> Self {
        Self { id, color, prefix }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// The color escape, empty when coloring is disabled
    pub fn color(&self) -> &'static str {
        self.color.unwrap_or("")
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `<color><prefix> <line><reset>`, the reset is present even without color
    pub fn decorate(&self, line: &str) -> String {
        format!("{}{} {}{}", self.color(), self.prefix, line, RESET)
    }

    /// The colored prefix alone, used when reporting on the instance
    pub fn tag(&self) -> String {
        format!("{}{}{}", self.color(), self.prefix, RESET)
    }
}

/// Label for the instance at the 0-based `index` out of `total`
pub fn assign(index: usize, total: usize, template: Option<&str>, color: bool) -> Label {
    let id = index + 1;
    let width = IdWidth::for_total(total);
    let color = if color {
        Some(PALETTE[index % PALETTE.len()])
    } else {
        None
    };

    Label::new(id, color, format_prefix(template.unwrap_or(""), id, width))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_id_width() {
        for (total, width) in &[
            (1, 1),
            (5, 1),
            (9, 1),
            (10, 2),
            (50, 2),
            (99, 2),
            (100, 3),
            (999, 3),
            (5000, 3),
        ] {
            assert_eq!(IdWidth::for_total(*total).width(), *width, "total {}", total);
        }
    }

    #[test]
    fn test_format_prefix() {
        let one = IdWidth::for_total(5);
        let two = IdWidth::for_total(50);
        let three = IdWidth::for_total(500);

        assert_eq!(format_prefix("", 3, one), "[3]");
        assert_eq!(format_prefix("", 3, two), "[03]");
        assert_eq!(format_prefix("", 3, three), "[003]");
        assert_eq!(format_prefix("Worker-{id}", 5, one), "Worker-5");
        assert_eq!(format_prefix("Worker-{id}", 5, two), "Worker-05");
        assert_eq!(format_prefix("Static", 1, one), "Static");
        assert_eq!(format_prefix("{id}-{id}", 7, one), "7-7");
    }

    #[test]
    fn test_palette_cycles() {
        assert_eq!(PALETTE.len(), 36);
        for index in 0..72 {
            assert_eq!(
                assign(index, 100, None, true).color(),
                assign(index + 36, 100, None, true).color()
            );
        }

        // all distinct within one period
        let mut colors = PALETTE.to_vec();
        colors.sort_unstable();
        colors.dedup();
        assert_eq!(colors.len(), 36);
    }

    #[test]
    fn test_assign_is_deterministic() {
        let first = assign(11, 12, Some("w{id}"), true);
        assert_eq!(first, assign(11, 12, Some("w{id}"), true));
        assert_eq!(first.id(), 12);
        assert_eq!(first.prefix(), "w12");
        assert_eq!(first.color(), PALETTE[11]);
    }

    #[test]
    fn test_assign_without_color() {
        let label = assign(0, 3, None, false);
        assert_eq!(label.color(), "");
        assert_eq!(label.prefix(), "[1]");
        assert_eq!(label.decorate("plain text"), "[1] plain text\x1b[0m");
    }

    #[test]
    fn test_decorate() {
        let label = Label::new(1, Some("\x1b[31m"), "[1]".to_string());
        assert_eq!(label.decorate("hello world"), "\x1b[31m[1] hello world\x1b[0m");
        assert_eq!(label.tag(), "\x1b[31m[1]\x1b[0m");
    }
}
