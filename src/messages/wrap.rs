//! Line-wrapping state machine (spec §4.7 "Line handling"), grounded on
//! `vsend_message` in the original helpfile renderer: text accumulates into
//! a current line; on overflow the wrapper searches backward for the last
//! space, but never past the start of the most recent expansion's output or
//! the last explicit newline, since that text must be kept whole.

pub struct LineWrapper {
    width: usize,
    line: Vec<char>,
    /// Index into `line` before which the backward search for a break
    /// point must not cross.
    boundary: usize,
    lines: Vec<String>,
}

impl LineWrapper {
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
            line: Vec::new(),
            boundary: 0,
            lines: Vec::new(),
        }
    }

    /// Append literal template text: spaces inside it are valid break
    /// points.
    pub fn push_literal(&mut self, text: &str) {
        self.push(text, false);
    }

    /// Append an expansion's resolved text: treated as a single atomic
    /// unit the wrapper will not break inside when searching backward.
    pub fn push_expansion(&mut self, text: &str) {
        self.push(text, true);
    }

    fn push(&mut self, text: &str, is_expansion: bool) {
        for ch in text.chars() {
            if ch == '\n' {
                self.flush();
                self.boundary = 0;
                continue;
            }
            self.line.push(ch);
            if self.line.len() >= self.width {
                self.wrap();
            }
        }
        if is_expansion {
            self.boundary = self.line.len();
        }
    }

    fn wrap(&mut self) {
        let mut cut = self.line.len();
        while cut > self.boundary && self.line[cut - 1] != ' ' {
            cut -= 1;
        }
        if cut == self.boundary {
            // No space to break on between the boundary and the overflow:
            // a single word too long to fit. Print it whole, truncated
            // only at the hard protocol cap, then start fresh.
            if self.line.len() > self.width {
                self.line.truncate(self.width);
            }
            self.flush();
            self.boundary = 0;
            return;
        }
        let rest: Vec<char> = self.line[cut..]
            .iter()
            .copied()
            .skip_while(|&c| c == ' ')
            .collect();
        self.line.truncate(cut);
        self.flush();
        self.line = rest;
        self.boundary = 0;
    }

    fn flush(&mut self) {
        let line: String = self.line.drain(..).collect();
        let trimmed_end = line.trim_end();
        if !trimmed_end.is_empty() {
            self.lines.push(trimmed_end.to_string());
        }
    }

    /// Flush any remaining partial line and return everything sent so far.
    pub fn finish(mut self) -> Vec<String> {
        if !self.line.is_empty() {
            self.flush();
        }
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_line() {
        let mut w = LineWrapper::new(40);
        w.push_literal("hello there");
        assert_eq!(w.finish(), vec!["hello there"]);
    }

    #[test]
    fn wraps_at_last_space_before_overflow() {
        let mut w = LineWrapper::new(10);
        w.push_literal("one two three four");
        let lines = w.finish();
        for line in &lines {
            assert!(line.chars().count() <= 10, "line too long: {line:?}");
        }
        assert_eq!(lines.join(" "), "one two three four");
    }

    #[test]
    fn newline_flushes_immediately() {
        let mut w = LineWrapper::new(40);
        w.push_literal("first line\nsecond line");
        assert_eq!(w.finish(), vec!["first line", "second line"]);
    }

    #[test]
    fn word_too_long_gets_its_own_truncated_line() {
        let mut w = LineWrapper::new(5);
        w.push_literal("xxxxxxxxxx rest");
        let lines = w.finish();
        assert_eq!(lines[0].chars().count(), 5);
    }

    #[test]
    fn expansion_output_is_never_broken_by_backward_search() {
        let mut w = LineWrapper::new(10);
        w.push_literal("a ");
        w.push_expansion("longnick");
        w.push_literal(" b");
        let lines = w.finish();
        // "longnick" must appear intact on some line.
        assert!(lines.iter().any(|l| l.contains("longnick")));
    }
}
