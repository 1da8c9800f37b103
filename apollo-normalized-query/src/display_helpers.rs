use std::fmt;
use std::fmt::Display;

use serde::Serializer;

/// Writes nested lines with two spaces of indentation per level.
pub(crate) struct State<'fmt, 'fmt2> {
    indent_level: usize,
    output: &'fmt mut fmt::Formatter<'fmt2>,
}

impl<'a, 'b> State<'a, 'b> {
    pub(crate) fn new(output: &'a mut fmt::Formatter<'b>) -> State<'a, 'b> {
        Self {
            indent_level: 0,
            output,
        }
    }

    pub(crate) fn write<T: Display>(&mut self, value: T) -> fmt::Result {
        write!(self.output, "{}", value)
    }

    pub(crate) fn new_line(&mut self) -> fmt::Result {
        self.write("\n")?;
        for _ in 0..self.indent_level {
            self.write("  ")?
        }
        Ok(())
    }

    pub(crate) fn indent_no_new_line(&mut self) {
        self.indent_level += 1;
    }

    pub(crate) fn dedent_no_new_line(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }
}

/// Writes each value on its own line, one level deeper than the current one.
pub(crate) fn write_indented_lines<T>(
    state: &mut State<'_, '_>,
    values: impl IntoIterator<Item = T>,
    mut write_line: impl FnMut(&mut State<'_, '_>, T) -> fmt::Result,
) -> fmt::Result {
    state.indent_no_new_line();
    for value in values {
        state.new_line()?;
        write_line(state, value)?;
    }
    state.dedent_no_new_line();
    Ok(())
}

pub(crate) struct DisplaySlice<'a, T>(pub(crate) &'a [T]);

impl<T: Display> Display for DisplaySlice<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        let mut iter = self.0.iter();
        if let Some(item) = iter.next() {
            write!(f, "{item}")?;
        }
        iter.try_for_each(|item| write!(f, ", {item}"))?;
        write!(f, "]")
    }
}

pub(crate) fn serialize_as_string<T: Display, S: Serializer>(
    value: &T,
    ser: S,
) -> Result<S::Ok, S::Error> {
    ser.serialize_str(&value.to_string())
}
