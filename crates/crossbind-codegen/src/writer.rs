use std::ops::{Deref, DerefMut};

const INDENT: &str = "    ";

/// Append-only text buffer that tracks indentation.
///
/// Indentation is scoped: [`CodeWriter::indent`] returns a guard that
/// dedents when dropped, so an early `?` return inside a block can never
/// leave the writer at the wrong level.
#[derive(Debug, Default)]
pub struct CodeWriter {
    buffer: String,
    level: usize,
    mid_line: bool,
    temporaries: usize,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(level: usize) -> Self {
        Self {
            level,
            ..Self::new()
        }
    }

    pub fn level(&self) -> usize {
        self.level
    }

    /// Appends `text`, indenting every line it starts.
    pub fn add(&mut self, text: impl AsRef<str>) {
        let mut lines = text.as_ref().split('\n').peekable();
        while let Some(part) = lines.next() {
            if !part.is_empty() {
                if !self.mid_line {
                    for _ in 0..self.level {
                        self.buffer.push_str(INDENT);
                    }
                }
                self.buffer.push_str(part);
                self.mid_line = true;
            }
            if lines.peek().is_some() {
                self.buffer.push('\n');
                self.mid_line = false;
            }
        }
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        self.add(text);
        self.buffer.push('\n');
        self.mid_line = false;
    }

    pub fn blank(&mut self) {
        self.line("");
    }

    pub fn indent(&mut self) -> Indent<'_> {
        self.level += 1;
        Indent { writer: self }
    }

    /// A fresh local name, unique until the next [`CodeWriter::reset_temporaries`].
    pub fn next_temporary(&mut self, prefix: &str) -> String {
        let name = format!("{prefix}{}", self.temporaries);
        self.temporaries += 1;
        name
    }

    pub fn reset_temporaries(&mut self) {
        self.temporaries = 0;
    }

    pub fn trim_last_newline(&mut self) {
        if self.buffer.ends_with('\n') {
            self.buffer.pop();
            self.mid_line = true;
        }
    }

    /// Appends already formatted text verbatim.
    pub fn append(&mut self, text: &str) {
        if !text.is_empty() {
            self.buffer.push_str(text);
            self.mid_line = !text.ends_with('\n');
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn into_string(self) -> String {
        self.buffer
    }
}

/// Scope guard returned by [`CodeWriter::indent`].
pub struct Indent<'a> {
    writer: &'a mut CodeWriter,
}

impl Deref for Indent<'_> {
    type Target = CodeWriter;

    fn deref(&self) -> &CodeWriter {
        self.writer
    }
}

impl DerefMut for Indent<'_> {
    fn deref_mut(&mut self) -> &mut CodeWriter {
        self.writer
    }
}

impl Drop for Indent<'_> {
    fn drop(&mut self) {
        self.writer.level -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;

    #[test]
    fn indentation_is_scoped() {
        let mut w = CodeWriter::new();
        w.line("if (x) {");
        {
            let mut inner = w.indent();
            inner.line("a();");
            let mut deeper = inner.indent();
            deeper.add("b(");
            deeper.add("c");
            deeper.line(");");
        }
        w.line("}");
        expect![[r#"
            if (x) {
                a();
                    b(c);
            }
        "#]]
        .assert_eq(w.as_str());
        assert_eq!(w.level(), 0);
    }

    #[test]
    fn embedded_newlines_are_indented() {
        let mut w = CodeWriter::with_level(1);
        w.line("x catch |err| switch (err) {\n    error.JSError => return false,\n}");
        assert_eq!(
            w.as_str(),
            "    x catch |err| switch (err) {\n        error.JSError => return false,\n    }\n"
        );
    }

    #[test]
    fn dedents_on_early_return() {
        fn fails(w: &mut CodeWriter) -> Result<(), ()> {
            let mut body = w.indent();
            body.line("partial");
            Err(())
        }
        let mut w = CodeWriter::new();
        assert!(fails(&mut w).is_err());
        assert_eq!(w.level(), 0);
    }

    #[test]
    fn temporaries_and_trimming() {
        let mut w = CodeWriter::new();
        assert_eq!(w.next_temporary("wtfString"), "wtfString0");
        assert_eq!(w.next_temporary("wtfString"), "wtfString1");
        w.reset_temporaries();
        assert_eq!(w.next_temporary("tmp"), "tmp0");

        w.line("f(");
        w.trim_last_newline();
        w.line(");");
        assert_eq!(w.as_str(), "f();\n");
    }
}
