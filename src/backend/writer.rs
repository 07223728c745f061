//! Code writer - builds indented source text for every emitter
//!
//! Emitters for C, C++, Go, JavaScript, Kotlin and Swift share this buffer; only the indent unit
//! and comment leader differ between languages.

use std::fmt::Write;

/// A buffer for building source code with proper indentation
#[derive(Debug)]
pub struct CodeWriter {
    buffer: String,
    indent_level: usize,
    indent_str: &'static str,
}

impl Default for CodeWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeWriter {
    /// Four-space indentation (C, C++, Kotlin, Swift).
    pub fn new() -> Self {
        Self::with_indent("    ")
    }

    pub fn with_indent(indent_str: &'static str) -> Self {
        Self {
            buffer: String::new(),
            indent_level: 0,
            indent_str,
        }
    }

    /// Tab indentation, as gofmt writes it.
    pub fn go() -> Self {
        Self::with_indent("\t")
    }

    /// Two-space indentation for JavaScript modules.
    pub fn js() -> Self {
        Self::with_indent("  ")
    }

    /// Get the generated code
    pub fn finish(self) -> String {
        self.buffer
    }

    /// Get current buffer as string slice
    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    /// Write a line with current indentation
    pub fn line(&mut self, s: &str) {
        if s.is_empty() {
            self.buffer.push('\n');
            return;
        }
        self.write_indent();
        self.buffer.push_str(s);
        self.buffer.push('\n');
    }

    /// Write several lines, each at the current indentation
    pub fn lines<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for l in lines {
            self.line(l.as_ref());
        }
    }

    /// Write text verbatim, without indentation or newline
    pub fn write(&mut self, s: &str) {
        self.buffer.push_str(s);
    }

    /// Write formatted text
    pub fn writef(&mut self, args: std::fmt::Arguments<'_>) {
        let _ = self.buffer.write_fmt(args);
    }

    /// Write a blank line
    pub fn blank_line(&mut self) {
        self.buffer.push('\n');
    }

    /// Write indentation only
    pub fn write_indent(&mut self) {
        for _ in 0..self.indent_level {
            self.buffer.push_str(self.indent_str);
        }
    }

    /// Increase indent level
    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    /// Decrease indent level
    pub fn dedent(&mut self) {
        if self.indent_level > 0 {
            self.indent_level -= 1;
        }
    }

    /// Write a block with braces
    pub fn block<F>(&mut self, header: &str, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.block_with(header, "}", f);
    }

    /// Write a braced block with a custom closing line (`};`, `} else {`, `})`...)
    pub fn block_with<F>(&mut self, header: &str, close: &str, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.line(&format!("{} {{", header));
        self.indented(f);
        self.line(close);
    }

    /// Run `f` one level deeper
    pub fn indented<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.indent();
        f(self);
        self.dedent();
    }

    /// Write a `//` comment
    pub fn comment(&mut self, text: &str) {
        self.line(&format!("// {}", text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_emission() {
        let mut w = CodeWriter::new();
        w.line("int x = 1;");
        w.blank_line();
        w.line("int y = 2;");
        assert_eq!(w.finish(), "int x = 1;\n\nint y = 2;\n");
    }

    #[test]
    fn test_block_indentation() {
        let mut w = CodeWriter::new();
        w.block("void f(void)", |w| {
            w.line("g();");
            w.block("if (x)", |w| w.line("h();"));
        });
        assert_eq!(w.finish(), "void f(void) {\n    g();\n    if (x) {\n        h();\n    }\n}\n");
    }

    #[test]
    fn test_go_tabs_and_custom_close() {
        let mut w = CodeWriter::go();
        w.block_with("var x = map[int]int", "}", |w| w.line("1: 2,"));
        assert_eq!(w.finish(), "var x = map[int]int {\n\t1: 2,\n}\n");
    }

    #[test]
    fn test_empty_lines_carry_no_indent() {
        let mut w = CodeWriter::js();
        w.indented(|w| {
            w.line("a;");
            w.line("");
        });
        assert_eq!(w.as_str(), "  a;\n\n");
    }
}
