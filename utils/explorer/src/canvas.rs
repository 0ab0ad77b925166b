use std::borrow::Cow;
use std::io::{self, Write};

use tracing::warn;

/// Line style token taken from the rotating style cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Solid,
    Dashed,
    Dotted,
    DashDot,
}

impl LineStyle {
    pub fn token(self) -> &'static str {
        match self {
            LineStyle::Solid => "-",
            LineStyle::Dashed => "--",
            LineStyle::Dotted => ":",
            LineStyle::DashDot => "-.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Blue,
}

impl Color {
    pub fn token(self) -> char {
        match self {
            Color::Red => 'r',
            Color::Blue => 'b',
        }
    }
}

/// How samples are connected on the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Line(LineStyle),
    Marker(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pen {
    pub color: Color,
    pub mark: Mark,
}

impl Pen {
    pub fn token(&self) -> String {
        match self.mark {
            Mark::Line(style) => format!("{}{}", self.color.token(), style.token()),
            Mark::Marker(marker) => format!("{}{}", self.color.token(), marker),
        }
    }
}

/// One subplot. Panels are numbered row-major from zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub title: Option<String>,
    pub ylabel: String,
    pub xlabel: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub rows: usize,
    pub cols: usize,
    pub panels: Vec<Panel>,
}

/// A named sequence of samples handed to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace<'a> {
    pub name: Cow<'a, str>,
    pub samples: Cow<'a, [f64]>,
}

/// Renderer driven by the diagram registry. Pixels are the implementor's
/// business; the registry only says what goes where.
pub trait Canvas {
    fn figure(&mut self, figure: &Figure);

    fn plot(&mut self, panel: usize, x: &Trace<'_>, y: &Trace<'_>, pen: Pen);

    fn legend(&mut self, panel: usize, labels: &[&str]);

    fn retitle(&mut self, panel: usize, title: &str);
}

/// Terminal renderer: one summary line per drawn trace.
///
/// Drawing calls cannot fail, so the first write error is kept and later
/// calls are dropped; [`TextCanvas::finish`] hands it back.
pub struct TextCanvas<W: Write> {
    out: W,
    labels: Vec<String>,
    error: Option<io::Error>,
}

impl<W: Write> TextCanvas<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            labels: Vec::new(),
            error: None,
        }
    }

    /// The writer, or the first error met while drawing.
    pub fn finish(self) -> io::Result<W> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.out),
        }
    }

    fn label(&self, panel: usize) -> String {
        self.labels
            .get(panel)
            .cloned()
            .unwrap_or_else(|| "?".to_string())
    }

    fn emit(&mut self, line: &str) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = writeln!(self.out, "{line}") {
            warn!("canvas output failed: {err}");
            self.error = Some(err);
        }
    }
}

impl<W: Write> Canvas for TextCanvas<W> {
    fn figure(&mut self, figure: &Figure) {
        self.labels = figure
            .panels
            .iter()
            .map(|panel| panel.ylabel.clone())
            .collect();
        let title = figure
            .panels
            .iter()
            .find_map(|panel| panel.title.as_deref())
            .unwrap_or("");
        let line = format!("figure: {title} ({}x{})", figure.rows, figure.cols);
        self.emit(&line);
    }

    fn plot(&mut self, panel: usize, x: &Trace<'_>, y: &Trace<'_>, pen: Pen) {
        let last = match (x.samples.last(), y.samples.last()) {
            (Some(x_last), Some(y_last)) => format!("last ({x_last:.3}, {y_last:.3})"),
            _ => "empty".to_string(),
        };
        let line = format!(
            "  [{panel}: {}] {} vs {} {:<4} {} pts, {last}",
            self.label(panel),
            y.name,
            x.name,
            pen.token(),
            y.samples.len()
        );
        self.emit(&line);
    }

    fn legend(&mut self, panel: usize, labels: &[&str]) {
        let line = format!(
            "  [{panel}: {}] legend {}",
            self.label(panel),
            labels.join(", ")
        );
        self.emit(&line);
    }

    fn retitle(&mut self, panel: usize, title: &str) {
        let line = format!("  [{panel}: {}] title {title}", self.label(panel));
        self.emit(&line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Closed;

    impl Write for Closed {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn figure() -> Figure {
        Figure {
            rows: 1,
            cols: 1,
            panels: vec![Panel {
                title: Some("Batch".to_string()),
                ylabel: "S [g/L]".to_string(),
                xlabel: None,
            }],
        }
    }

    fn trace<'a>(name: &'a str, samples: &'a [f64]) -> Trace<'a> {
        Trace {
            name: Cow::Borrowed(name),
            samples: Cow::Borrowed(samples),
        }
    }

    #[test]
    fn test_lines_carry_panel_label() {
        let mut canvas = TextCanvas::new(Vec::new());
        canvas.figure(&figure());
        let pen = Pen {
            color: Color::Blue,
            mark: Mark::Line(LineStyle::Dashed),
        };
        canvas.plot(0, &trace("time", &[0.0, 1.0]), &trace("S", &[10.0, 9.5]), pen);
        canvas.legend(3, &["S"]);
        let text = String::from_utf8(canvas.finish().unwrap()).unwrap();
        assert!(text.contains("figure: Batch (1x1)"));
        assert!(text.contains("[0: S [g/L]] S vs time b--  2 pts, last (1.000, 9.500)"));
        assert!(text.contains("[3: ?] legend S"));
    }

    #[test]
    fn test_write_error_is_returned() {
        let mut canvas = TextCanvas::new(Closed);
        canvas.figure(&figure());
        canvas.retitle(0, "again");
        let err = canvas.finish().err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
