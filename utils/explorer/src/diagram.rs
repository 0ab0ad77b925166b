use std::borrow::Cow;

use thiserror::Error;
use tracing::{debug, warn};

use crate::canvas::{Canvas, Color, Figure, LineStyle, Mark, Pen, Trace};
use crate::error::ExploreError;
use crate::layouts;
use crate::model::ResultSet;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("series `{0}` is not in the simulation result")]
    MissingSeries(String),
    #[error("series `{x}` and `{y}` differ in length")]
    LengthMismatch { x: String, y: String },
}

/// Pens handed out in turn, one per rendered result set.
#[derive(Debug, Clone)]
pub struct StyleCycle {
    styles: Vec<LineStyle>,
    next: usize,
}

impl StyleCycle {
    pub fn new(styles: Vec<LineStyle>) -> Self {
        Self { styles, next: 0 }
    }

    pub fn next_style(&mut self) -> LineStyle {
        if self.styles.is_empty() {
            return LineStyle::Solid;
        }
        let style = self.styles[self.next % self.styles.len()];
        self.next = (self.next + 1) % self.styles.len();
        style
    }

    pub fn restart(&mut self) {
        self.next = 0;
    }
}

impl Default for StyleCycle {
    fn default() -> Self {
        Self::new(vec![
            LineStyle::Solid,
            LineStyle::Dashed,
            LineStyle::Dotted,
            LineStyle::DashDot,
        ])
    }
}

type DrawFn = Box<dyn Fn(&ResultSet, LineStyle, &mut dyn Canvas) -> Result<(), RenderError>>;

/// A deferred drawing step, bound when a layout is selected and evaluated
/// against every new result set.
pub struct DrawDirective {
    panel: usize,
    series: Vec<String>,
    draw: DrawFn,
}

impl std::fmt::Debug for DrawDirective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawDirective")
            .field("panel", &self.panel)
            .field("series", &self.series)
            .finish_non_exhaustive()
    }
}

fn lookup<'a>(results: &'a ResultSet, name: &str) -> Result<&'a [f64], RenderError> {
    results
        .series(name)
        .ok_or_else(|| RenderError::MissingSeries(name.to_string()))
}

fn traces<'a>(
    results: &'a ResultSet,
    x: &'a str,
    y: &'a str,
) -> Result<(Trace<'a>, Trace<'a>), RenderError> {
    let x_samples = lookup(results, x)?;
    let y_samples = lookup(results, y)?;
    if x_samples.len() != y_samples.len() {
        return Err(RenderError::LengthMismatch {
            x: x.to_string(),
            y: y.to_string(),
        });
    }
    Ok((
        Trace {
            name: Cow::Borrowed(x),
            samples: Cow::Borrowed(x_samples),
        },
        Trace {
            name: Cow::Borrowed(y),
            samples: Cow::Borrowed(y_samples),
        },
    ))
}

impl DrawDirective {
    /// `y` against `x`, drawn with the pending line style.
    pub fn plot(panel: usize, x: &str, y: &str, color: Color) -> Self {
        let (x_name, y_name) = (x.to_string(), y.to_string());
        Self {
            panel,
            series: vec![x_name.clone(), y_name.clone()],
            draw: Box::new(move |results, style, canvas| {
                let (x, y) = traces(results, &x_name, &y_name)?;
                let pen = Pen {
                    color,
                    mark: Mark::Line(style),
                };
                canvas.plot(panel, &x, &y, pen);
                Ok(())
            }),
        }
    }

    /// `-y` against `x`, for rates the model reports with consumption sign.
    pub fn plot_negated(panel: usize, x: &str, y: &str, color: Color) -> Self {
        let (x_name, y_name) = (x.to_string(), y.to_string());
        Self {
            panel,
            series: vec![x_name.clone(), y_name.clone()],
            draw: Box::new(move |results, style, canvas| {
                let (x, y) = traces(results, &x_name, &y_name)?;
                let negated = Trace {
                    name: Cow::Owned(format!("-{}", y.name)),
                    samples: Cow::Owned(y.samples.iter().map(|value| -value).collect()),
                };
                let pen = Pen {
                    color,
                    mark: Mark::Line(style),
                };
                canvas.plot(panel, &x, &negated, pen);
                Ok(())
            }),
        }
    }

    /// Markers only; ignores the style cycle.
    pub fn scatter(panel: usize, x: &str, y: &str, color: Color, marker: char) -> Self {
        let (x_name, y_name) = (x.to_string(), y.to_string());
        Self {
            panel,
            series: vec![x_name.clone(), y_name.clone()],
            draw: Box::new(move |results, _style, canvas| {
                let (x, y) = traces(results, &x_name, &y_name)?;
                let pen = Pen {
                    color,
                    mark: Mark::Marker(marker),
                };
                canvas.plot(panel, &x, &y, pen);
                Ok(())
            }),
        }
    }

    pub fn legend(panel: usize, labels: &[&str]) -> Self {
        let labels: Vec<String> = labels.iter().map(|label| label.to_string()).collect();
        Self {
            panel,
            series: Vec::new(),
            draw: Box::new(move |_results, _style, canvas| {
                let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
                canvas.legend(panel, &labels);
                Ok(())
            }),
        }
    }

    pub fn retitle(panel: usize, title: &str) -> Self {
        let title = title.to_string();
        Self {
            panel,
            series: Vec::new(),
            draw: Box::new(move |_results, _style, canvas| {
                canvas.retitle(panel, &title);
                Ok(())
            }),
        }
    }

    pub fn panel(&self) -> usize {
        self.panel
    }

    /// Result series this directive reads, `time` included.
    pub fn series(&self) -> &[String] {
        &self.series
    }

    pub fn uses_time_axis(&self) -> bool {
        self.series.iter().any(|name| name == ResultSet::TIME)
    }

    pub fn evaluate(
        &self,
        results: &ResultSet,
        style: LineStyle,
        canvas: &mut dyn Canvas,
    ) -> Result<(), RenderError> {
        (self.draw)(results, style, canvas)
    }
}

/// A named figure and its directives, as produced by a layout preset.
#[derive(Debug)]
pub struct Layout {
    pub figure: Figure,
    pub directives: Vec<DrawDirective>,
}

/// The current plot layout and the last result set drawn into it.
#[derive(Debug)]
pub struct DiagramRegistry {
    layout_name: String,
    layout: Layout,
    styles: StyleCycle,
    latest: Option<ResultSet>,
}

impl DiagramRegistry {
    pub fn new(name: &str, title: &str) -> Result<Self, ExploreError> {
        let layout = layouts::build(name, title)
            .ok_or_else(|| ExploreError::UnknownLayout(name.to_string()))?;
        Ok(Self {
            layout_name: name.to_string(),
            layout,
            styles: StyleCycle::default(),
            latest: None,
        })
    }

    /// Replace the directive list with a preset and open its figure. An
    /// unknown name leaves the registry untouched.
    pub fn select_layout(
        &mut self,
        name: &str,
        title: &str,
        canvas: &mut dyn Canvas,
    ) -> Result<(), ExploreError> {
        let layout = layouts::build(name, title)
            .ok_or_else(|| ExploreError::UnknownLayout(name.to_string()))?;
        debug!(layout = name, directives = layout.directives.len(), "layout selected");
        self.layout_name = name.to_string();
        self.layout = layout;
        self.styles.restart();
        canvas.figure(&self.layout.figure);
        Ok(())
    }

    /// Draw `results` with the next line style and keep them for `redisplay`.
    pub fn render(
        &mut self,
        results: ResultSet,
        canvas: &mut dyn Canvas,
    ) -> Result<(), RenderError> {
        let outcome = Self::draw(&self.layout, &mut self.styles, &results, canvas);
        self.latest = Some(results);
        outcome
    }

    /// Draw the stored result set again without simulating.
    pub fn redisplay(&mut self, canvas: &mut dyn Canvas) -> Result<(), ExploreError> {
        let results = self.latest.as_ref().ok_or(ExploreError::NothingToShow)?;
        Self::draw(&self.layout, &mut self.styles, results, canvas)?;
        Ok(())
    }

    /// Evaluates every directive; the first failure is returned after all ran.
    fn draw(
        layout: &Layout,
        styles: &mut StyleCycle,
        results: &ResultSet,
        canvas: &mut dyn Canvas,
    ) -> Result<(), RenderError> {
        let style = styles.next_style();
        let mut first_error = None;
        for directive in &layout.directives {
            if let Err(err) = directive.evaluate(results, style, canvas) {
                warn!(panel = directive.panel(), "{err}");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn layout_name(&self) -> &str {
        &self.layout_name
    }

    pub fn figure(&self) -> &Figure {
        &self.layout.figure
    }

    pub fn directives(&self) -> &[DrawDirective] {
        &self.layout.directives
    }

    pub fn latest(&self) -> Option<&ResultSet> {
        self.latest.as_ref()
    }

    /// Series the directives need from the model, `time` excluded.
    pub fn referenced_series(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self.layout.directives.iter().flat_map(DrawDirective::series) {
            if name != ResultSet::TIME && !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Null;

    impl Canvas for Null {
        fn figure(&mut self, _figure: &Figure) {}
        fn plot(&mut self, _panel: usize, _x: &Trace<'_>, _y: &Trace<'_>, _pen: Pen) {}
        fn legend(&mut self, _panel: usize, _labels: &[&str]) {}
        fn retitle(&mut self, _panel: usize, _title: &str) {}
    }

    #[test]
    fn test_style_cycle_wraps() {
        let mut cycle = StyleCycle::default();
        let tokens: Vec<_> = (0..5).map(|_| cycle.next_style().token()).collect();
        assert_eq!(tokens, vec!["-", "--", ":", "-.", "-"]);
        cycle.restart();
        assert_eq!(cycle.next_style(), LineStyle::Solid);
    }

    #[test]
    fn test_unknown_layout_keeps_registry() {
        let mut registry = DiagramRegistry::new("PhasePlane", "t").unwrap();
        let err = registry
            .select_layout("Spiral", "t", &mut Null)
            .unwrap_err();
        assert!(matches!(err, ExploreError::UnknownLayout(name) if name == "Spiral"));
        assert_eq!(registry.layout_name(), "PhasePlane");
        assert_eq!(registry.directives().len(), 1);
    }

    #[test]
    fn test_redisplay_needs_result() {
        let mut registry = DiagramRegistry::new("TimeSeries", "t").unwrap();
        assert!(matches!(
            registry.redisplay(&mut Null),
            Err(ExploreError::NothingToShow)
        ));
    }
}
