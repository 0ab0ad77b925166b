//! Plot layout presets for the batch cultivation application.

use crate::canvas::{Color, Figure, Panel};
use crate::diagram::{DrawDirective, Layout};
use crate::model::ResultSet;

const TIME: &str = ResultSet::TIME;
const X: &str = "bioreactor.c[1]";
const S: &str = "bioreactor.c[2]";
const MU: &str = "bioreactor.culture.q[1]";
const QS: &str = "bioreactor.culture.q[2]";
const MU_DIRECT: &str = "bioreactor.culture.mu";

const TIME_LABEL: &str = "Time [h]";

pub const LAYOUTS: &[&str] = &[
    "TimeSeries",
    "TimeSeries2",
    "Textbook_1",
    "Textbook_2",
    "Demo_1",
    "Demo_2",
    "PhasePlane",
];

fn panel(title: Option<&str>, ylabel: &str, xlabel: Option<&str>) -> Panel {
    Panel {
        title: title.map(str::to_string),
        ylabel: ylabel.to_string(),
        xlabel: xlabel.map(str::to_string),
    }
}

/// Two stacked panels sharing the time axis; the title goes on top.
fn stacked(title: &str, upper: &str, lower: &str) -> Figure {
    Figure {
        rows: 2,
        cols: 1,
        panels: vec![
            panel(Some(title), upper, None),
            panel(None, lower, Some(TIME_LABEL)),
        ],
    }
}

/// Build the named preset, or `None` if there is no such layout.
pub fn build(name: &str, title: &str) -> Option<Layout> {
    let layout = match name {
        "TimeSeries" => Layout {
            figure: stacked(title, "X and S [g/L]", "mu [1/h]"),
            directives: vec![
                DrawDirective::plot(0, TIME, X, Color::Red),
                DrawDirective::plot(0, TIME, S, Color::Blue),
                DrawDirective::legend(0, &["X", "S"]),
                DrawDirective::plot(1, TIME, MU, Color::Red),
            ],
        },
        "TimeSeries2" => Layout {
            figure: stacked(title, "X and S [g/L]", "mu [1/h]"),
            directives: vec![
                DrawDirective::plot(0, TIME, X, Color::Red),
                DrawDirective::plot(0, TIME, S, Color::Blue),
                DrawDirective::plot(1, TIME, MU_DIRECT, Color::Red),
            ],
        },
        "Textbook_1" => Layout {
            figure: stacked(title, "S [g/L]", "X [g/L]"),
            directives: vec![
                DrawDirective::plot(0, TIME, S, Color::Blue),
                DrawDirective::plot(1, TIME, X, Color::Blue),
            ],
        },
        // Row-major: 0 = upper left, 1 = upper right, 2 = lower left, 3 = lower right.
        "Textbook_2" => Layout {
            figure: Figure {
                rows: 2,
                cols: 2,
                panels: vec![
                    panel(Some(title), "S [g/L]", None),
                    panel(Some(title), "qS [g/(L*h)]", None),
                    panel(None, "X [g/L]", Some(TIME_LABEL)),
                    panel(None, "mu [1/h]", Some(TIME_LABEL)),
                ],
            },
            directives: vec![
                DrawDirective::plot(0, TIME, S, Color::Blue),
                DrawDirective::plot(2, TIME, X, Color::Blue),
                DrawDirective::retitle(1, "- microscopic world"),
                DrawDirective::plot_negated(1, TIME, QS, Color::Blue),
                DrawDirective::plot(3, TIME, MU, Color::Blue),
            ],
        },
        "Demo_1" => Layout {
            figure: stacked(title, "S [g/L]", "X [g/L]"),
            directives: vec![
                DrawDirective::plot(0, TIME, S, Color::Blue),
                DrawDirective::plot(1, TIME, X, Color::Red),
            ],
        },
        "Demo_2" => Layout {
            figure: stacked(title, "S [g/L]", "X [g/L]"),
            directives: vec![
                DrawDirective::scatter(0, TIME, S, Color::Blue, '*'),
                DrawDirective::scatter(1, TIME, X, Color::Red, '*'),
            ],
        },
        "PhasePlane" => Layout {
            figure: Figure {
                rows: 1,
                cols: 1,
                panels: vec![panel(Some(title), "S [g/L]", Some("X [g/L]"))],
            },
            directives: vec![DrawDirective::plot(0, X, S, Color::Blue)],
        },
        _ => return None,
    };
    Some(layout)
}
