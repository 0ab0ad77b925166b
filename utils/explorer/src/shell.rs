use std::io::{self, BufRead, Write};

use tracing::debug;

use crate::canvas::TextCanvas;
use crate::command::{Command, USAGE, parse_command};
use crate::error::ExploreError;
use crate::layouts::LAYOUTS;
use crate::model::ModelUnit;
use crate::parameters::SetReport;
use crate::session::SessionController;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Line-oriented operator front end. Every problem is printed to the output
/// and the loop goes on; only I/O failures end it.
pub struct Shell<M: ModelUnit, W: Write> {
    controller: SessionController<M>,
    out: W,
}

impl<M: ModelUnit, W: Write> Shell<M, W> {
    pub fn new(controller: SessionController<M>, out: W) -> Self {
        Self { controller, out }
    }

    pub fn controller(&self) -> &SessionController<M> {
        &self.controller
    }

    /// Everything written so far.
    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn banner(&mut self) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(
            self.out,
            "Model {} has been setup. Key commands:",
            self.controller.config().application
        )?;
        for line in USAGE {
            writeln!(self.out, "{line}")?;
        }
        writeln!(self.out)?;
        writeln!(
            self.out,
            "Note that both disp and describe take values from the last simulation"
        )
    }

    /// Read commands until `quit` or end of input.
    pub fn run<R: BufRead>(&mut self, input: R, prompt: bool) -> io::Result<()> {
        if prompt {
            self.prompt()?;
        }
        for line in input.lines() {
            if self.execute_line(&line?)? == Flow::Quit {
                break;
            }
            if prompt {
                self.prompt()?;
            }
        }
        Ok(())
    }

    fn prompt(&mut self) -> io::Result<()> {
        write!(self.out, "> ")?;
        self.out.flush()
    }

    /// Blank lines and `#` comments are ignored.
    pub fn execute_line(&mut self, line: &str) -> io::Result<Flow> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(Flow::Continue);
        }
        let args: Vec<&str> = line.split_whitespace().collect();
        match parse_command(&args) {
            Ok(command) => self.execute(command),
            Err(message) => {
                writeln!(self.out, "Error: {message}")?;
                Ok(Flow::Continue)
            }
        }
    }

    pub fn execute(&mut self, command: Command) -> io::Result<Flow> {
        debug!(?command, "executing");
        let decimals = self.controller.config().decimals;
        match command {
            Command::Par(updates) => {
                let report = self.controller.set_parameters(updates);
                self.report(report)?;
            }
            Command::Init(updates) => {
                let report = self.controller.set_initial_values(updates);
                self.report(report)?;
            }
            Command::Simu {
                duration,
                mode,
                profile,
            } => {
                let mut canvas = TextCanvas::new(&mut self.out);
                let outcome = self.controller.run(mode, duration, profile, &mut canvas);
                canvas.finish()?;
                match outcome {
                    Ok(report) => {
                        if let Some(err) = report.render {
                            writeln!(self.out, "Error: {err}")?;
                        }
                    }
                    Err(err) => {
                        let attempted = matches!(
                            err,
                            ExploreError::Engine(_)
                                | ExploreError::Binding { .. }
                                | ExploreError::Capture(_)
                        );
                        writeln!(self.out, "Error: {err}")?;
                        if !attempted {
                            writeln!(self.out, "Error: No simulation done")?;
                        }
                    }
                }
            }
            Command::Newplot { layout, title } => {
                let plot = &self.controller.config().plot;
                let layout = layout.unwrap_or_else(|| plot.layout.clone());
                let title = title.unwrap_or_else(|| plot.title.clone());
                let mut canvas = TextCanvas::new(&mut self.out);
                let selected = self.controller.select_layout(&layout, &title, &mut canvas);
                canvas.finish()?;
                self.diagnose(selected)?;
            }
            Command::Show => {
                let mut canvas = TextCanvas::new(&mut self.out);
                let shown = self.controller.redisplay(&mut canvas);
                canvas.finish()?;
                self.diagnose(shown)?;
            }
            Command::Disp {
                filter,
                mode,
                decimals: requested,
            } => {
                let lines =
                    self.controller
                        .introspect()
                        .disp(&filter, mode, requested.unwrap_or(decimals));
                self.print(lines)?;
            }
            Command::Describe {
                name,
                decimals: requested,
            } => {
                let lines = self
                    .controller
                    .introspect()
                    .describe(&name, requested.unwrap_or(decimals));
                self.print(lines)?;
            }
            Command::Info => {
                let lines = self.controller.introspect().system_info();
                self.print(Ok(lines))?;
            }
            Command::Layouts => {
                writeln!(self.out, "{}", LAYOUTS.join(", "))?;
            }
            Command::Help => self.banner()?,
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn report(&mut self, report: SetReport) -> io::Result<()> {
        for diagnostic in report.diagnostics() {
            writeln!(self.out, "Error: {diagnostic}")?;
        }
        Ok(())
    }

    fn diagnose(&mut self, outcome: Result<(), ExploreError>) -> io::Result<()> {
        if let Err(err) = outcome {
            writeln!(self.out, "Error: {err}")?;
        }
        Ok(())
    }

    fn print(&mut self, lines: Result<Vec<String>, ExploreError>) -> io::Result<()> {
        match lines {
            Ok(lines) => {
                for line in lines {
                    writeln!(self.out, "{line}")?;
                }
                Ok(())
            }
            Err(err) => writeln!(self.out, "Error: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::models::BatchReactor;

    fn shell() -> Shell<BatchReactor, Vec<u8>> {
        let controller =
            SessionController::new(BatchReactor::new(), AppConfig::builtin().unwrap()).unwrap();
        Shell::new(controller, Vec::new())
    }

    fn output(shell: Shell<BatchReactor, Vec<u8>>) -> String {
        String::from_utf8(shell.into_inner()).unwrap()
    }

    #[test]
    fn test_errors_do_not_stop_the_loop() {
        let mut shell = shell();
        let script = "par Yx=1\nsimu cont\nfly\ndisp Y\nquit\ndisp Ks\n";
        shell.run(script.as_bytes(), false).unwrap();
        let text = output(shell);
        assert!(text.contains("Yx - seems not an accessible parameter"));
        assert!(text.contains("simulation must first be done with mode = initial"));
        assert!(text.contains("Unknown command: 'fly'"));
        assert!(text.contains("Y : 0.5"));
        assert!(!text.contains("Ks : 0.1"));
    }

    struct Closed;

    impl Write for Closed {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_plot_output_errors_propagate() {
        let controller =
            SessionController::new(BatchReactor::new(), AppConfig::builtin().unwrap()).unwrap();
        let mut shell = Shell::new(controller, Closed);
        let err = shell.execute_line("simu 1 fast").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        // The run itself completed before the output failed.
        assert_eq!(shell.controller().session().previous_final_time, 1.0);
    }

    #[test]
    fn test_simu_draws_current_layout() {
        let mut shell = shell();
        shell.execute_line("newplot PhasePlane Batch").unwrap();
        shell.execute_line("simu 2 fast").unwrap();
        assert_eq!(shell.controller().session().previous_final_time, 2.0);
        let text = output(shell);
        assert!(text.contains("figure: Batch (1x1)"));
        assert!(text.contains("bioreactor.c[2] vs bioreactor.c[1] b-"));
    }
}
