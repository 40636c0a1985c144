//! Completion summary printed after a successful run

use std::path::PathBuf;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::install::NucleusHandle;

#[derive(Debug, Clone)]
pub struct CompletionReport {
    pub title: &'static str,
    pub rows: Vec<(&'static str, String)>,
    pub config_path: PathBuf,
    pub log_path: PathBuf,
    /// `None` when the nucleus was left to the service manager
    pub nucleus: Option<NucleusHandle>,
}

impl CompletionReport {
    pub fn print(&self) {
        let mut stdout = StandardStream::stdout(ColorChoice::Auto);
        // Report output is best-effort; the run already succeeded
        let _ = self.render(&mut stdout);
    }

    pub fn render<W: WriteColor>(&self, out: &mut W) -> std::io::Result<()> {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
        writeln!(out, "\n✅ {}", self.title)?;
        out.reset()?;

        for (label, value) in &self.rows {
            writeln!(out, "   {label}: {value}")?;
        }
        writeln!(out, "   Config: {}", self.config_path.display())?;

        match self.nucleus {
            Some(handle) => {
                out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
                writeln!(out, "   Nucleus: running (PID {})", handle.pid)?;
                out.reset()?;
            }
            None => {
                out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
                writeln!(out, "   Nucleus: not started (service manager will start it)")?;
                out.reset()?;
            }
        }

        out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
        writeln!(out, "\n📍 Logs: {}", self.log_path.display())?;
        out.reset()?;
        Ok(())
    }
}
