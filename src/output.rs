use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ListResult, ProgressEvent, ProgressSink, RetrievalResult};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Lines,
    Json,
}

/// Machine-readable output: progress is dropped, results are printed as JSON.
pub struct JsonOutput;

impl JsonOutput {
    pub fn print_retrieval(result: &RetrievalResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_list(result: &ListResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Human-readable output: one status line per progress event on stderr.
pub struct LineOutput;

impl LineOutput {
    pub fn format_event(event: &ProgressEvent) -> String {
        let mut line = match event.source {
            Some(source) => format!("[{source}] {}", event.message),
            None => event.message.clone(),
        };
        if let Some(elapsed) = event.elapsed {
            line.push_str(&format!(" ({} ms)", elapsed.as_millis()));
        }
        line
    }

    pub fn print_retrieval(result: &RetrievalResult) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{} summary", result.source)?;
        writeln!(stdout, "  candidates:         {}", result.found)?;
        writeln!(stdout, "  accepted:           {}", result.accepted.len())?;
        writeln!(stdout, "  duplicates skipped: {}", result.skipped_duplicates)?;
        writeln!(stdout, "  filtered out:       {}", result.skipped_filtered)?;
        writeln!(stdout, "  private skipped:    {}", result.skipped_private)?;
        writeln!(stdout, "  failures:           {}", result.failures.len())?;
        for failure in &result.failures {
            writeln!(stdout, "    {}: {}", failure.item, failure.reason)?;
        }
        writeln!(stdout, "  catalog rows:       {}", result.catalog.len())?;
        Ok(())
    }

    pub fn print_list(result: &ListResult) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(
            stdout,
            "{} ({} rows)",
            result.catalog_path,
            result.datasets.len()
        )?;
        for entry in &result.datasets {
            writeln!(stdout, "{}\t{}\t{}", entry.title, entry.file_name, entry.link)?;
        }
        Ok(())
    }
}

impl ProgressSink for LineOutput {
    fn event(&self, event: ProgressEvent) {
        eprintln!("{}", Self::format_event(&event));
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::SourceTag;

    #[test]
    fn line_format_includes_source_and_latency() {
        let event = ProgressEvent {
            source: Some(SourceTag::Kaggle),
            message: "downloaded owner/data".to_string(),
            elapsed: Some(Duration::from_millis(42)),
        };
        assert_eq!(
            LineOutput::format_event(&event),
            "[kaggle] downloaded owner/data (42 ms)"
        );

        let bare = ProgressEvent {
            source: None,
            message: "reading catalog out/datasets_information.json".to_string(),
            elapsed: None,
        };
        assert_eq!(
            LineOutput::format_event(&bare),
            "reading catalog out/datasets_information.json"
        );
    }
}
