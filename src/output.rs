use std::io::{self, Write};

use serde::Serialize;

use crate::app::{BatchResult, ItemStatus, ProgressEvent, ProgressSink};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Console,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_batch(result: &BatchResult) -> io::Result<()> {
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

/// Human-readable progress on stderr.
pub struct ConsoleOutput;

impl ConsoleOutput {
    pub fn print_summary(result: &BatchResult) {
        let green = "\x1b[32m";
        let yellow = "\x1b[33m";
        let cyan = "\x1b[36m";
        let red = "\x1b[31m";
        let reset = "\x1b[0m";

        println!("{cyan}ligand-harvester summary{reset}");
        println!("{green}harvested: {}{reset}", result.harvested());
        println!(
            "{yellow}not in database: {}{reset}",
            result.count(ItemStatus::NotFound)
        );
        println!("{red}failed: {}{reset}", result.count(ItemStatus::Failed));

        for item in &result.items {
            match (&item.report, &item.error) {
                (Some(report), _) => {
                    println!(
                        "{green}+ {} -> {} (CID {}){reset}",
                        item.descriptor, report.compound.display_name, report.compound.identifier
                    );
                    println!(
                        "{green}   pubchem rows: {}, zinc rows: {}, files: {}{reset}",
                        report.pubchem_rows,
                        report
                            .zinc_rows
                            .map(|rows| rows.to_string())
                            .unwrap_or_else(|| "skipped".to_string()),
                        report.files.structures.len()
                    );
                }
                (None, Some(error)) if item.status == ItemStatus::NotFound => {
                    println!("{yellow}- {}: {error}{reset}", item.descriptor);
                }
                (None, error) => {
                    println!(
                        "{red}x {}: {}{reset}",
                        item.descriptor,
                        error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
        }
    }
}

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => eprintln!("{}", event.message),
        }
    }
}
