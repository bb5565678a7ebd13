//! Plain-text listing of origin files grouped by relation.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use super::Analysis;
use crate::matching::Relations;

/// Which relation sections to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportSections {
    /// "With candidates" / "Without candidates"
    Candidates,
    /// "With twins" / "Without twins"
    #[default]
    Twins,
    /// Candidates sections followed by twins sections
    Both,
}

/// Write the report.
///
/// Each section starts with a heading underlined by `=`. Entries are
/// `\t{n:>4}. path` when `numbered`, plain `\tpath` otherwise. With
/// `level_two`, each entry of a "With" section lists its related
/// destination paths beneath it as `\t\t\t\t- path`. Origins without a
/// twin whose comparison failed are left out of "Without twins" and listed
/// under a trailing "Could not compare" section, written only when one
/// exists.
///
/// # Errors
///
/// Propagates write failures.
pub fn write_report(
    analysis: &Analysis,
    sections: ReportSections,
    numbered: bool,
    level_two: bool,
    out: &mut dyn Write,
) -> io::Result<()> {
    if matches!(sections, ReportSections::Candidates | ReportSections::Both) {
        let candidates = analysis.candidates();
        write_relation(analysis, candidates, "candidates", &[], numbered, level_two, out)?;
    }
    if matches!(sections, ReportSections::Twins | ReportSections::Both) {
        let unknown = analysis.unresolved_indices();
        write_relation(analysis, analysis.twins(), "twins", &unknown, numbered, level_two, out)?;
        if !unknown.is_empty() {
            write_heading("Could not compare", out)?;
            for (n, &i) in unknown.iter().enumerate() {
                write_entry(analysis, i, n + 1, numbered, out)?;
            }
        }
    }
    Ok(())
}

fn write_relation(
    analysis: &Analysis,
    relation: &Relations,
    noun: &str,
    unknown: &[usize],
    numbered: bool,
    level_two: bool,
    out: &mut dyn Write,
) -> io::Result<()> {
    let with: Vec<usize> = relation.with_links().collect();
    let without: Vec<usize> = relation
        .without_links()
        .filter(|i| !unknown.contains(i))
        .collect();

    write_heading(&format!("With {noun}"), out)?;
    for (n, &i) in with.iter().enumerate() {
        write_entry(analysis, i, n + 1, numbered, out)?;
        if level_two {
            for &d in relation.get(i) {
                writeln!(out, "\t\t\t\t- {}", analysis.destinations()[d].path().display())?;
            }
        }
    }

    write_heading(&format!("Without {noun}"), out)?;
    for (n, &i) in without.iter().enumerate() {
        write_entry(analysis, i, n + 1, numbered, out)?;
    }
    Ok(())
}

fn write_heading(name: &str, out: &mut dyn Write) -> io::Result<()> {
    write!(out, "\n\n{}:\n{}\n", name, "=".repeat(name.chars().count() + 1))
}

fn write_entry(
    analysis: &Analysis,
    origin: usize,
    number: usize,
    numbered: bool,
    out: &mut dyn Write,
) -> io::Result<()> {
    let path = analysis.origins()[origin].path().display();
    if numbered {
        writeln!(out, "\t{number:>4}. {path}")
    } else {
        writeln!(out, "\t{path}")
    }
}
