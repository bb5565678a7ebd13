//! File-size distributions of an analysis.
//!
//! Sizes are in megabytes (bytes / 1e6). All series share one set of bin
//! edges spanning every plotted size, so input and output panels line up.

use serde::Serialize;

use super::Analysis;
use crate::scanner::FileRef;

/// Default number of bins.
pub const DEFAULT_BINS: usize = 100;

/// One labelled series of bin counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistogramSeries {
    /// Column label
    pub label: String,
    /// Count per bin
    pub counts: Vec<usize>,
}

/// Binned sizes of origin (input) and destination (output) files.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizeHistogram {
    /// `nbins + 1` ascending edges in MB
    pub edges: Vec<f64>,
    /// Origin series: twins and no-twins, or all
    pub input: Vec<HistogramSeries>,
    /// Destination series: twin targets, plus unrelated unless filtered
    pub output: Vec<HistogramSeries>,
}

impl SizeHistogram {
    /// Bin an analysis.
    ///
    /// # Arguments
    ///
    /// * `nbins` - Number of bins (at least 1)
    /// * `split_input` - Split origin files into twins and no-twins
    /// * `filter_output` - Keep only destinations that are a twin target
    ///
    /// Files whose size cannot be read are left out.
    #[must_use]
    pub fn build(analysis: &Analysis, nbins: usize, split_input: bool, filter_output: bool) -> Self {
        let nbins = nbins.max(1);
        let origins = analysis.origins();
        let destinations = analysis.destinations();
        let twins = analysis.twins();

        let input: Vec<(&str, Vec<f64>)> = if split_input {
            vec![
                ("input_twins", sizes_mb(twins.with_links().map(|i| &origins[i]))),
                ("input_no_twins", sizes_mb(twins.without_links().map(|i| &origins[i]))),
            ]
        } else {
            vec![("input_all", sizes_mb(origins.iter()))]
        };

        let targets = twins.targets();
        let mut output = vec![(
            "output_twins",
            sizes_mb(targets.iter().map(|&d| &destinations[d])),
        )];
        if !filter_output {
            output.push(("output_unrelated", sizes_mb(analysis.unrelated_destinations())));
        }

        let edges = bin_edges(
            input.iter().chain(output.iter()).flat_map(|(_, v)| v.iter().copied()),
            nbins,
        );
        let bin = |(label, sizes): (&str, Vec<f64>)| HistogramSeries {
            label: label.to_string(),
            counts: count(&sizes, &edges),
        };

        Self {
            input: input.into_iter().map(bin).collect(),
            output: output.into_iter().map(bin).collect(),
            edges,
        }
    }

    /// Number of bins.
    #[must_use]
    pub fn bins(&self) -> usize {
        self.edges.len().saturating_sub(1)
    }

    /// Input then output series, in column order.
    pub fn series(&self) -> impl Iterator<Item = &HistogramSeries> + '_ {
        self.input.iter().chain(self.output.iter())
    }
}

fn sizes_mb<'a>(files: impl Iterator<Item = &'a FileRef>) -> Vec<f64> {
    files
        .filter_map(|f| match f.size() {
            Ok(size) => Some(size as f64 / 1e6),
            Err(e) => {
                log::warn!("Left out of histogram: {e}");
                None
            }
        })
        .collect()
}

/// Evenly spaced edges over the data range; a degenerate range is widened
/// by half a unit each side, an empty one becomes `0..1`.
fn bin_edges(values: impl Iterator<Item = f64>, nbins: usize) -> Vec<f64> {
    let (mut lo, mut hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if lo > hi {
        (lo, hi) = (0.0, 1.0);
    } else if lo == hi {
        (lo, hi) = (lo - 0.5, hi + 0.5);
    }
    let width = (hi - lo) / nbins as f64;
    (0..=nbins).map(|i| lo + width * i as f64).collect()
}

/// Counts per bin; the last bin is closed on the right.
fn count(values: &[f64], edges: &[f64]) -> Vec<usize> {
    let nbins = edges.len() - 1;
    let lo = edges[0];
    let width = (edges[nbins] - lo) / nbins as f64;
    let mut counts = vec![0; nbins];
    for &v in values {
        let idx = (((v - lo) / width).floor() as usize).min(nbins - 1);
        counts[idx] += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::DiffSettings;
    use crate::scanner::FileMeta;

    fn file(path: &str, size: u64) -> FileRef {
        FileRef::with_metadata(
            path,
            FileMeta {
                size,
                modified: None,
                created: None,
            },
        )
    }

    #[test]
    fn test_bin_edges() {
        assert_eq!(bin_edges([0.0, 4.0].into_iter(), 4), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(bin_edges([2.0].into_iter(), 1), vec![1.5, 2.5]);
        assert_eq!(bin_edges(std::iter::empty(), 2), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_count_closes_last_bin() {
        let edges = vec![0.0, 1.0, 2.0];
        assert_eq!(count(&[0.0, 0.5, 1.0, 2.0], &edges), vec![2, 2]);
    }

    #[test]
    fn test_build_without_twins() {
        // Distinct names: no candidates, so nothing is read from disk.
        let origins = vec![file("/card/a.jpg", 1_000_000), file("/card/b.jpg", 3_000_000)];
        let destinations = vec![file("/arch/z.jpg", 2_000_000)];
        let analysis = Analysis::from_files(
            origins,
            destinations,
            &DiffSettings::default().with_parallel(false),
        )
        .unwrap();

        let split = SizeHistogram::build(&analysis, 2, true, true);
        assert_eq!(split.bins(), 2);
        let labels: Vec<&str> = split.series().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["input_twins", "input_no_twins", "output_twins"]);
        assert_eq!(split.input[0].counts, vec![0, 0]);
        assert_eq!(split.input[1].counts, vec![1, 1]);
        assert_eq!(split.output[0].counts, vec![0, 0]);

        let merged = SizeHistogram::build(&analysis, 2, false, false);
        let labels: Vec<&str> = merged.series().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["input_all", "output_twins", "output_unrelated"]);
        assert_eq!(merged.output[1].counts.iter().sum::<usize>(), 1);
    }
}
