//! Progress reporting using indicatif.
//!
//! Library stages report through [`ProgressCallback`]; the binary plugs in
//! [`Progress`], which draws one bar per running phase. Phase names are the
//! `PHASE_*` constants below.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Recursive enumeration of a tree.
pub const PHASE_WALKING: &str = "walking";
/// Cheap-filter matching of origin against destination.
pub const PHASE_CANDIDATES: &str = "candidates";
/// Content confirmation of candidate pairs.
pub const PHASE_TWINS: &str = "twins";
/// Placing origin files into the archive.
pub const PHASE_COPY: &str = "copy";

/// Progress callback for the matching and copy pipelines.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - One of the `PHASE_*` names
    /// * `total` - Number of items in the phase, 0 when unknown
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Called for each item processed.
    ///
    /// # Arguments
    ///
    /// * `current` - Items done so far (1-based)
    /// * `path` - Path just processed
    fn on_progress(&self, current: usize, path: &str);

    /// Called with the size of a file once it has been read or copied.
    fn on_item_completed(&self, _bytes: u64) {}

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: &str);

    /// Free-form status line.
    fn on_message(&self, _message: &str) {}
}

/// Terminal progress bars.
pub struct Progress {
    multi: MultiProgress,
    /// Running phases, most recent last.
    bars: Mutex<Vec<(String, ProgressBar)>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, nothing is drawn.
    ///
    /// # Examples
    ///
    /// ```
    /// use photoclassify::progress::Progress;
    ///
    /// let progress = Progress::new(false);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(Vec::new()),
            quiet,
        }
    }

    fn bars(&self) -> MutexGuard<'_, Vec<(String, ProgressBar)>> {
        self.bars.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} files")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn bar_style(phase: &str) -> ProgressStyle {
        let template = if phase == PHASE_COPY {
            "[{elapsed_precise}] [{bar:40.green/blue}] {pos}/{len} {msg} {per_sec} (ETA: {eta})"
        } else {
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})"
        };
        ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█>-")
    }

    fn label(phase: &str) -> &'static str {
        match phase {
            PHASE_WALKING => "Walking",
            PHASE_CANDIDATES => "Matching names",
            PHASE_TWINS => "Comparing contents",
            PHASE_COPY => "Copying",
            _ => "Working",
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }

        let pb = if phase == PHASE_WALKING || total == 0 {
            let pb = self.multi.add(ProgressBar::new_spinner());
            pb.set_style(Self::spinner_style());
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            let pb = self.multi.add(ProgressBar::new(total as u64));
            pb.set_style(Self::bar_style(phase));
            pb
        };
        pb.set_message(Self::label(phase));

        let mut bars = self.bars();
        if let Some(pos) = bars.iter().position(|(name, _)| name == phase) {
            let (_, previous) = bars.remove(pos);
            previous.finish_and_clear();
        }
        bars.push((phase.to_string(), pb));
    }

    fn on_progress(&self, current: usize, path: &str) {
        if self.quiet {
            return;
        }
        if let Some((_, pb)) = self.bars().last() {
            pb.set_position(current as u64);
            pb.set_message(truncate_path(path, 30));
        }
    }

    fn on_item_completed(&self, bytes: u64) {
        if self.quiet {
            return;
        }
        if let Some((_, pb)) = self.bars().iter().find(|(name, _)| name == PHASE_COPY) {
            pb.tick();
        }
        log::trace!("item completed ({bytes} bytes)");
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }
        let mut bars = self.bars();
        if let Some(pos) = bars.iter().position(|(name, _)| name == phase) {
            let (_, pb) = bars.remove(pos);
            pb.finish_with_message(format!("{} complete", Self::label(phase)));
        }
    }

    fn on_message(&self, message: &str) {
        if self.quiet {
            return;
        }
        let _ = self.multi.println(message);
    }
}

/// Shorten a path to its file name when it does not fit.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let count = file_name.chars().count();
    if count + 4 > max_len {
        let tail: String = file_name.chars().skip(count + 3 - max_len).collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
