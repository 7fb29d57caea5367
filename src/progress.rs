//! Progress reporting and display
//!
//! The batch drivers report per-entry status through [`ProgressReporter`]
//! so that display concerns stay out of the conversion logic.

use std::sync::Arc;

/// Status of a single entry being processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    /// Currently being converted
    Processing,
    /// Destination already present
    Skipped,
    /// Successfully converted
    Done,
    /// Failed with error
    Failed(String),
}

/// Phase of the overall batch operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchPhase {
    /// Reading the JSON index
    LoadingIndex,
    /// Walking the input directory
    Scanning,
    /// Converting images
    Converting,
    /// Completed successfully
    Completed,
    /// Failed with error
    Failed(String),
}

/// Progress reporter trait - implement this for different display backends.
pub trait ProgressReporter: Send + Sync {
    /// Set the overall batch phase.
    fn set_phase(&self, phase: BatchPhase);

    /// Register entries to track (call before processing starts).
    fn register_entries(&self, entries: Vec<String>);

    /// Update the status of a specific entry.
    fn update_entry(&self, entry: &str, status: EntryStatus);

    /// Finish and clean up the display.
    fn finish(&self);
}

/// A no-op reporter for when progress display is disabled.
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn set_phase(&self, _phase: BatchPhase) {}
    fn register_entries(&self, _entries: Vec<String>) {}
    fn update_entry(&self, _entry: &str, _status: EntryStatus) {}
    fn finish(&self) {}
}

/// Statistics collected during processing.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stats {
    pub total_entries: usize,
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Stats {
    fn record(&mut self, status: &EntryStatus) {
        match status {
            EntryStatus::Done => self.converted += 1,
            EntryStatus::Skipped => self.skipped += 1,
            EntryStatus::Failed(_) => self.failed += 1,
            EntryStatus::Processing => {}
        }
    }
}

fn print_summary(stats: &Stats, started: std::time::Instant) {
    eprintln!();
    eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    eprintln!("📊 Summary");
    eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    eprintln!("   🖼️  Entries:    {} total", stats.total_entries);
    eprintln!("   ✅ Converted:  {}", stats.converted);
    if stats.skipped > 0 {
        eprintln!("   ⏭️  Skipped:    {}", stats.skipped);
    }
    if stats.failed > 0 {
        eprintln!("   ❌ Failed:     {}", stats.failed);
    }
    eprintln!("   ⏱️  Duration:   {:.2}s", started.elapsed().as_secs_f64());
    eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// A simple reporter that just prints to stderr (for non-TTY).
pub struct SimpleReporter {
    stats: std::sync::RwLock<Stats>,
    started: std::time::Instant,
}

impl SimpleReporter {
    pub fn new() -> Self {
        Self {
            stats: Default::default(),
            started: std::time::Instant::now(),
        }
    }

    pub fn stats(&self) -> Stats {
        self.stats.read().unwrap().clone()
    }
}

impl Default for SimpleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for SimpleReporter {
    fn set_phase(&self, phase: BatchPhase) {
        let (emoji, msg) = match phase {
            BatchPhase::LoadingIndex => ("📋", "Loading index...".to_string()),
            BatchPhase::Scanning => ("🔍", "Scanning input directory...".to_string()),
            BatchPhase::Converting => ("🖼️ ", "Converting images...".to_string()),
            BatchPhase::Completed => ("✅", "Completed!".to_string()),
            BatchPhase::Failed(e) => ("❌", format!("Failed: {e}")),
        };
        eprintln!("{emoji} {msg}");
    }

    fn register_entries(&self, entries: Vec<String>) {
        self.stats.write().unwrap().total_entries += entries.len();
    }

    fn update_entry(&self, entry: &str, status: EntryStatus) {
        self.stats.write().unwrap().record(&status);
        match status {
            EntryStatus::Done => eprintln!("   ✓ {entry}"),
            EntryStatus::Skipped => eprintln!("   · {entry}"),
            EntryStatus::Failed(ref e) => eprintln!("   ✗ {entry}: {e}"),
            _ => {}
        }
    }

    fn finish(&self) {
        print_summary(&self.stats.read().unwrap(), self.started);
    }
}

/// Fancy interactive reporter with progress bars (for TTY).
pub struct FancyReporter {
    multi: indicatif::MultiProgress,
    phase_bar: indicatif::ProgressBar,
    main_progress: std::sync::RwLock<Option<indicatif::ProgressBar>>,
    stats: std::sync::RwLock<Stats>,
    started: std::time::Instant,
}

impl FancyReporter {
    pub fn new() -> Self {
        let multi = indicatif::MultiProgress::new();
        let phase_bar = multi.add(indicatif::ProgressBar::new_spinner());
        phase_bar.set_style(
            indicatif::ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap(),
        );
        phase_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            multi,
            phase_bar,
            main_progress: std::sync::RwLock::new(None),
            stats: Default::default(),
            started: std::time::Instant::now(),
        }
    }
}

impl Default for FancyReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for FancyReporter {
    fn set_phase(&self, phase: BatchPhase) {
        let msg = match phase {
            BatchPhase::LoadingIndex => "📋 Loading index...",
            BatchPhase::Scanning => "🔍 Scanning input directory...",
            BatchPhase::Converting => "🖼️  Converting images...",
            BatchPhase::Completed => "✅ Completed!",
            BatchPhase::Failed(ref e) => {
                self.phase_bar
                    .finish_with_message(format!("❌ Failed: {e}"));
                return;
            }
        };
        self.phase_bar.set_message(msg.to_string());

        if matches!(phase, BatchPhase::Completed) {
            self.phase_bar.finish_with_message(msg.to_string());
        }
    }

    fn register_entries(&self, entries: Vec<String>) {
        let total = entries.len();
        self.stats.write().unwrap().total_entries += total;

        let main_pb = self.multi.add(indicatif::ProgressBar::new(total as u64));
        main_pb.set_style(
            indicatif::ProgressStyle::default_bar()
                .template("   {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("█▓▒░  "),
        );
        *self.main_progress.write().unwrap() = Some(main_pb);
    }

    fn update_entry(&self, entry: &str, status: EntryStatus) {
        self.stats.write().unwrap().record(&status);
        let main_progress = self.main_progress.read().unwrap();
        let Some(main_pb) = main_progress.as_ref() else {
            return;
        };
        match status {
            EntryStatus::Processing => main_pb.set_message(entry.to_string()),
            EntryStatus::Done | EntryStatus::Skipped => main_pb.inc(1),
            EntryStatus::Failed(e) => {
                main_pb.inc(1);
                self.multi.println(format!("❌ {entry}: {e}")).ok();
            }
        }
    }

    fn finish(&self) {
        if let Some(ref main_pb) = *self.main_progress.read().unwrap() {
            main_pb.finish_and_clear();
        }
        self.phase_bar.finish_and_clear();
        print_summary(&self.stats.read().unwrap(), self.started);
    }
}

/// Create an appropriate reporter based on terminal capabilities.
pub fn create_reporter() -> Arc<dyn ProgressReporter> {
    if console::Term::stderr().is_term() {
        Arc::new(FancyReporter::new())
    } else {
        Arc::new(SimpleReporter::new())
    }
}
