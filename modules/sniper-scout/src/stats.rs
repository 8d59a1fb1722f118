use sniper_common::SourceKind;

/// What one adapter contributed to a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub name: String,
    pub kind: SourceKind,
    pub items: usize,
    /// Diagnostic when the adapter failed as a whole.
    pub error: Option<String>,
}

impl SourceReport {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Counters for a single aggregation pass.
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    pub sources: Vec<SourceReport>,
    /// Every item that entered the dedupe pass, crawled pages included.
    pub items_scanned: usize,
    pub items_crawled: usize,
    pub posts_skipped: usize,
    pub posts_irrelevant: usize,
    pub posts_relevant: usize,
    pub new_codes: usize,
}

impl RunStats {
    pub fn sources_failed(&self) -> usize {
        self.sources.iter().filter(|s| s.failed()).count()
    }
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Sniper Run Complete ===")?;
        writeln!(f, "Items scanned:   {}", self.items_scanned)?;
        writeln!(f, "Pages crawled:   {}", self.items_crawled)?;
        writeln!(f, "Posts skipped:   {} (seen)", self.posts_skipped)?;
        writeln!(f, "Posts ignored:   {} (irrelevant)", self.posts_irrelevant)?;
        writeln!(f, "Posts relevant:  {}", self.posts_relevant)?;
        writeln!(f, "New codes:       {}", self.new_codes)?;
        writeln!(f, "\nSources:")?;
        for source in &self.sources {
            match &source.error {
                Some(error) => writeln!(f, "  {}: failed ({error})", source.name)?,
                None => writeln!(f, "  {}: {}", source.name, source.items)?,
            }
        }
        Ok(())
    }
}
