use std::fmt;

/// What one successful collection cycle did to the registry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub node: String,
    pub pods: usize,
    pub containers: usize,
    pub volumes: usize,
    /// Storage series written (one per label tuple and category)
    pub series_updated: usize,
    /// Series removed as stale at the end of the cycle
    pub pruned: usize,
    /// Objects whose gauges could not be written
    pub errors: usize,
}

impl CycleReport {
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            ..Default::default()
        }
    }

    pub fn add_pod(&mut self) {
        self.pods += 1;
        self.series_updated += 1;
    }

    pub fn add_volume(&mut self) {
        self.volumes += 1;
        self.series_updated += 1;
    }

    /// Memory, rootfs and logs each form one series per container.
    pub fn add_container(&mut self) {
        self.containers += 1;
        self.series_updated += 3;
    }

    pub fn add_error(&mut self) {
        self.errors += 1;
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "node {}: {} pods, {} containers, {} volumes, {} series updated",
            self.node, self.pods, self.containers, self.volumes, self.series_updated
        )?;
        if self.pruned > 0 {
            write!(f, ", {} pruned", self.pruned)?;
        }
        if self.errors > 0 {
            write!(f, ", {} errors", self.errors)?;
        }
        Ok(())
    }
}
