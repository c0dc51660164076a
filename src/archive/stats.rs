//! Counters for one archive pass.

/// Statistics for an encode or decode pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArchiveStats {
    /// Regular files written
    pub files: u64,

    /// Content bytes carried by regular files
    pub bytes: u64,

    /// Directories descended into
    pub dirs: u64,

    pub symlinks: u64,

    pub fifos: u64,

    pub sockets: u64,

    /// Entries that failed and were skipped
    pub failed: u64,
}

impl ArchiveStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries handled successfully, of any kind.
    pub fn entries(&self) -> u64 {
        self.files + self.dirs + self.symlinks + self.fifos + self.sockets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_excludes_failures() {
        let stats = ArchiveStats {
            files: 3,
            bytes: 1024,
            dirs: 2,
            symlinks: 1,
            fifos: 0,
            sockets: 0,
            failed: 4,
        };
        assert_eq!(stats.entries(), 6);
    }
}
