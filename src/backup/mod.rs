mod archive;
mod retrieval;

pub use archive::{ArchiveError, BackupArchive, DirectoryArchive};
#[cfg(test)]
pub use retrieval::memory::MemoryArchive;
pub use retrieval::{FetchError, fetch_both, fetch_current, fetch_previous};
