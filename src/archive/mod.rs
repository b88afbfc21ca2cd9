//! Archive packaging
//!
//! This module bundles converted stickers into ZIP archives:
//! - [`build_archive`] writes one deterministic archive from an ordered entry list
//! - [`split_into_bins`] partitions a directory of files into size-bounded bins, one
//!   archive per bin, so that every delivered archive stays under the transport limit

mod builder;
mod split;


pub use builder::{ArchiveEntry, build_archive, entries_from_dir};
pub use split::{ArchiveBin, plan_bins, split_into_bins};
