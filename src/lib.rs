//! Batch builder for bootable HFS SCSI volume images.
//!
//! Takes an arbitrary directory tree of downloaded classic Mac software and
//! packs it onto one or more fixed-capacity bootable disk images, each laid
//! out the way period SCSI firmware expects: Block0, Apple partition map,
//! installed driver, HFS volume.
//!
//! # Architecture
//!
//! ```text
//! macvolumes
//!     │
//!     ├── packer    - walks the download tree, filters and packs entries
//!     │               into volumes, flushes each full volume to disk
//!     ├── container - classifies inputs (.dsk / DiskCopy .img / .sit) and
//!     │               normalizes them into folders or extracted trees
//!     ├── filter    - architecture classification from resource forks
//!     ├── disk      - Block0, partition map, and image assembly
//!     ├── volume    - in-memory HFS tree plus the hfsutils codec bridge
//!     └── metadata  - AppleDouble sidecars and resource map reading
//! ```
//!
//! Filesystem encoding is delegated to host tools (`hformat`, `hcopy`, ...)
//! behind the [`volume::HfsCodec`] trait, so the packing pipeline itself has
//! no hard dependency on a working hfsutils install.

pub(crate) mod bytes;

pub mod container;
pub mod disk;
pub mod filter;
pub mod metadata;
pub mod packer;
pub mod preflight;
pub mod process;
pub mod volume;

pub use packer::{EntryError, PackerConfig, VolumePacker};
pub use volume::{FileEntry, Folder, HfsCodec, Node, Volume};
