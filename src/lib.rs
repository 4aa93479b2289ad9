//! lisafs inserts files into Lisa Office System volume images: ProFile hard
//! disks captured in Disk Copy 4.2 containers.
//! Only append-style insertion is supported; nothing is ever deleted or edited in place.
//!
//! A volume's linear layout (pages count from the MDDF):
//! - Boot and OS loader sectors
//! - MDDF (volume descriptor)
//! - Free-space bitmap
//! - S-File table
//! - Hint sectors, catalog blocks and file data, wherever they were allocated
//!
//! Every sector carries a 20-byte tag naming its owner; tags are the ground truth
//! for allocation, and the bitmap is always rederived from them.
//!
//! lisafs's layers (from bottom to top):
//! 1. Sector device: sector and tag addressing.                 | `SectorDevice`, `VolumeImage`
//! 2. Volume descriptor: global counters and structure pointers. | `mddf`
//! 3. Bitmap/Allocator: free-space queries and marking.          | `bitmap`, `alloc`
//! 4. S-File/Hint: file identifiers and per-file metadata.       | `sfile`, `hint`
//! 5. Catalog: the sorted directory of names.                    | `catalog`
//! 6. File: planning and committing one insertion.               | `file`, `checksum`
//! 7. Volume: the session object users drive.                    | `Volume`

mod config;
mod error;
mod block_dev;
mod image;
mod structs;
mod name;
pub mod mddf;
pub mod bitmap;
pub mod alloc;
pub mod hint;
pub mod sfile;
pub mod catalog;
pub mod checksum;
mod file;
mod format;
mod fs;

pub use block_dev::SectorDevice;
pub use config::*;
pub use error::{Resource, FsError as Error};
pub use error::Result;
pub use file::{apply_policy, lisa_timestamp, TextPolicy, WriteOptions};
pub use format::format_volume;
pub use fs::*;
pub use image::VolumeImage;
pub use name::{cmp_names, validate_name};
pub use structs::*;
