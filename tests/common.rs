//! Common utilities for tests

use lisafs::{format_volume, Geometry, TextPolicy, Volume, VolumeImage, WriteOptions};

pub const ORANGE: &str = "\x1b[38;5;214m";
pub const RESET: &str = "\x1b[0m";

/// Provides a macro for logging messages during tests.
/// e.g. log!("placeholder {}", 1) -> println!("[test] placeholder 1");
#[macro_export]
macro_rules! log {
    ($msg:expr) => {
        println!("{}[test] {}{}", crate::common::ORANGE, $msg, crate::common::RESET)
    };
    ($msg:expr, $($arg:tt)*) => {
        println!(
            "{}[test] {}{}",
            crate::common::ORANGE,
            format!($msg, $($arg)*),
            crate::common::RESET
        )
    };
}

/// A freshly formatted 5 MB volume with an empty catalog.
pub fn fresh_volume() -> Volume<VolumeImage> {
    let image = format_volume(Geometry::PROFILE_5MB, "test").unwrap();
    Volume::open(image).unwrap()
}

/// A smaller volume, for tests that exhaust space.
pub fn small_volume(sectors: u32) -> Volume<VolumeImage> {
    let image = format_volume(Geometry::new(sectors), "small").unwrap();
    Volume::open(image).unwrap()
}

/// Fixed dates and no line-ending conversion, so results are reproducible.
pub fn options() -> WriteOptions {
    WriteOptions {
        policy: TextPolicy::Raw,
        created: 0x9C00_0000,
        modified: 0x9C00_0100,
    }
}

/// A deterministic permutation of `0..n` (n must not be a multiple of 37).
pub fn scrambled(n: usize) -> Vec<usize> {
    (0..n).map(|i| (i * 37 + 11) % n).collect()
}
