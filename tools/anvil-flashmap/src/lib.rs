//! Flash area parsing, overlap/id-conflict detection, and the
//! `sysflash.h`/`sysflash.c` emission pair.

mod area;
mod emit;
mod error;

pub use area::{parse_areas, FlashArea, FlashMap};
pub use emit::emit;
pub use error::{Error, Result};
