mod error;
mod meta;
mod mmr;
mod splitjoin;

pub use error::{Error, Result};
pub use meta::{parse, FlashAreaRef, Meta};
pub use mmr::{MmrTlv, TLV_FLASH_AREA, TLV_HASH, TLV_ISK, TLV_KEK};
pub use splitjoin::{join, split};
