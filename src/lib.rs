pub mod config;
pub mod consts;
pub mod driver;
pub mod fuse;
mod io;
pub mod ops;
pub mod structure;
pub mod util;

pub use ops::FlatFS;
pub use util::error::{Error, Result};
