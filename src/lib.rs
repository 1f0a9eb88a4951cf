pub mod core;
pub mod storage;
pub mod analysis;
pub mod schema;
pub mod index;
pub mod scoring;
pub mod search;
pub mod query;

pub use crate::core::config::Config;
pub use crate::core::engine::FulltextEngine;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::types::{DocId, Row, SearchFlags, SearchMode};
pub use crate::search::results::{FtSearch, FulltextResult, Hit};
