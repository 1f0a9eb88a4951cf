pub mod cursor;
pub mod memory;
