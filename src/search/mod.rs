pub mod results;
pub mod natural;
pub mod boolean;
