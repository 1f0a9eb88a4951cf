pub mod charset;
pub mod token;
pub mod tokenizer;
pub mod filters;
pub mod analyzer;
