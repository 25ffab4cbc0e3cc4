pub mod import;
pub mod parse;
pub mod sections;
