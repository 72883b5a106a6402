pub mod document;
pub mod paths;
