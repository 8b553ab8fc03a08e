/// Record iteration shared by all formats in this crate.
pub mod records;
