pub mod cors;
pub mod format;
pub mod test_utils;
