pub mod greeting;
pub mod matcher;
