pub mod metadata;
pub mod package;
pub mod probe;
pub mod serial;
pub mod sign;
