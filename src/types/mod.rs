pub mod location;
pub mod payload;
