pub mod pill;
pub mod search;
pub mod upload;
