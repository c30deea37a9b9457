pub mod like;
pub mod user;
