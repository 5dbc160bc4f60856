

pub mod conversation;
pub mod retrieval;
pub mod sector;
