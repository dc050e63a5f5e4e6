//! CLI commands module

pub mod clock;
pub mod coin;
pub mod find_object_owners;
pub mod msg;
pub mod publish;
