pub mod channel;
pub mod message;
pub mod reaction;
pub mod workspace;
