pub mod email;
pub mod sender;
