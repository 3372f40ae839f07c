pub mod email;
pub mod mailbox;
