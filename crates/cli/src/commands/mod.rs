pub mod chat;
pub mod chats;
pub mod context;
pub mod init;
pub mod messages;
