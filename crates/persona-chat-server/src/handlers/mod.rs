pub mod chat;
pub mod health;
pub mod persona;
pub mod session;
