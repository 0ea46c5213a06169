pub mod notification;
pub mod persistence;
pub mod source;
pub mod transport;
