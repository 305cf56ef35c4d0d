pub mod availability;
pub mod command;
pub mod device;
pub mod discovery;
pub mod entities;
pub mod topics;
