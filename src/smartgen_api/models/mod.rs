pub mod request;
pub mod response;

pub mod action;
pub mod credentials;
pub mod genset_status;
