pub mod command_ack;
pub mod raw_response;
