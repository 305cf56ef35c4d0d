pub mod signed_request;
