pub mod poller;
pub mod status;
