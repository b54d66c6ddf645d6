pub mod connector;
pub mod fs_storage;
pub mod ftp_gateway;
pub mod local_gateway;
pub mod memory_store;
pub mod uuid_api;
