pub mod config;
pub mod denylist;
pub mod init;
pub mod ratchets;
pub mod run;
pub mod slices;
