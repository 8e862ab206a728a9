pub mod check;
pub mod common;
pub mod init;
pub mod newest;
pub mod plan;
pub mod run;
