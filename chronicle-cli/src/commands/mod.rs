pub mod archive;
pub mod commit;
pub mod init;
pub mod prompt;
pub mod report;
pub mod status;
pub mod verify;
