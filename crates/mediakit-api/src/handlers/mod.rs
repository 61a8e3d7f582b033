pub mod convert;
pub mod health;
pub mod job_status;
pub mod storage_download;
pub mod storage_list;
