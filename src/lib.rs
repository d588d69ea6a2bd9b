pub mod api;
pub mod clock;
pub mod config;
pub mod decode;
pub mod endpoints;
pub mod humanize;
pub mod notify;
pub mod observability;
pub mod report;
pub mod storage;
