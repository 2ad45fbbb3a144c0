pub mod create;
pub mod dto;
pub mod get;
pub mod list;
pub mod process;
pub mod result;
pub mod stats;
