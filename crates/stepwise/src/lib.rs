pub mod align;
pub mod cli;
pub mod compare;
pub mod init;
pub mod logging;
pub mod output;
pub mod summarize;
pub mod tags;
