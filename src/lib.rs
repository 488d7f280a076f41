pub mod config;
pub mod detect;
pub mod extract;
pub mod history;
pub mod notify;
pub mod output;
pub mod record;
pub mod run;
