pub mod config;
pub mod db;
pub mod inspect;
pub mod run;
