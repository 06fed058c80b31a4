pub mod branch_opt_util;
pub mod database;
pub mod error;
pub mod matrix;
pub mod message;
pub mod params;
pub mod prg;
