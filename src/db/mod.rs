// Database module
// Optional SQLite write-through storage for the word collection

pub mod connection;
pub mod migrations;
pub mod operations;
