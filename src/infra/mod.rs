pub mod db;
pub mod error;
pub mod http;
pub mod origin;
pub mod push;
pub mod telemetry;
