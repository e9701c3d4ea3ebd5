pub mod config;
pub mod error;
pub mod qr;
pub mod streak;
pub mod window;
