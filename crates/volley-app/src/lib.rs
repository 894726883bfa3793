// Application layer for the volley-stats CLI: configuration and commentary.

pub mod commentary;
pub mod config;
