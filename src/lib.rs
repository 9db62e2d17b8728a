pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod gemini;
pub mod history;
pub mod http_client;
pub mod normalize;
pub mod prediction;
pub mod state;
pub mod storage;
pub mod worker;
