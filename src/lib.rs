pub mod actors;
pub mod assemble;
pub mod config;
pub mod discovery;
pub mod pcp;
pub mod schema;
pub mod storage;
pub mod util;
