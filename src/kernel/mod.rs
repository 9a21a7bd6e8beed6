pub mod assembler;
pub mod event;
pub mod fusion;
pub mod governor;
pub mod message;
pub mod mode;
pub mod reactor;
pub mod session;
pub mod telemetry;
pub mod time;
pub mod worker;
