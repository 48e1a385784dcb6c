pub mod serve;
pub mod shutdown;
