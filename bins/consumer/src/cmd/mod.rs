pub mod consume;
pub mod shutdown;
