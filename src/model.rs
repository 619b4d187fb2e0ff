pub mod logical;
pub mod wire;
