pub mod policy;
pub mod rank;
