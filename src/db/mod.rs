pub mod destination;
pub mod sql;
pub mod writer;
