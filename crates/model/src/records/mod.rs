pub mod mutation;
pub mod row;
pub mod transaction;
