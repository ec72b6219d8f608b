pub mod account;
pub mod send;
pub mod subscribe;
