pub mod key;
pub mod replica_key;
