pub mod key;
pub mod replica_key;
pub mod tag;

pub use key::KeyModel;
pub use replica_key::ReplicaKeyModel;
