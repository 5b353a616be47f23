pub mod mongo_store;
pub mod store;

pub use mongo_store::MongoCollection;
pub use store::{DocumentCollection, OrderStore, StoreError};
