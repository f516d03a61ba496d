//! Publish pipeline: latest-wins slot, store adapters, background worker

mod firestore;
mod slot;
mod store;
mod supabase;
mod worker;

pub use firestore::FirestoreAdapter;
pub use slot::Slot;
pub use store::{RetryPolicy, StoreAdapter, build_adapter};
pub use supabase::SupabaseAdapter;
pub use worker::{PublishItem, Publisher};
