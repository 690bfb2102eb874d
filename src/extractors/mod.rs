pub mod auth;

pub use auth::AuthenticatedWorker;
