pub mod category;
pub mod error;
pub mod feedback;
pub mod notifications;
pub mod services;
pub mod traits;
pub mod workflow;
