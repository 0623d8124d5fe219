//! Match-suggestion workflow service - Library exports for testing

pub mod api;
pub mod config;
pub mod core;
pub mod infrastructure;

use crate::core::notifications::TransitionEvent;
use tokio::sync::OnceCell;
use tokio::sync::mpsc;

pub static NOTIFICATION_SENDER: OnceCell<mpsc::Sender<TransitionEvent>> = OnceCell::const_new();
