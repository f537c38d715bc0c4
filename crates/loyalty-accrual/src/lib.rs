//! Accrual service client.
//!
//! The accrual service decides how many loyalty points a purchase order
//! earns. This crate asks it about one order at a time and classifies the
//! answer so the reconciler can act on it.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use loyalty_accrual::{AccrualClient, AccrualReply};
//!
//! # async fn example() -> Result<(), loyalty_accrual::AccrualError> {
//! let client = AccrualClient::new("http://accrual:8080", Duration::from_secs(10))?;
//!
//! match client.fetch("3182649").await? {
//!     AccrualReply::Decision(decision) => {
//!         println!("{} is {} ({} points)", decision.order, decision.status, decision.accrual);
//!     }
//!     AccrualReply::Unknown => println!("not registered yet"),
//!     AccrualReply::Overloaded { retry_after } => println!("back off for {retry_after:?}"),
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::AccrualClient;
pub use error::AccrualError;
pub use types::{AccrualDecision, AccrualReply};
