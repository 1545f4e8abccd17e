//! High level adapter for the device debugger console.
//!
//! [`RokuAdapter`] sits on top of a [`transport::RequestPipeline`]. It
//! watches everything the device prints to follow the life cycle of the
//! channel (compiling, running, stopped at the debugger prompt), and offers
//! typed queries for threads, stack frames and variables while the device is
//! stopped.
mod adapter;
mod cache;
mod device;
pub mod diagnostics;
mod error;
mod events;
pub mod parse;
pub mod patterns;
mod runtime;
mod status;

pub use adapter::{AdapterOptions, RokuAdapter};
pub use cache::{QueryCache, QueryKey, QueryValue};
pub use device::{DeviceControl, EcpDeviceControl, ECP_PORT};
pub use diagnostics::CompileError;
pub use error::AdapterError;
pub use events::{AdapterEvent, AdapterEventReceiver};
pub use parse::{EvaluateContainer, HighLevelType, PrimitiveType, StackFrame, Thread};
pub use runtime::RuntimeError;
pub use status::{AdapterStatus, CompileTracker, TimerAction, Trigger};
