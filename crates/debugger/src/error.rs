use thiserror::Error;

/// Errors the adapter reports for a specific request.
///
/// These travel inside [`eyre::Report`]; use `downcast_ref::<AdapterError>()`
/// to match on them.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("cannot {operation} while the device is not at the debugger prompt")]
    NotPaused { operation: &'static str },

    #[error("unable to parse {what} output: {data:?}")]
    MalformedOutput { what: &'static str, data: String },

    #[error("unknown expression type {0:?}")]
    UnknownExpressionType(Option<String>),
}
