use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn pool_closed() -> Error {
        Error(ErrorKind::PoolClosed.into())
    }

    pub fn already_stopped() -> Error {
        Error(ErrorKind::AlreadyStopped.into())
    }

    pub fn task_panicked(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::TaskPanicked {
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn task_abandoned() -> Error {
        Error(ErrorKind::TaskAbandoned.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }

    /// Builds a [`ErrorKind::TaskPanicked`] error from a payload captured by
    /// `std::panic::catch_unwind`.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Error {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Error::task_panicked(message)
    }

    pub fn is_pool_closed(&self) -> bool {
        matches!(self.kind(), ErrorKind::PoolClosed)
    }

    pub fn is_already_stopped(&self) -> bool {
        matches!(self.kind(), ErrorKind::AlreadyStopped)
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("worker pool is closed for submissions")]
    PoolClosed,

    #[error("worker pool is already stopped")]
    AlreadyStopped,

    #[error("task panicked: {message}")]
    TaskPanicked { message: String },

    #[error("task was dropped before it could run")]
    TaskAbandoned,

    #[error("IO error for '{context}': {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(Box::new(kind))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[macro_export]
macro_rules! verify_arg {
    ($name:expr, $expr:expr) => {{
        let result = $expr;
        $crate::error::verify_arg(result, stringify!($name), stringify!($expr))?;
    }};
}

#[inline]
pub fn verify_arg(predicate: bool, name: &str, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        invalid_arg(name, condition)
    }
}

#[cold]
fn invalid_arg(name: &str, condition: &str) -> Result<()> {
    Err(ErrorKind::InvalidArgument {
        name: name.to_string(),
        message: condition.to_string(),
    }
    .into())
}
