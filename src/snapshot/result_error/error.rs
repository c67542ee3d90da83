use crate::snapshot::result_error::{WithDebugObjectAndFnName, WithMsg};
use itertools::Itertools;
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    ValidationError(#[from] validator::ValidationErrors),
    #[error(transparent)]
    EmailBuild(#[from] lettre::error::Error),
    #[error(transparent)]
    SmtpTransport(#[from] lettre::transport::smtp::Error),
    #[error("command {command:?} exited with status {status:?}: {stderr}")]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("unexpected cloud provider response: {0}")]
    Cloud(String),
    #[error("cannot find mount for {0}")]
    MountNotFound(Arc<str>),
    #[error("cannot find volume attached to {0}")]
    VolumeNotFound(Arc<str>),
    #[error("snapshot of volume {} failed:\n{}", volume_id, indent::indent_all_with("  ", source.to_string()))]
    SnapshotCreation {
        volume_id: Arc<str>,
        source: Box<Error>,
    },
    #[error("could not unfreeze {}:\n{}", mount_point, indent::indent_all_with("  ", source.to_string()))]
    Unfreeze {
        mount_point: Arc<str>,
        source: Box<Error>,
    },
    #[error("smtp server rejected message: {0}")]
    SmtpRejected(String),
    #[error("{}:\n{}", msg, indent::indent_all_with("  ", error.to_string()))]
    WithMsg { msg: String, error: Box<Error> },
    #[error("{:?} {} failed:\n{}", obj_debug, fn_name, indent::indent_all_with("  ", error.to_string()))]
    WithDebugObjAndFnName {
        error: Box<Error>,
        obj_debug: Box<dyn Debug + Send>,
        fn_name: String,
    },
    #[error("{}", itertools::join(.0, "\n\n"))]
    LotsOfError(Vec<Error>),
}

impl<S: Into<String>, O: Debug + Send + 'static> WithDebugObjectAndFnName<S, O> for Error {
    fn with_debug_object_and_fn_name(self, obj: O, fn_name: S) -> Self {
        Error::WithDebugObjAndFnName {
            error: Box::new(self),
            obj_debug: Box::new(obj),
            fn_name: fn_name.into(),
        }
    }
}

impl<S: Into<String>> WithMsg<S> for Error {
    fn with_msg(self, msg: S) -> Self {
        Self::WithMsg {
            msg: msg.into(),
            error: Box::new(self),
        }
    }
}

impl From<Vec<Error>> for Error {
    fn from(errors: Vec<Error>) -> Self {
        if errors.is_empty() {
            panic!("Should not create lots of errors when error is empty")
        }
        Self::LotsOfError(
            errors
                .into_iter()
                .map(|e| e.into_iter())
                .flatten()
                .collect_vec(),
        )
    }
}

impl Error {
    pub fn into_iter(self) -> Box<dyn Iterator<Item = Error>> {
        match self {
            Error::LotsOfError(v) => Box::new(v.into_iter().map(|e| e.into_iter()).flatten()),
            e => Box::new(std::iter::once(e)),
        }
    }

    pub fn chain(self, other: Error) -> Error {
        Error::LotsOfError(self.into_iter().chain(other.into_iter()).collect_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_with_msg() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = Error::from(io_error).with_msg("Custom message");

        match error {
            Error::WithMsg { msg, .. } => assert_eq!(msg, "Custom message"),
            _ => panic!("Expected WithMsg error"),
        }
    }

    #[test]
    fn test_error_with_msg_display_nests_cause() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = Error::from(io_error).with_msg("Operation failed");
        let error_str = error.to_string();

        assert!(error_str.contains("Operation failed"));
        assert!(error_str.contains("file not found"));
    }

    #[test]
    fn test_error_with_debug_object_and_fn_name() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = Error::from(io_error).with_debug_object_and_fn_name("some_object", "freeze");

        match error {
            Error::WithDebugObjAndFnName { fn_name, .. } => assert_eq!(fn_name, "freeze"),
            _ => panic!("Expected WithDebugObjAndFnName error"),
        }
    }

    #[test]
    fn test_error_chain_flattens() {
        let error1 = Error::Cloud("first".into());
        let error2 = Error::Cloud("second".into());
        let error3 = Error::Cloud("third".into());

        let chained = error1.chain(error2).chain(error3);
        match chained {
            Error::LotsOfError(errors) => assert_eq!(errors.len(), 3),
            _ => panic!("Expected LotsOfError"),
        }
    }

    #[test]
    fn test_error_into_iter() {
        let error = Error::Cloud("single".into());
        assert_eq!(error.into_iter().count(), 1);

        let combined = Error::from(vec![Error::Cloud("a".into()), Error::Cloud("b".into())]);
        assert_eq!(combined.into_iter().count(), 2);
    }

    #[test]
    #[should_panic(expected = "Should not create lots of errors when error is empty")]
    fn test_error_from_empty_vec_panics() {
        let errors: Vec<Error> = vec![];
        let _error = Error::from(errors);
    }

    #[test]
    fn test_unfreeze_error_display() {
        let inner = Error::CommandFailed {
            command: "sudo xfs_freeze -u /mnt/raid".into(),
            status: Some(1),
            stderr: "device busy".into(),
        };
        let error = Error::Unfreeze {
            mount_point: "/mnt/raid".into(),
            source: Box::new(inner),
        };
        let error_str = error.to_string();

        assert!(error_str.contains("could not unfreeze /mnt/raid"));
        assert!(error_str.contains("device busy"));
    }
}
