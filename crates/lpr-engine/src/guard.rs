use anyhow::{anyhow, Result};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Run a collaborator call, turning a panic into an error
pub(crate) fn guarded<T>(stage: &str, call: impl FnOnce() -> Result<T>) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(payload) => Err(anyhow!("{} panicked: {}", stage, panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_and_err_pass_through() {
        assert_eq!(guarded("ok", || Ok(3)).unwrap(), 3);
        let err = guarded::<()>("err", || Err(anyhow!("boom"))).unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_panic_becomes_error() {
        let err = guarded::<()>("contour", || panic!("index out of range")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("contour panicked"));
        assert!(message.contains("index out of range"));
    }
}
