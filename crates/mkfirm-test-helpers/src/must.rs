//! Unwrap helpers with good error messages.

use std::fmt::Debug;

/// Unwrap a `Result`, panicking with the error value on `Err`.
///
/// # Panics
///
/// Panics if the result is `Err`.
#[track_caller]
pub fn must<T, E: Debug>(result: Result<T, E>) -> T {
    match result {
        Ok(v) => v,
        Err(e) => panic!("must: unexpected Err: {e:?}"),
    }
}

/// Unwrap a `Result` with a context message.
///
/// # Panics
///
/// Panics if the result is `Err`, with the context and error value.
#[track_caller]
pub fn must_with<T, E: Debug>(result: Result<T, E>, context: &str) -> T {
    match result {
        Ok(v) => v,
        Err(e) => panic!("must_with: {context}: {e:?}"),
    }
}

/// Unwrap an `Option`, panicking with `msg` on `None`.
///
/// # Panics
///
/// Panics if the option is `None`.
#[track_caller]
pub fn must_some<T>(option: Option<T>, msg: &str) -> T {
    match option {
        Some(v) => v,
        None => panic!("must_some: {msg}"),
    }
}

/// Extract the error of a `Result` that is expected to fail.
///
/// # Example
///
/// ```rust
/// use mkfirm_test_helpers::must_err;
///
/// let result: Result<(), &str> = Err("window too large");
/// assert_eq!(must_err(result), "window too large");
/// ```
///
/// # Panics
///
/// Panics if the result is `Ok`, with the success value.
#[track_caller]
pub fn must_err<T: Debug, E>(result: Result<T, E>) -> E {
    match result {
        Ok(v) => panic!("must_err: unexpected Ok: {v:?}"),
        Err(e) => e,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_must_ok() {
        let r: Result<i32, String> = Ok(42);
        assert_eq!(must(r), 42);
    }

    #[test]
    #[should_panic(expected = "must: unexpected Err")]
    fn test_must_err_panics() {
        let r: Result<i32, &str> = Err("boom");
        must(r);
    }

    #[test]
    fn test_must_some() {
        assert_eq!(must_some(Some(7), "seven"), 7);
    }

    #[test]
    #[should_panic(expected = "must_some: nothing here")]
    fn test_must_some_none_panics() {
        let _ = must_some(None::<i32>, "nothing here");
    }

    #[test]
    fn test_must_err_extracts() {
        let r: Result<(), u8> = Err(3);
        assert_eq!(must_err(r), 3);
    }

    #[test]
    #[should_panic(expected = "must_err: unexpected Ok")]
    fn test_must_err_on_ok_panics() {
        let r: Result<u8, ()> = Ok(1);
        must_err(r);
    }

    #[test]
    fn test_must_with_context() {
        let r: Result<&str, ()> = Ok("fine");
        assert_eq!(must_with(r, "loading"), "fine");
    }
}
