//! Internal helpers shared by the codecs.

/// Returns early with `$error` unless `$predicate` holds.
///
/// Like `assert!`, but for recoverable validation failures inside functions
/// returning `Result`.
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
