/// Error types that can be built from a plain message.
///
/// Implement this for a crate's error type, then invoke [`impl_context!`]
/// inside its error module to get `.context()` / `.with_context()` on
/// `Result` and `.or_message()` on `Option`.
pub trait FromMessage: Sized {
    fn from_message(message: String) -> Self;
}

/// Generate a crate-local `Context` trait for `Result` and an `OptionExt`
/// trait for `Option`.
///
/// Must be invoked in a module that defines `Error: FromMessage` and
/// `type Result<T> = std::result::Result<T, Error>`.
///
/// ```ignore
/// // in crates/sync/src/error.rs
/// mylife_common::impl_context!();
/// ```
#[macro_export]
macro_rules! impl_context {
    () => {
        pub trait Context<T> {
            fn context(self, context: impl Into<String>) -> Result<T>;

            fn with_context<C, F>(self, f: F) -> Result<T>
            where
                C: Into<String>,
                F: FnOnce() -> C;
        }

        impl<T, E: std::fmt::Display> Context<T> for std::result::Result<T, E> {
            fn context(self, context: impl Into<String>) -> Result<T> {
                self.with_context(|| context)
            }

            fn with_context<C, F>(self, f: F) -> Result<T>
            where
                C: Into<String>,
                F: FnOnce() -> C,
            {
                self.map_err(|source| {
                    let context: String = f().into();
                    <Error as $crate::FromMessage>::from_message(format!("{context}: {source}"))
                })
            }
        }

        pub trait OptionExt<T> {
            fn or_message(self, message: impl Into<String>) -> Result<T>;
        }

        impl<T> OptionExt<T> for Option<T> {
            fn or_message(self, message: impl Into<String>) -> Result<T> {
                self.ok_or_else(|| <Error as $crate::FromMessage>::from_message(message.into()))
            }
        }
    };
}
