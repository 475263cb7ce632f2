//! Log a message the first time a call site is reached, then stay quiet.

#[macro_export]
macro_rules! warn_once {
    ($($arg:tt)+) => {{
        static ONCE: ::std::sync::Once = ::std::sync::Once::new();
        ONCE.call_once(|| ::log::warn!($($arg)+));
    }};
}
