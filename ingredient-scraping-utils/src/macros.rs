#[doc(hidden)]
pub use once_cell::sync::Lazy as __Lazy;
#[doc(hidden)]
pub use regex::Regex as __Regex;
#[doc(hidden)]
pub use scraper::Selector as __Selector;

#[macro_export]
macro_rules! selector {
    ($e: expr) => {{
        use $crate::macros::{__Lazy, __Selector};
        static SELECTOR: __Lazy<__Selector> = __Lazy::new(|| __Selector::parse($e).unwrap());
        &*SELECTOR
    }};
}

#[macro_export]
macro_rules! regex {
    ($e: expr) => {{
        use $crate::macros::{__Lazy, __Regex};
        static PATTERN: __Lazy<__Regex> = __Lazy::new(|| __Regex::new($e).unwrap());
        &*PATTERN
    }};
}
