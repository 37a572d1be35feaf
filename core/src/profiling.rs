//! Tracy instrumentation for the frame loop.
//!
//! Build with the `profiling` feature to send spans, plots and frame marks to
//! a running Tracy client through [`tracy_client`]. Without the feature the
//! macros compile to nothing, apart from evaluating plot values and dynamic
//! span names.
//!
//! ```ignore
//! use redlilium_core::profiling::{profile_function, profile_scope};
//!
//! fn compile() {
//!     profile_function!();
//!     {
//!         profile_scope!("cull");
//!         // ...
//!     }
//! }
//! ```

#[cfg(feature = "profiling")]
pub use tracy_client::{self, Client, frame_mark as tracy_frame_mark, plot as tracy_plot, span};

/// Ends the current frame in the Tracy timeline.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! frame_mark {
    () => {
        $crate::profiling::tracy_frame_mark()
    };
}

#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! frame_mark {
    () => {};
}

/// Opens a span named `$name` that closes at the end of the enclosing block.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _span_guard = $crate::profiling::span!($name);
    };
}

#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// Opens a span named after the enclosing function.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_function {
    () => {
        let _span_guard = $crate::profiling::span!();
    };
}

#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_function {
    () => {};
}

/// Records one sample of a numeric series, such as passes per frame.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        $crate::profiling::tracy_plot!($name, $value as f64)
    };
}

#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        let _ = $value;
    };
}

/// Opens a span whose name is only known at runtime, such as a pass tag.
///
/// Allocates per call; use [`profile_scope!`] when the name is static.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope_dynamic {
    ($name:expr) => {
        let _span_guard = $crate::profiling::Client::running()
            .map(|client| client.span_alloc(Some($name), "", file!(), line!(), 0));
    };
}

#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope_dynamic {
    ($name:expr) => {
        let _ = $name;
    };
}

pub use frame_mark;
pub use profile_function;
pub use profile_plot;
pub use profile_scope;
pub use profile_scope_dynamic;

#[cfg(test)]
mod tests {
    #[test]
    fn test_instrumented_frame() {
        let tag = String::from("gbuffer");
        for pass in 0..3u32 {
            profile_function!();
            profile_scope!("record");
            profile_scope_dynamic!(tag.as_str());
            profile_plot!("passes", pass);
        }
        frame_mark!();
    }
}
