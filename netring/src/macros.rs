/// Declare a dynamically sized byte wrapper.
///
/// Use this to create byte slices with inner invariants. This macro performs two basic actions:
/// * Define a type with the indicated structure, documentation, attributes. The type can not have
///   any generic arguments and can only wrap a simple byte slice.
/// * Define two new private methods for conversion from a byte slice:
///   - `fn __from_macro_new_unchecked(&[u8]) -> &Self`
///   - `fn __from_macro_new_unchecked_mut(&mut [u8]) -> &mut Self`
///
/// ## Usage
///
/// You can currently only use a tuple type with a single member, a `[u8]`.
///
/// ```
/// # use netring::byte_wrapper;
/// byte_wrapper! {
///     /// A raw descriptor table.
///     pub struct table([u8]);
/// }
///
/// impl table {
///     pub fn from_slice(slice: &[u8]) -> &Self {
///         Self::__from_macro_new_unchecked(slice)
///     }
/// }
///
/// let data = [0u8; 16];
/// let _ = table::from_slice(&data);
/// ```
#[macro_export]
macro_rules! byte_wrapper {
    (
        $( #[$attr:meta] )*
        pub struct $name:ident([u8])$(;)*
    ) => {
        #[allow(non_camel_case_types)]
        #[repr(transparent)]
        $( #[$attr] )*
        pub struct $name([u8]);

        impl $name {
            #[allow(dead_code)]
            fn __from_macro_new_unchecked(data: &[u8]) -> &Self {
                // SAFETY: this is safe due to repr(transparent)
                unsafe { &*(data as *const _ as *const Self) }
            }

            #[allow(dead_code)]
            fn __from_macro_new_unchecked_mut(data: &mut [u8]) -> &mut Self {
                // SAFETY: this is safe due to repr(transparent)
                unsafe { &mut *(data as *mut _ as *mut Self) }
            }
        }
    }
}

#[cfg(feature = "log")]
#[macro_use]
mod log {
    macro_rules! net_log {
        (trace, $($arg:tt)*) => { ::tracing::trace!($($arg)*) };
        (debug, $($arg:tt)*) => { ::tracing::debug!($($arg)*) };
        (warn, $($arg:tt)*) => { ::tracing::warn!($($arg)*) };
    }
}

#[cfg(not(feature = "log"))]
#[macro_use]
mod log {
    macro_rules! net_log {
        ($level:ident, $($arg:tt)*) => {
            if false { let _ = format_args!($($arg)*); }
        };
    }
}

macro_rules! net_trace {
    ($($arg:tt)*) => (net_log!(trace, $($arg)*));
}

macro_rules! net_debug {
    ($($arg:tt)*) => (net_log!(debug, $($arg)*));
}

macro_rules! net_warn {
    ($($arg:tt)*) => (net_log!(warn, $($arg)*));
}
