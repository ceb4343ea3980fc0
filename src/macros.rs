/// Creates a once-locked static value with an associated getter function.
///
/// # Examples
///
/// ```ignore
/// // initializes the value using `Vec::default`.
/// global! {{
///     /// Returns a vector.
///     [VECTOR] fn vector() -> Vec<u8>;
/// }}
///
/// // initializes the value using the given function.
/// global! {{
///     /// Returns a filled vector.
///     [FILLED] fn filled() -> Vec<u8> { || vec![1, 2, 3] }
/// }}
/// ```
#[macro_export]
macro_rules! global {
    {$({$($args:tt)+})*} => {$(
        $crate::global!(@match { $($args)+ });
    )*};
    (@match {
        $(#[$attribute:meta])*
        [$global:ident] fn $fn:ident() -> $type:ty;
    }) => {
        $crate::global!(@build($global, ($($attribute)*), $fn, $type, <$type>::default));
    };
    (@match {
        $(#[$attribute:meta])*
        [$global:ident] fn $fn:ident() -> $type:ty { $init:expr }
    }) => {
        $crate::global!(@build($global, ($($attribute)*), $fn, $type, $init));
    };
    (@build($global:ident, ($($attribute:meta)*), $fn:ident, $type:ty, $init:expr)) => {
        static $global: ::std::sync::OnceLock<$type> = ::std::sync::OnceLock::new();

        $(#[$attribute])*
        #[inline]
        #[must_use]
        pub fn $fn() -> &'static $type {
            $global.get_or_init($init)
        }
    };
}
