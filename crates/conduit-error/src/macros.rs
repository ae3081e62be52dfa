// Call-site macros
// Capture file, line and the enclosing function path for stack frames

/// Path of the enclosing function, without closure markers
#[macro_export]
macro_rules! function_name {
    () => {{
        fn __here() {}
        fn type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let name = type_name_of(__here);
        let name = name.strip_suffix("::__here").unwrap_or(name);
        $crate::frame::trim_closure_suffix(name)
    }};
}

/// A [`CallSite`](crate::CallSite) for the current location
#[macro_export]
macro_rules! call_site {
    () => {
        $crate::CallSite::new(file!(), line!(), $crate::function_name!())
    };
}

/// Wrap a description under a code at the current location
#[macro_export]
macro_rules! wrap {
    ($registry:expr, $code:expr, $($arg:tt)+) => {
        $crate::StackError::wrap_at($registry, $crate::call_site!(), $code, format!($($arg)+))
    };
}

#[cfg(test)]
mod tests {
    use crate::{codes, CoderRegistry, ModuleInfo};

    fn sample() -> &'static str {
        function_name!()
    }

    #[test]
    fn test_function_name() {
        assert!(sample().ends_with("macros::tests::sample"));
    }

    #[test]
    fn test_function_name_inside_closure() {
        let name = (|| function_name!())();
        assert!(name.ends_with("test_function_name_inside_closure"));
    }

    #[test]
    fn test_wrap_macro_records_function() {
        let registry = CoderRegistry::new(ModuleInfo::new("macros"));
        let err = wrap!(&registry, codes::VALIDATION, "field {} is empty", "name");
        assert_eq!(err.description(), "field name is empty");
        let frame = &err.frames()[0];
        assert!(frame.function.ends_with("test_wrap_macro_records_function"));
    }
}
