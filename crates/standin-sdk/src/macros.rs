//! Build-time schema declaration
//!
//! [`proxy_schema!`](crate::proxy_schema) turns a plain description of a
//! type's callable surface into an [`Introspect`](crate::Introspect)
//! implementation. Every declared instance method gets a direct invoker
//! thunk that downcasts the receiver, converts the boxed arguments, calls
//! the real method, and boxes the result; every declared constructor gets
//! a thunk producing a fresh boxed base instance. The resulting table is
//! what the engine synthesizes proxy classes from.

/// Declares the proxyable surface of a concrete type.
///
/// Constructors come first, then methods. Each method carries a bracketed
/// modifier list (`public`, `protected`, `private`, `final`, or empty for
/// a raw zero-modifier entry):
///
/// ```rust
/// use standin_sdk::proxy_schema;
///
/// struct Counter {
///     total: i64,
/// }
///
/// impl Counter {
///     fn new() -> Self {
///         Self { total: 0 }
///     }
///
///     fn bump(&mut self, by: i64) -> i64 {
///         self.total += by;
///         self.total
///     }
///
///     fn reset(&mut self) {
///         self.total = 0;
///     }
/// }
///
/// proxy_schema! {
///     Counter: "demo.Counter" {
///         ctor new();
///         [public] fn bump(by: i64) -> i64;
///         [public, final] fn reset();
///     }
/// }
/// ```
///
/// Static methods and overloaded names have no place in this surface;
/// build those entries by hand with [`MethodSchema`](crate::MethodSchema)
/// and [`TargetSchema`](crate::TargetSchema).
#[macro_export]
macro_rules! proxy_schema {
    // Internal: per-parameter arity contribution.
    (@one $param:ident) => {
        1usize
    };

    // Internal: return-type token.
    (@ret) => {
        $crate::TypeToken::void()
    };
    (@ret $ret:ty) => {
        $crate::TypeToken::of::<$ret>()
    };

    // Internal: modifier fold.
    (@modifier $m:expr, public) => {
        $m.as_public()
    };
    (@modifier $m:expr, protected) => {
        $m.as_protected()
    };
    (@modifier $m:expr, private) => {
        $m.as_private()
    };
    (@modifier $m:expr, final) => {
        $m.as_final()
    };

    // Internal: call the real method and box the result.
    (@call $recv:ident, $method:ident, ($($param:ident),*)) => {{
        $recv.$method($($param),*);
        ::std::result::Result::Ok($crate::Value::absent())
    }};
    (@call $recv:ident, $method:ident, ($($param:ident),*) -> $ret:ty) => {{
        let out = $recv.$method($($param),*);
        ::std::result::Result::Ok(<$ret as $crate::IntoValue>::into_value(out))
    }};

    ($target:ty : $name:literal {
        $(ctor $ctor:ident($($cparam:ident : $cty:ty),* $(,)?);)*
        $([$($modifier:ident),* $(,)?] fn $method:ident($($param:ident : $pty:ty),* $(,)?) $(-> $ret:ty)?;)*
    }) => {
        impl $crate::Introspect for $target {
            fn schema() -> $crate::TargetSchema {
                let schema = $crate::TargetSchema::new($name)
                    .with_token($crate::TypeToken::of::<$target>());
                $(
                    let schema = schema.add_constructor($crate::ConstructorSchema::new(
                        ::std::vec![$($crate::TypeToken::of::<$cty>()),*],
                        |args| {
                            let expected: usize = 0usize $(+ $crate::proxy_schema!(@one $cparam))*;
                            let mut iter = args.iter();
                            $(
                                let $cparam: $cty = match iter.next() {
                                    ::std::option::Option::Some(value) => {
                                        $crate::FromValue::from_value(value)?
                                    }
                                    ::std::option::Option::None => {
                                        return ::std::result::Result::Err(
                                            $crate::InvokeError::ArityMismatch {
                                                expected,
                                                got: args.len(),
                                            },
                                        )
                                    }
                                };
                            )*
                            if iter.next().is_some() {
                                return ::std::result::Result::Err(
                                    $crate::InvokeError::ArityMismatch {
                                        expected,
                                        got: args.len(),
                                    },
                                );
                            }
                            let base: $crate::BaseObject =
                                ::std::boxed::Box::new(<$target>::$ctor($($cparam),*));
                            ::std::result::Result::Ok(base)
                        },
                    ));
                )*
                $(
                    let schema = schema.add_method(
                        $crate::MethodSchema::new(::std::stringify!($method))
                            $(.with_param($crate::TypeToken::of::<$pty>()))*
                            .returns($crate::proxy_schema!(@ret $($ret)?))
                            .with_modifiers({
                                let m = $crate::Modifiers::none();
                                $(let m = $crate::proxy_schema!(@modifier m, $modifier);)*
                                m
                            })
                            .with_invoker(|recv, args| {
                                let recv = match recv.downcast_mut::<$target>() {
                                    ::std::option::Option::Some(recv) => recv,
                                    ::std::option::Option::None => {
                                        return ::std::result::Result::Err(
                                            $crate::InvokeError::TypeMismatch {
                                                expected: ::std::stringify!($target).to_string(),
                                                got: ::std::string::String::from("foreign receiver"),
                                            },
                                        )
                                    }
                                };
                                let expected: usize = 0usize $(+ $crate::proxy_schema!(@one $param))*;
                                let mut iter = args.iter();
                                $(
                                    let $param: $pty = match iter.next() {
                                        ::std::option::Option::Some(value) => {
                                            $crate::FromValue::from_value(value)?
                                        }
                                        ::std::option::Option::None => {
                                            return ::std::result::Result::Err(
                                                $crate::InvokeError::ArityMismatch {
                                                    expected,
                                                    got: args.len(),
                                                },
                                            )
                                        }
                                    };
                                )*
                                if iter.next().is_some() {
                                    return ::std::result::Result::Err(
                                        $crate::InvokeError::ArityMismatch {
                                            expected,
                                            got: args.len(),
                                        },
                                    );
                                }
                                $crate::proxy_schema!(@call recv, $method, ($($param),*) $(-> $ret)?)
                            }),
                    );
                )*
                schema
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::{Introspect, InvokeError, TypeToken, Value};

    struct Calculator {
        base: i64,
        notes: Vec<String>,
    }

    impl Calculator {
        fn new() -> Self {
            Self {
                base: 0,
                notes: Vec::new(),
            }
        }

        fn with_base(base: i64) -> Self {
            Self {
                base,
                notes: Vec::new(),
            }
        }

        fn add(&self, a: i64, b: i64) -> i64 {
            self.base + a + b
        }

        fn note(&mut self, message: String) {
            self.notes.push(message);
        }

        fn seal(&mut self) {}

        fn raw(&mut self) {}
    }

    proxy_schema! {
        Calculator: "demo.Calculator" {
            ctor new();
            ctor with_base(base: i64);
            [public] fn add(a: i64, b: i64) -> i64;
            [public] fn note(message: String);
            [public, final] fn seal();
            [] fn raw();
        }
    }

    #[test]
    fn test_schema_shape() {
        let schema = Calculator::schema();
        assert_eq!(schema.name, "demo.Calculator");
        assert!(schema.token.is::<Calculator>());
        assert!(!schema.is_interface);
        assert_eq!(schema.constructors.len(), 2);
        assert_eq!(schema.methods.len(), 4);

        let add = schema.find_method("add").unwrap();
        assert_eq!(add.params, vec![TypeToken::of::<i64>(), TypeToken::of::<i64>()]);
        assert_eq!(add.return_type, TypeToken::of::<i64>());
        assert!(add.modifiers.is_public);
        assert!(!add.modifiers.is_final);

        let note = schema.find_method("note").unwrap();
        assert!(note.return_type.is_void());

        let seal = schema.find_method("seal").unwrap();
        assert!(seal.modifiers.is_public);
        assert!(seal.modifiers.is_final);

        let raw = schema.find_method("raw").unwrap();
        assert!(raw.modifiers.is_empty());
    }

    #[test]
    fn test_constructor_thunks() {
        let schema = Calculator::schema();

        let (_, ctor) = schema.find_constructor(&[]).unwrap();
        let base = (ctor.construct)(&[]).unwrap();
        assert_eq!(base.downcast_ref::<Calculator>().unwrap().base, 0);

        let (_, ctor) = schema.find_constructor(&[TypeToken::of::<i64>()]).unwrap();
        let base = (ctor.construct)(&[Value::int(9)]).unwrap();
        assert_eq!(base.downcast_ref::<Calculator>().unwrap().base, 9);
    }

    #[test]
    fn test_constructor_arity_check() {
        let schema = Calculator::schema();
        let (_, ctor) = schema.find_constructor(&[TypeToken::of::<i64>()]).unwrap();

        match (ctor.construct)(&[]) {
            Err(InvokeError::ArityMismatch { expected, got }) => {
                assert_eq!(expected, 1);
                assert_eq!(got, 0);
            }
            other => panic!("expected ArityMismatch, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_direct_invoker() {
        let schema = Calculator::schema();
        let mut calc = Calculator::with_base(10);

        let invoker = schema.find_method("add").unwrap().invoker.unwrap();
        let out = invoker(&mut calc, &[Value::int(2), Value::int(3)]).unwrap();
        assert_eq!(out, Value::int(15));
    }

    #[test]
    fn test_void_invoker_returns_absent() {
        let schema = Calculator::schema();
        let mut calc = Calculator::new();

        let invoker = schema.find_method("note").unwrap().invoker.unwrap();
        let out = invoker(&mut calc, &[Value::string("hello")]).unwrap();
        assert!(out.is_absent());
        assert_eq!(calc.notes, vec!["hello".to_string()]);
    }

    #[test]
    fn test_invoker_arity_checks() {
        let schema = Calculator::schema();
        let mut calc = Calculator::new();
        let invoker = schema.find_method("add").unwrap().invoker.unwrap();

        match invoker(&mut calc, &[Value::int(1)]) {
            Err(InvokeError::ArityMismatch { expected, got }) => {
                assert_eq!(expected, 2);
                assert_eq!(got, 1);
            }
            other => panic!("expected ArityMismatch, got {other:?}"),
        }

        match invoker(&mut calc, &[Value::int(1), Value::int(2), Value::int(3)]) {
            Err(InvokeError::ArityMismatch { expected, got }) => {
                assert_eq!(expected, 2);
                assert_eq!(got, 3);
            }
            other => panic!("expected ArityMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_invoker_type_check() {
        let schema = Calculator::schema();
        let mut calc = Calculator::new();
        let invoker = schema.find_method("add").unwrap().invoker.unwrap();

        assert!(matches!(
            invoker(&mut calc, &[Value::string("x"), Value::int(2)]),
            Err(InvokeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_invoker_rejects_foreign_receiver() {
        let schema = Calculator::schema();
        let mut wrong = 0u8;
        let invoker = schema.find_method("add").unwrap().invoker.unwrap();

        match invoker(&mut wrong, &[Value::int(1), Value::int(2)]) {
            Err(InvokeError::TypeMismatch { expected, .. }) => {
                assert_eq!(expected, "Calculator");
            }
            other => panic!("expected TypeMismatch, got {other:?}"),
        }
    }
}
