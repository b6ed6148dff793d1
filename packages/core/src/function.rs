//! Type-erased native callables.
//!
//! A [`Function`] is built once from a native closure. The argument and return
//! descriptors are derived from the closure's signature at that point, and the
//! decode/call/encode steps are captured in one boxed invoker. Every call then
//! goes through the same tuple-in/tuple-out shape regardless of the original
//! arity.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use ipctree_variant::{
    ObjectPath, ObjectRef, Signature, Variant, VariantTuple, VariantType, WireConvert, WireTuple,
};

use crate::error::{Error, Result};

type Invoker = dyn Fn(&[Variant]) -> Result<VariantTuple> + Send + Sync;

/// A native return value, split into positional results.
///
/// `()` produces no results, a single wire type produces one, and a native
/// tuple produces one result per field. A `Result<R, E>` produces the results
/// of `R` or fails with [`Error::Callable`].
pub trait WireReturn {
    /// Declared types of the results, in order.
    fn return_types() -> Vec<VariantType>;

    /// Encode into the return tuple.
    fn into_returns(self) -> Result<VariantTuple>;
}

impl WireReturn for () {
    fn return_types() -> Vec<VariantType> {
        Vec::new()
    }

    fn into_returns(self) -> Result<VariantTuple> {
        Ok(Vec::new())
    }
}

macro_rules! single_return {
    ($($ty:ty),* $(,)?) => {
        $(
            impl WireReturn for $ty {
                fn return_types() -> Vec<VariantType> {
                    vec![<$ty as WireConvert>::variant_type()]
                }

                fn into_returns(self) -> Result<VariantTuple> {
                    Ok(vec![self.to_variant()])
                }
            }
        )*
    };
}

single_return!(i16, u16, i32, u32, i64, u64, f64, u8, bool, String, ObjectPath, Signature, ObjectRef);

impl<T: WireConvert> WireReturn for Vec<T> {
    fn return_types() -> Vec<VariantType> {
        vec![Self::variant_type()]
    }

    fn into_returns(self) -> Result<VariantTuple> {
        Ok(vec![self.to_variant()])
    }
}

impl<K: WireConvert + Ord, V: WireConvert> WireReturn for BTreeMap<K, V> {
    fn return_types() -> Vec<VariantType> {
        vec![Self::variant_type()]
    }

    fn into_returns(self) -> Result<VariantTuple> {
        Ok(vec![self.to_variant()])
    }
}

impl<K: WireConvert + Eq + Hash, V: WireConvert> WireReturn for HashMap<K, V> {
    fn return_types() -> Vec<VariantType> {
        vec![Self::variant_type()]
    }

    fn into_returns(self) -> Result<VariantTuple> {
        Ok(vec![self.to_variant()])
    }
}

macro_rules! tuple_return {
    ($($name:ident),+) => {
        impl<$($name: WireConvert),+> WireReturn for ($($name,)+) {
            fn return_types() -> Vec<VariantType> {
                <Self as WireTuple>::variant_types()
            }

            fn into_returns(self) -> Result<VariantTuple> {
                Ok(self.to_variants())
            }
        }
    };
}

tuple_return!(A);
tuple_return!(A, B);
tuple_return!(A, B, C);
tuple_return!(A, B, C, D);
tuple_return!(A, B, C, D, E);
tuple_return!(A, B, C, D, E, F);
tuple_return!(A, B, C, D, E, F, G);
tuple_return!(A, B, C, D, E, F, G, H);

impl<R, E> WireReturn for std::result::Result<R, E>
where
    R: WireReturn,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    fn return_types() -> Vec<VariantType> {
        R::return_types()
    }

    fn into_returns(self) -> Result<VariantTuple> {
        match self {
            Ok(value) => value.into_returns(),
            Err(e) => Err(Error::Callable(e.into())),
        }
    }
}

/// A free-standing native callable taking the argument pack `Args`.
pub trait Callable<Args>: Send + Sync + 'static {
    type Output: WireReturn;

    fn invoke(&self, args: Args) -> Self::Output;
}

/// A native callable taking a target `&T` followed by the argument pack `Args`.
pub trait Method<T, Args>: Send + Sync + 'static {
    type Output: WireReturn;

    fn invoke(&self, target: &T, args: Args) -> Self::Output;
}

macro_rules! callable {
    ($($arg:ident),*) => {
        impl<Func, R, $($arg,)*> Callable<($($arg,)*)> for Func
        where
            Func: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: WireReturn,
        {
            type Output = R;

            #[allow(non_snake_case)]
            fn invoke(&self, ($($arg,)*): ($($arg,)*)) -> R {
                (self)($($arg),*)
            }
        }

        impl<Func, T, R, $($arg,)*> Method<T, ($($arg,)*)> for Func
        where
            Func: Fn(&T, $($arg),*) -> R + Send + Sync + 'static,
            R: WireReturn,
        {
            type Output = R;

            #[allow(non_snake_case)]
            fn invoke(&self, target: &T, ($($arg,)*): ($($arg,)*)) -> R {
                (self)(target, $($arg),*)
            }
        }
    };
}

callable!();
callable!(A);
callable!(A, B);
callable!(A, B, C);
callable!(A, B, C, D);
callable!(A, B, C, D, E);
callable!(A, B, C, D, E, F);
callable!(A, B, C, D, E, F, G);
callable!(A, B, C, D, E, F, G, H);

/// A native callable erased to `&[Variant] -> Vec<Variant>`.
///
/// The argument and return descriptors are fixed at construction. A call
/// checks arity, then decodes every argument, and only then runs the native
/// callable, so a malformed call has no side effects.
#[derive(Clone)]
pub struct Function {
    arg_names: Vec<String>,
    arg_types: Vec<VariantType>,
    return_names: Vec<String>,
    return_types: Vec<VariantType>,
    invoke: Arc<Invoker>,
}

impl Function {
    /// Wrap a closure.
    ///
    /// # Panics
    ///
    /// Panics if the number of names does not match the closure's arity or
    /// its number of results.
    pub fn new<F, Args>(f: F, arg_names: &[&str], return_names: &[&str]) -> Self
    where
        F: Callable<Args>,
        Args: WireTuple,
    {
        let invoke = move |args: &[Variant]| -> Result<VariantTuple> {
            let args = Args::from_variants(args)?;
            f.invoke(args).into_returns()
        };

        Self::from_parts(
            arg_names,
            Args::variant_types(),
            return_names,
            <F::Output as WireReturn>::return_types(),
            Arc::new(invoke),
        )
    }

    /// Wrap a method over a weakly held target.
    ///
    /// Fails with `NullTarget` if the target is already gone. If the target
    /// dies later, calls fail with `NullTarget` after their arguments decode.
    pub fn method<T, F, Args>(
        target: &Weak<T>,
        f: F,
        arg_names: &[&str],
        return_names: &[&str],
    ) -> Result<Self>
    where
        T: Send + Sync + 'static,
        F: Method<T, Args>,
        Args: WireTuple,
    {
        if target.strong_count() == 0 {
            return Err(Error::NullTarget("method target has been dropped".to_string()));
        }

        let target = target.clone();
        let invoke = move |args: &[Variant]| -> Result<VariantTuple> {
            let args = Args::from_variants(args)?;
            let target = target
                .upgrade()
                .ok_or_else(|| Error::NullTarget("method target has been dropped".to_string()))?;
            f.invoke(&target, args).into_returns()
        };

        Ok(Self::from_parts(
            arg_names,
            Args::variant_types(),
            return_names,
            <F::Output as WireReturn>::return_types(),
            Arc::new(invoke),
        ))
    }

    fn from_parts(
        arg_names: &[&str],
        arg_types: Vec<VariantType>,
        return_names: &[&str],
        return_types: Vec<VariantType>,
        invoke: Arc<Invoker>,
    ) -> Self {
        assert_eq!(
            arg_names.len(),
            arg_types.len(),
            "function declares {} argument names for {} arguments",
            arg_names.len(),
            arg_types.len()
        );
        assert_eq!(
            return_names.len(),
            return_types.len(),
            "function declares {} return names for {} results",
            return_names.len(),
            return_types.len()
        );

        Self {
            arg_names: arg_names.iter().map(|s| s.to_string()).collect(),
            arg_types,
            return_names: return_names.iter().map(|s| s.to_string()).collect(),
            return_types,
            invoke,
        }
    }

    /// Invoke with a positional argument tuple.
    pub fn call(&self, args: &[Variant]) -> Result<VariantTuple> {
        (self.invoke)(args)
    }

    pub fn arg_names(&self) -> &[String] {
        &self.arg_names
    }

    pub fn arg_types(&self) -> &[VariantType] {
        &self.arg_types
    }

    pub fn return_names(&self) -> &[String] {
        &self.return_names
    }

    pub fn return_types(&self) -> &[VariantType] {
        &self.return_types
    }

    /// The argument tuple type.
    pub fn args_type(&self) -> VariantType {
        VariantType::tuple(self.arg_types.clone())
    }

    /// The return tuple type.
    pub fn returns_type(&self) -> VariantType {
        VariantType::tuple(self.return_types.clone())
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("args", &self.args_type().to_string())
            .field("returns", &self.returns_type().to_string())
            .finish()
    }
}
