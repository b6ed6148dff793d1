//! Signal descriptors.

use ipctree_variant::{VariantType, WireTuple};

/// The declared shape of a notification: argument names and types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signal {
    names: Vec<String>,
    types: Vec<VariantType>,
}

impl Signal {
    /// Declare a signal whose payload is the native tuple `Args`.
    ///
    /// # Panics
    ///
    /// Panics if the number of names does not match the arity of `Args`.
    pub fn new<Args: WireTuple>(names: &[&str]) -> Self {
        Self::with_types(
            names.iter().map(|s| s.to_string()).collect(),
            Args::variant_types(),
        )
    }

    /// Declare a signal from explicit types.
    ///
    /// # Panics
    ///
    /// Panics if the name and type counts differ, or a type is invalid.
    pub fn with_types(names: Vec<String>, types: Vec<VariantType>) -> Self {
        assert_eq!(
            names.len(),
            types.len(),
            "signal declares {} names for {} arguments",
            names.len(),
            types.len()
        );
        assert!(
            types.iter().all(VariantType::is_valid),
            "signal declares an invalid argument type"
        );
        Self { names, types }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn types(&self) -> &[VariantType] {
        &self.types
    }

    /// The payload tuple type.
    pub fn args_type(&self) -> VariantType {
        VariantType::tuple(self.types.clone())
    }
}

/// Shorthand for [`Signal::new`].
pub fn make_signal<Args: WireTuple>(names: &[&str]) -> Signal {
    Signal::new::<Args>(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_types_from_the_tuple() {
        let s = make_signal::<(String, i32)>(&["who", "count"]);
        assert_eq!(s.types(), &[VariantType::String, VariantType::Int32]);
        assert_eq!(s.args_type().signature().unwrap(), "(si)");
        assert_eq!(s.names()[1], "count");
    }

    #[test]
    fn empty_payload() {
        let s = make_signal::<()>(&[]);
        assert!(s.types().is_empty());
        assert_eq!(s.args_type().signature().unwrap(), "()");
    }

    #[test]
    #[should_panic(expected = "signal declares 1 names for 2 arguments")]
    fn name_count_must_match() {
        let _ = make_signal::<(String, i32)>(&["who"]);
    }

    #[test]
    #[should_panic(expected = "invalid argument type")]
    fn invalid_types_are_rejected() {
        let _ = Signal::with_types(vec!["x".to_string()], vec![VariantType::Invalid]);
    }
}
