//! Object addresses with validated components.

use std::fmt;
use std::str::FromStr;

/// Errors related to address parsing and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// A component contains characters outside `[A-Za-z0-9_]`.
    InvalidComponent {
        component: String,
        position: usize,
        message: String,
    },
    /// The address does not start with `/`.
    NotAbsolute { address: String },
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressError::InvalidComponent {
                component,
                position,
                message,
            } => {
                write!(
                    f,
                    "invalid address component '{}' at position {}: {}",
                    component, position, message
                )
            }
            AddressError::NotAbsolute { address } => {
                write!(f, "address '{}' must start with '/'", address)
            }
        }
    }
}

impl std::error::Error for AddressError {}

/// An absolute object address such as `/org/example/player`.
///
/// Components are non-empty runs of ASCII letters, digits and underscores.
/// Repeated and trailing slashes are normalized away, so `/a//b/` and `/a/b`
/// are the same address. The root address is `/`.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Address {
    components: Vec<String>,
}

impl Address {
    /// Parse an absolute address string.
    ///
    /// ```rust
    /// use ipctree_local::Address;
    ///
    /// let address = Address::parse("/org/example/player").unwrap();
    /// assert_eq!(address.len(), 3);
    /// assert_eq!(address.to_string(), "/org/example/player");
    ///
    /// assert!(Address::parse("org/example").is_err());
    /// assert!(Address::parse("/org/ex-ample").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let Some(rest) = s.strip_prefix('/') else {
            return Err(AddressError::NotAbsolute {
                address: s.to_string(),
            });
        };

        let components: Vec<String> = rest
            .split('/')
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string())
            .collect();

        for (i, component) in components.iter().enumerate() {
            Self::validate_component(component, i)?;
        }

        Ok(Address { components })
    }

    /// The root address `/`.
    pub fn root() -> Self {
        Self::default()
    }

    fn validate_component(component: &str, position: usize) -> Result<(), AddressError> {
        if let Some(c) = component
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
        {
            return Err(AddressError::InvalidComponent {
                component: component.to_string(),
                position,
                message: format!("invalid character '{}'", c),
            });
        }
        Ok(())
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// The last component, or `None` at the root.
    pub fn last(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    /// The enclosing address, or `None` at the root.
    pub fn parent(&self) -> Option<Address> {
        let (_, init) = self.components.split_last()?;
        Some(Address {
            components: init.to_vec(),
        })
    }

    /// Append one validated component.
    pub fn child(&self, component: &str) -> Result<Address, AddressError> {
        Self::validate_component(component, self.components.len())?;
        if component.is_empty() {
            return Err(AddressError::InvalidComponent {
                component: String::new(),
                position: self.components.len(),
                message: "empty component".to_string(),
            });
        }
        let mut components = self.components.clone();
        components.push(component.to_string());
        Ok(Address { components })
    }

    /// Check if this address is `prefix` or lies below it.
    pub fn has_prefix(&self, prefix: &Address) -> bool {
        prefix.components.len() <= self.components.len()
            && prefix.components == self.components[..prefix.components.len()]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.components.join("/"))
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

/// Macro for creating addresses from literals.
///
/// # Example
///
/// ```rust
/// use ipctree_local::address;
///
/// let a = address!("/org/example");
/// assert_eq!(a.len(), 2);
/// ```
#[macro_export]
macro_rules! address {
    ($s:expr) => {
        $crate::Address::parse($s).expect("invalid address literal")
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_basic_addresses() {
        assert_eq!(Address::parse("/").unwrap().len(), 0);
        assert_eq!(Address::parse("/foo").unwrap().len(), 1);
        assert_eq!(Address::parse("/foo/bar_2/Baz").unwrap().len(), 3);
    }

    #[test]
    fn normalize_slashes() {
        assert_eq!(address!("/foo/bar/"), address!("/foo/bar"));
        assert_eq!(address!("/foo//bar"), address!("/foo/bar"));
        assert_eq!(address!("//"), Address::root());
    }

    #[test]
    fn relative_addresses_rejected() {
        assert_eq!(
            Address::parse("foo/bar"),
            Err(AddressError::NotAbsolute {
                address: "foo/bar".to_string()
            })
        );
        assert!(Address::parse("").is_err());
    }

    #[test]
    fn invalid_components_rejected() {
        assert!(Address::parse("/foo/bar baz").is_err());
        assert!(Address::parse("/foo/bar-baz").is_err());
        assert!(Address::parse("/foo/.hidden").is_err());
        assert!(Address::parse("/org.example").is_err());

        let err = Address::parse("/ok/not ok").unwrap_err();
        assert!(err.to_string().contains("position 1"));
    }

    #[test]
    fn display_roundtrip() {
        assert_eq!(Address::root().to_string(), "/");
        assert_eq!(address!("/a/b").to_string(), "/a/b");
        assert_eq!("/a/b".parse::<Address>().unwrap(), address!("/a/b"));
    }

    #[test]
    fn parent_and_child() {
        let a = address!("/a/b");
        assert_eq!(a.parent().unwrap(), address!("/a"));
        assert_eq!(a.last(), Some("b"));
        assert!(Address::root().parent().is_none());
        assert!(Address::root().last().is_none());

        assert_eq!(a.child("c").unwrap(), address!("/a/b/c"));
        assert!(a.child("").is_err());
        assert!(a.child("c/d").is_err());
    }

    #[test]
    fn has_prefix_works() {
        let a = address!("/foo/bar/baz");
        assert!(a.has_prefix(&Address::root()));
        assert!(a.has_prefix(&address!("/foo/bar")));
        assert!(a.has_prefix(&a));
        assert!(!a.has_prefix(&address!("/bar")));
        assert!(!a.has_prefix(&address!("/foo/bar/baz/qux")));
    }
}
