//! XSD element wildcard namespace constraints
//!
//! A wildcard (xs:any) admits any element whose namespace is allowed by its
//! namespace constraint. The local name is never looked at.
//!
//! Reference: https://www.w3.org/TR/xmlschema11-1/#Wildcards

use indexmap::IndexSet;
use std::fmt;

use crate::error::{Error, Result};

/// Namespace constraint for wildcards
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceConstraint {
    /// Any namespace is allowed (##any)
    Any,
    /// Any namespace except target namespace and no namespace (##other)
    Other {
        /// The target namespace to exclude (None = no namespace)
        target_namespace: Option<String>,
    },
    /// Specific set of allowed namespaces; the empty string is no namespace
    Enumeration(IndexSet<String>),
}

impl Default for NamespaceConstraint {
    fn default() -> Self {
        Self::Any
    }
}

impl NamespaceConstraint {
    /// Create from namespace attribute value
    pub fn from_namespace_attr(value: &str, target_namespace: Option<&str>) -> Result<Self> {
        let value = value.trim();

        match value {
            "##any" => Ok(Self::Any),
            "##other" => Ok(Self::Other {
                target_namespace: target_namespace.filter(|ns| !ns.is_empty()).map(String::from),
            }),
            _ => {
                let mut namespaces = IndexSet::new();
                for ns in value.split_whitespace() {
                    match ns {
                        "##local" => {
                            namespaces.insert(String::new());
                        }
                        "##targetNamespace" => {
                            namespaces.insert(target_namespace.unwrap_or("").to_string());
                        }
                        s if s.starts_with("##") => {
                            return Err(Error::Value(format!(
                                "wrong value '{}' in 'namespace' attribute",
                                s
                            )));
                        }
                        uri => {
                            namespaces.insert(uri.to_string());
                        }
                    }
                }
                Ok(Self::Enumeration(namespaces))
            }
        }
    }

    /// Create an enumeration constraint from a list of namespaces
    pub fn enumeration<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enumeration(namespaces.into_iter().map(Into::into).collect())
    }

    /// The namespace excluded by a ##other constraint ("" for no namespace)
    pub fn excluded(&self) -> Option<&str> {
        match self {
            Self::Other { target_namespace } => Some(target_namespace.as_deref().unwrap_or("")),
            _ => None,
        }
    }

    /// Check if a namespace is allowed by this constraint
    pub fn allows(&self, namespace: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Other { target_namespace } => {
                !namespace.is_empty() && namespace != target_namespace.as_deref().unwrap_or("")
            }
            Self::Enumeration(set) => set.contains(namespace),
        }
    }

    /// Check if names outside any explicitly listed namespace can match
    pub fn is_open_ended(&self) -> bool {
        matches!(self, Self::Any | Self::Other { .. })
    }
}

impl fmt::Display for NamespaceConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "##any"),
            Self::Other { .. } => write!(f, "##other"),
            Self::Enumeration(set) => {
                let mut first = true;
                for ns in set {
                    if !first {
                        write!(f, " ")?;
                    }
                    first = false;
                    if ns.is_empty() {
                        write!(f, "##local")?;
                    } else {
                        write!(f, "{}", ns)?;
                    }
                }
                Ok(())
            }
        }
    }
}
