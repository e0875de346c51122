//! XML qualified names
//!
//! Child element names are fed to the validators as (namespace, local name)
//! pairs. The empty namespace and "no namespace" are the same thing here.

use std::fmt;

/// XML Namespace URI
pub type NamespaceUri = String;

/// Qualified name (QName) - combination of namespace and local name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    /// Namespace URI (None for no namespace)
    pub namespace: Option<NamespaceUri>,
    /// Local name
    pub local_name: String,
}

impl QName {
    /// Create a new QName; an empty namespace is stored as no namespace
    pub fn new(namespace: Option<impl Into<String>>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(|s| s.into()).filter(|ns| !ns.is_empty()),
            local_name: local_name.into(),
        }
    }

    /// Create a QName without a namespace
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local_name: local_name.into(),
        }
    }

    /// Create a QName with a namespace
    pub fn namespaced(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self::new(Some(namespace), local_name)
    }

    /// The empty name, reserved for the end-of-content marker
    pub fn empty() -> Self {
        Self::local("")
    }

    /// Check if this is the empty name
    pub fn is_empty(&self) -> bool {
        self.namespace.is_none() && self.local_name.is_empty()
    }

    /// Namespace URI, with the empty string for no namespace
    pub fn namespace_str(&self) -> &str {
        self.namespace.as_deref().unwrap_or("")
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local_name),
            None => write!(f, "{}", self.local_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qname_creation() {
        let qname = QName::namespaced("http://example.com", "element");
        assert_eq!(qname.namespace, Some("http://example.com".to_string()));
        assert_eq!(qname.local_name, "element");
    }

    #[test]
    fn test_qname_to_string() {
        let qname = QName::namespaced("http://example.com", "element");
        assert_eq!(qname.to_string(), "{http://example.com}element");

        let qname_local = QName::local("element");
        assert_eq!(qname_local.to_string(), "element");
    }

    #[test]
    fn test_empty_namespace_is_no_namespace() {
        assert_eq!(QName::namespaced("", "a"), QName::local("a"));
        assert_eq!(QName::local("a").namespace_str(), "");
    }

    #[test]
    fn test_empty_name() {
        assert!(QName::empty().is_empty());
        assert!(!QName::local("a").is_empty());
        assert_eq!(QName::empty().to_string(), "");
    }
}
