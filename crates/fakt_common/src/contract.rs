//! Declared contracts targeted for generation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// The declaration kind of a contract.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractKind {
    /// An interface marked for generation.
    #[default]
    Interface,
    /// A class marked for generation.
    Class,
}

impl ContractKind {
    /// Returns the lowercase keyword for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            ContractKind::Interface => "interface",
            ContractKind::Class => "class",
        }
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A uniquely named declared unit, as extracted by the declaration analyzer.
///
/// Contracts are discovered fresh on every compilation pass and never mutated
/// in place. A changed contract is simply a new value whose signature differs
/// from the one recorded for the previous pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    /// Fully-qualified name, e.g. `com.example.UserRepository`.
    pub name: String,

    /// Whether the contract is an interface or a class.
    #[serde(default)]
    pub kind: ContractKind,

    /// Declared type parameters in order.
    #[serde(default)]
    pub type_parameters: Vec<String>,

    /// Method signatures in declaration order.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Property signatures in declaration order.
    #[serde(default)]
    pub properties: Vec<String>,

    /// Names of other contracts referenced by this contract's shape.
    #[serde(default)]
    pub depends_on: BTreeSet<String>,

    /// Path of the source file backing this contract, if known.
    #[serde(default)]
    pub source: Option<PathBuf>,
}

impl Contract {
    /// Creates an interface contract with the given fully-qualified name and no members.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ContractKind::Interface,
            type_parameters: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            depends_on: BTreeSet::new(),
            source: None,
        }
    }

    /// Sets the declaration kind.
    pub fn with_kind(mut self, kind: ContractKind) -> Self {
        self.kind = kind;
        self
    }

    /// Adds a method signature.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.methods.push(method.into());
        self
    }

    /// Adds a property signature.
    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.properties.push(property.into());
        self
    }

    /// Adds a dependency on another contract.
    pub fn depending_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.insert(name.into());
        self
    }

    /// Sets the backing source path.
    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    /// Returns the namespace portion of the name (everything before the last `.`).
    pub fn namespace(&self) -> &str {
        self.name.rsplit_once('.').map_or("", |(ns, _)| ns)
    }

    /// Returns the unqualified name.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit_once('.').map_or(&self.name, |(_, n)| n)
    }
}
