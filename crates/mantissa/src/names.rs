//! User-registered name table and identifier rules.
//!
//! Identifiers start with an ASCII letter or `_` and continue with
//! alphanumerics, `_`, or non-ASCII UTF-8 bytes (identifier length is
//! measured in bytes). Builtin function names are reserved; registration
//! rejects them and any already-taken name.

use ahash::AHashMap;

use crate::{opcode::lookup_function, scalar::Scalar};

/// What a registered identifier resolves to.
#[derive(Clone, Debug)]
pub(crate) enum NameData<T> {
    /// A named constant; resolves to an immediate push.
    Constant(T),
    /// A unit: postfix multiplier applied to the preceding atom.
    Unit(T),
    /// A native callback, indexed into `Data::funcs`.
    Func { index: u32 },
    /// A nested sub-parser, indexed into `Data::parsers`.
    SubParser { index: u32 },
}

#[derive(Clone, Debug)]
pub(crate) struct NameTable<T> {
    map: AHashMap<String, NameData<T>>,
}

impl<T> Default for NameTable<T> {
    fn default() -> Self {
        Self {
            map: AHashMap::default(),
        }
    }
}

impl<T: Scalar> NameTable<T> {
    pub fn get(&self, name: &str) -> Option<&NameData<T>> {
        self.map.get(name)
    }

    /// Registers a name after validating it and checking reservations.
    pub fn insert(&mut self, name: &str, data: NameData<T>) -> Result<(), NameError> {
        if !is_valid_identifier(name) {
            return Err(NameError::InvalidName(name.to_owned()));
        }
        if lookup_function(name).is_some() {
            return Err(NameError::Reserved(name.to_owned()));
        }
        if self.map.contains_key(name) {
            return Err(NameError::NameTaken(name.to_owned()));
        }
        self.map.insert(name.to_owned(), data);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.map.remove(name).is_some()
    }
}

/// Error from name registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NameError {
    /// The name is not a valid identifier.
    InvalidName(String),
    /// The name collides with a builtin function.
    Reserved(String),
    /// The name is already registered.
    NameTaken(String),
}

impl std::fmt::Display for NameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(n) => write!(f, "invalid identifier: {n:?}"),
            Self::Reserved(n) => write!(f, "name is reserved: {n:?}"),
            Self::NameTaken(n) => write!(f, "name already registered: {n:?}"),
        }
    }
}

impl std::error::Error for NameError {}

/// Whether a byte can begin an identifier.
pub(crate) fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

/// Whether a byte can continue an identifier.
pub(crate) fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

pub(crate) fn is_valid_identifier(name: &str) -> bool {
    let bytes = name.as_bytes();
    match bytes.first() {
        Some(&b) if is_ident_start(b) => bytes[1..].iter().all(|&b| is_ident_continue(b)),
        _ => false,
    }
}
