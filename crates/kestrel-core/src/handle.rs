use kestrel_wire::MAX_NAME_LEN;

/// A client-side reference to a name previously resolved via `find`.
/// Opaque to callers: the only thing it is good for is passing back into
/// `call`. Holds its own copy of the name, independent of the client that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handle {
    name: String,
}

impl Handle {
    pub(crate) fn new(name: &str) -> Self {
        debug_assert!(!name.is_empty() && name.len() <= MAX_NAME_LEN);
        Handle {
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
