//! # Fresh-Name Counter
//!
//! A single monotonically increasing counter shared across validation, TACKY
//! lowering, and code generation. Each stage gets its own instance threaded
//! through by the top-level driver rather than a true process global, but
//! the guarantee is the same: the counter is never reset mid-compilation, so
//! every name it produces is unique for the life of the compile.

#[derive(Debug, Default)]
pub struct Counter(u64);

impl Counter {
    pub fn new() -> Self {
        Self(0)
    }

    /// A name guaranteed distinct from every other name this counter has
    /// produced, prefixed for readability in emitted assembly comments.
    pub fn fresh(&mut self, prefix: &str) -> String {
        let name = format!("{prefix}.{}", self.0);
        self.0 += 1;
        name
    }
}
