use crate::constants::DEFAULT_SEQUENCE_LIMIT;

/// Controls how the model builder disambiguates container kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Force numeric segments to materialize mappings instead of sequences.
    /// Dynamic-append segments still produce sequences.
    pub arrays_as_objects: bool,
    /// Largest index a sequence may be grown to.
    pub sequence_limit: usize,
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_arrays_as_objects(mut self, arrays_as_objects: bool) -> Self {
        self.arrays_as_objects = arrays_as_objects;
        self
    }

    pub fn with_sequence_limit(mut self, sequence_limit: usize) -> Self {
        self.sequence_limit = sequence_limit;
        self
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            arrays_as_objects: false,
            sequence_limit: DEFAULT_SEQUENCE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UrlDecodeOptions {
    /// Turn numeric-looking and literal (`true`, `false`, `null`, `undefined`)
    /// values into typed values.
    pub coerce: bool,
    pub build: BuildOptions,
}

impl UrlDecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_coerce(mut self, coerce: bool) -> Self {
        self.coerce = coerce;
        self
    }

    pub fn with_build(mut self, build: BuildOptions) -> Self {
        self.build = build;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MultipartOptions {
    pub boundary: Option<String>,
}

impl MultipartOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = Some(boundary.into());
        self
    }
}
