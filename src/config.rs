/// Runtime-tunable knobs. None of these change query semantics as defined
/// by the spec; they govern ambient behaviour the spec leaves to the
/// embedder (buffer sizing, cast-failure policy).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Initial capacity hint for materializing operators (hash-join build
    /// side, GROUP BY, ORDER BY, DISTINCT). Purely an allocation hint.
    pub materialize_buffer_hint: usize,

    /// When true, a `CAST` that cannot succeed raises
    /// `RuntimeError` instead of the spec's default of yielding NULL.
    /// Spec.md §7 calls this out as a caller-selectable policy
    /// ("cast failures that the caller elected to surface").
    pub strict_casts: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            materialize_buffer_hint: 128,
            strict_casts: false,
        }
    }
}
