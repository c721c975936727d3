//! Layer identities, outer to inner.

/// Scope layers in precedence order. Inner layers shadow outer ones; a
/// later-registered value in the same layer shadows but never mutates an
/// earlier one from the reader's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    /// Component-declared properties (outermost).
    Props,
    /// Own declared state.
    State,
    /// Computed values (derived, optionally settable).
    Computed,
    /// Values registered by lifecycle hooks: setup results, methods,
    /// injections, the translation function.
    Setup,
    /// Data-source result map and reload functions.
    Data,
    /// Block-local bindings from an enclosing loop or slot invocation
    /// (innermost).
    Block,
}

impl Layer {
    /// Lookup order, innermost first.
    pub const LOOKUP: [Layer; 6] = [
        Layer::Block,
        Layer::Data,
        Layer::Setup,
        Layer::Computed,
        Layer::State,
        Layer::Props,
    ];
}
