use parksphere_render::RenderContextError;

/// The only failures the engine reports to its host.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The surface or render context could not be created.
    #[error("render context creation failed: {0}")]
    Context(#[from] RenderContextError),

    /// `initialize` was called twice.
    #[error("engine already initialized")]
    AlreadyInitialized,

    /// The engine was used after `dispose`.
    #[error("engine has been disposed")]
    Disposed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_error_converts() {
        let err: EngineError = RenderContextError::Unavailable("no adapter".into()).into();
        assert!(matches!(err, EngineError::Context(_)));
        assert_eq!(
            err.to_string(),
            "render context creation failed: render context unavailable: no adapter"
        );
    }
}
