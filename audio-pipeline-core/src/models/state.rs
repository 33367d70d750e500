/// Capture lifecycle state machine.
///
/// State transitions:
/// ```text
/// uninitialized → initialized → capturing
///                      ↑            ↓
///                      └── stop ────┘
/// ```
///
/// `dispose` returns the controller to `Uninitialized` from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Uninitialized,
    Initialized,
    Capturing,
}

impl CaptureState {
    pub fn is_uninitialized(&self) -> bool {
        matches!(self, Self::Uninitialized)
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self, Self::Initialized)
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Capturing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_predicates() {
        assert!(CaptureState::Uninitialized.is_uninitialized());
        assert!(CaptureState::Initialized.is_initialized());
        assert!(CaptureState::Capturing.is_capturing());
        assert!(!CaptureState::Capturing.is_initialized());
    }
}
