use crate::strategy::types::{Decision, DecisionInput};

/// Core strategy trait
///
/// A strategy turns one symbol's indicator readings, latest quote and captured
/// position into a Go/NoGo decision.
///
/// # Implementation Notes
///
/// - `evaluate` must be pure: no I/O, no hidden state, same input gives the
///   same decision
/// - Indicator state is owned by the router, position state by the broker;
///   both arrive through [`DecisionInput`]
/// - Sizing and pricing happen afterwards in the order intent builder
///
/// # Example
///
/// ```ignore
/// struct AlwaysFlat;
///
/// impl Strategy for AlwaysFlat {
///     fn name(&self) -> &str { "always_flat" }
///
///     fn evaluate(&self, input: &DecisionInput<'_>) -> Decision {
///         Decision::no_go("never trades")
///     }
/// }
/// ```
pub trait Strategy: Send + Sync {
    /// Unique identifier for this strategy
    fn name(&self) -> &str;

    /// Evaluate one decision pass
    ///
    /// # Returns
    /// * `Decision::NoGo` - No action, with the reason
    /// * `Decision::Go(intent)` - The rule that matched and what it wants done
    fn evaluate(&self, input: &DecisionInput<'_>) -> Decision;
}

/// Boxed strategy for dynamic dispatch
pub type BoxedStrategy = Box<dyn Strategy>;
