//! Reducer module - the core trait for business logic
//!
//! Reducers are functions: `(State, Action, Environment) → Effects`.
//! They mutate state in place and return effect *descriptions*; an
//! imperative shell interprets the effects (storage writes, callbacks).

use smallvec::SmallVec;

/// The Reducer trait - core abstraction for business logic
///
/// # Type Parameters
///
/// - `State`: The state this reducer operates on
/// - `Action`: The inputs this reducer processes
/// - `Effect`: The side-effect descriptions it returns
/// - `Environment`: The injected dependencies this reducer needs
///
/// # Example
///
/// ```ignore
/// impl Reducer for SessionReducer {
///     type State = SessionState;
///     type Action = SessionAction;
///     type Effect = SessionEffect;
///     type Environment = SessionEnvironment<C, G>;
///
///     fn reduce(
///         &self,
///         state: &mut SessionState,
///         action: SessionAction,
///         env: &Self::Environment,
///     ) -> SmallVec<[SessionEffect; 4]> {
///         match action {
///             SessionAction::Touch => { /* decide and persist */ }
///             _ => smallvec![SessionEffect::None],
///         }
///     }
/// }
/// ```
pub trait Reducer {
    /// The state type this reducer operates on
    type State;

    /// The action type this reducer processes
    type Action;

    /// The effect type this reducer produces
    type Effect;

    /// The environment type with injected dependencies
    type Environment;

    /// Reduce an action into state changes and effects
    ///
    /// # Arguments
    ///
    /// - `state`: Mutable reference to current state
    /// - `action`: The action to process
    /// - `env`: Reference to injected dependencies
    ///
    /// # Returns
    ///
    /// Effects to be executed by the caller, in order
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Self::Effect; 4]>;
}
