//! Hard-stop errors.
//!
//! Everything else that can go wrong during a hunt (a missed attack, a
//! vanished target, a timed-out wait) is an ordinary outcome value handled
//! by the component that saw it. A [`HuntError`] ends the hunt.

/// Conditions under which the hunt cannot continue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HuntError {
    /// Relocation was needed but no destination profile is configured.
    #[error("relocation required but no relocation profile is configured")]
    NoRelocationProfile,

    /// Environment validation failed permanently.
    #[error("environment rejected: {reason}")]
    EnvironmentRejected {
        /// Reason reported by the validator.
        reason: String,
    },

    /// The host reported that supplies ran out.
    #[error("supplies exhausted")]
    SuppliesExhausted,
}
