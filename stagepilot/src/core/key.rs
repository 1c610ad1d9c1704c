//! Stage identity.

use std::fmt::{Debug, Display};
use std::hash::Hash;

/// A closed set of stage identifiers.
///
/// Pipelines are generic over a user-declared enum rather than strings, so a
/// reference to a stage that does not exist fails to compile. Use
/// [`stage_keys!`](crate::stage_keys) to declare one.
pub trait StageKey: Copy + Eq + Ord + Hash + Debug + Display + Send + Sync + 'static {
    /// Stable string form, used as the persistence key and in events.
    fn as_str(&self) -> &'static str;
}

/// Declares a stage enum and implements [`StageKey`] for it.
///
/// ```
/// stagepilot::stage_keys! {
///     /// Stages of a tiny review flow.
///     pub enum ReviewStage {
///         /// Upload the draft.
///         Upload => "upload",
///         /// Approve or reject it.
///         Review => "review",
///     }
/// }
///
/// use stagepilot::core::StageKey;
/// assert_eq!(ReviewStage::Review.as_str(), "review");
/// assert_eq!(ReviewStage::ALL.len(), 2);
/// ```
#[macro_export]
macro_rules! stage_keys {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $key:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }

        impl $crate::core::StageKey for $name {
            fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $key ),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str($crate::core::StageKey::as_str(self))
            }
        }
    };
}
