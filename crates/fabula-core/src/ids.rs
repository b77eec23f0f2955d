//! Opaque identifier newtypes.
//!
//! The backend hands out `int64` identifiers for every entity. Zero is the
//! sentinel for "not assigned yet" (an unsaved fork, an unpersisted scene)
//! or "no parent" (a root board's `prev_board_id`).

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            Serialize, Deserialize, Default,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// The zero sentinel (absent / not yet assigned).
            pub const ZERO: Self = Self(0);

            /// Returns true when this id carries no assignment.
            #[must_use]
            pub fn is_zero(self) -> bool {
                self.0 == 0
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type! {
    /// Identifier of a story (the whole branching narrative).
    StoryId
}

id_type! {
    /// Identifier of a single board (one narrative beat / tree node).
    BoardId
}

id_type! {
    /// Identifier of a scene within a board. Zero until first persisted.
    SceneId
}

id_type! {
    /// Identifier of a platform user.
    UserId
}

id_type! {
    /// Identifier of a story character (role) attachable to a board.
    RoleId
}
