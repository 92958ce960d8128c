//! Identity tokens scoping protocol messages.
//!
//! - [`ControllerToken`]: generated once per [`DTaskController`](crate::DTaskController),
//!   stable for its whole life; tags the kill broadcast and all worker-side state.
//! - [`TaskInstanceId`]: generated per launch; handed to the script factory.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! token {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random token.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

token!(
    /// Identity of one task controller.
    ControllerToken
);

token!(
    /// Identity of one task launch.
    TaskInstanceId
);
