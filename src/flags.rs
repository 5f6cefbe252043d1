//! Creation flags, orthogonal as specified: `{Ephemeral, Sequential}`.

use serde_derive::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFlags {
    pub ephemeral: bool,
    pub sequential: bool,
}

impl CreateFlags {
    pub const NONE: CreateFlags = CreateFlags {
        ephemeral: false,
        sequential: false,
    };

    pub const EPHEMERAL: CreateFlags = CreateFlags {
        ephemeral: true,
        sequential: false,
    };

    pub const SEQUENTIAL: CreateFlags = CreateFlags {
        ephemeral: false,
        sequential: true,
    };

    pub const EPHEMERAL_SEQUENTIAL: CreateFlags = CreateFlags {
        ephemeral: true,
        sequential: true,
    };
}
