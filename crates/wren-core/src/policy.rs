use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Policy {
    /// Validate pad bytes on unpad. Disabled only for interop with senders
    /// that skip the check; every unpad call goes through this flag.
    pub check_padding: bool,
    pub max_concurrent_units: usize,
    pub retry_counter_capacity: usize,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            check_padding: true,
            max_concurrent_units: 8,
            retry_counter_capacity: 1024,
        }
    }
}
