use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{FleetError, Result};
use crate::types::Tier;

/// Width of the address block reserved for each tier inside the shared
/// subnet. Offsets are 10 apart, so a block must never grow past 10 hosts.
const TIER_BLOCK_WIDTH: u8 = 10;

/// Hands out unique host addresses per tier. Counters only ever move
/// forward; addresses are not reclaimed when a target is torn down.
pub struct IpAllocator {
    subnet: String,
    counters: Mutex<HashMap<Tier, u8>>,
}

impl IpAllocator {
    pub fn new(subnet: impl Into<String>) -> Self {
        Self {
            subnet: subnet.into(),
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn allocate(&self, tier: Tier) -> Result<String> {
        let mut counters = self.counters.lock().unwrap();
        let used = counters.entry(tier).or_insert(0);
        if *used + 1 >= TIER_BLOCK_WIDTH {
            return Err(FleetError::AddressPoolExhausted {
                tier: tier.as_str().to_string(),
            });
        }
        *used += 1;
        Ok(format!(
            "{}.{}",
            self.subnet,
            tier.spec().address_offset + *used
        ))
    }
}
