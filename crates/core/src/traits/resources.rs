//! Resource probes

use crate::error::Result;
use crate::types::MemoryUsage;

/// Reports memory usage of the device hosting model instances
pub trait MemoryProbe: Send + Sync {
    fn usage(&self) -> Result<MemoryUsage>;
}
