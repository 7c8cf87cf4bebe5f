//! Health monitoring for resource pools

/// Health status of a resource pool
///
/// # Examples
///
/// ```
/// use esox_resourcepool::HealthStatus;
///
/// let health = HealthStatus::new(3, 1, 4);
/// assert!(health.is_healthy());
/// assert_eq!(health.available_resources, 3);
///
/// let exhausted = HealthStatus::new(0, 4, 4);
/// assert!(!exhausted.is_healthy());
/// assert_eq!(exhausted.warning_count, 2);
/// ```
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Current pool utilization (0.0 to 1.0)
    pub utilization: f64,

    /// Resources waiting in the queue
    pub available_resources: usize,

    /// Resources checked out by callers
    pub checked_out_resources: usize,

    /// Pool size
    pub total_capacity: usize,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    /// Create a new health status
    pub fn new(available: usize, checked_out: usize, capacity: usize) -> Self {
        let utilization = if capacity > 0 {
            checked_out as f64 / capacity as f64
        } else {
            0.0
        };

        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if utilization > 0.9 {
            warnings.push(format!("High utilization: {:.1}%", utilization * 100.0));
            is_healthy = false;
        }

        if available == 0 && capacity > 0 {
            warnings.push("Pool is empty".to_string());
        }

        // Hook failures and failed replacements shrink the pool silently.
        if available + checked_out < capacity {
            warnings.push(format!(
                "Pool is running short: {} of {} resources accounted for",
                available + checked_out,
                capacity
            ));
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            utilization,
            available_resources: available,
            checked_out_resources: checked_out,
            total_capacity: capacity,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_pool_warns_but_stays_healthy() {
        let health = HealthStatus::new(1, 1, 4);
        assert!(health.is_healthy());
        assert_eq!(health.warning_count, 1);
        assert!(health.warnings[0].contains("2 of 4"));
    }
}
