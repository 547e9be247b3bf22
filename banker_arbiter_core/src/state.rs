use crate::error::ArbiterError;

/// Allocation state for a fixed population of processes and resource classes.
///
/// All three matrices are stored flat (`process * resources + resource`);
/// `need` is derived, never set directly. The struct is plain data so the
/// supervisor can snapshot it without any storage policy.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BankerState {
    processes: usize,
    resources: usize,
    available: Vec<u32>,
    maximum: Vec<u32>,
    allocation: Vec<u32>,
    need: Vec<u32>,
}

impl BankerState {
    /// Create an arena for `processes` processes competing for `resources`
    /// resource classes. All counts start at zero; callers initialize via
    /// [`set_available`](Self::set_available) and
    /// [`register_process`](Self::register_process).
    pub fn new(processes: usize, resources: usize) -> Self {
        BankerState {
            processes,
            resources,
            available: vec![0; resources],
            maximum: vec![0; processes * resources],
            allocation: vec![0; processes * resources],
            need: vec![0; processes * resources],
        }
    }

    pub fn processes(&self) -> usize {
        self.processes
    }

    pub fn resources(&self) -> usize {
        self.resources
    }

    /// Replace `available` wholesale.
    ///
    /// Call exactly once before evaluating safety or requests; re-setting it
    /// after grants have been committed breaks the conservation invariant the
    /// safety scan assumes (documented precondition, not checked here).
    pub fn set_available(&mut self, values: &[u32]) -> Result<(), ArbiterError> {
        self.check_len(values)?;
        self.available.copy_from_slice(values);
        Ok(())
    }

    /// Register (or re-register, by overwrite) one process row: its maximum
    /// claim and its current allocation. `need` is derived element-wise.
    pub fn register_process(
        &mut self,
        id: usize,
        maximum: &[u32],
        allocation: &[u32],
    ) -> Result<(), ArbiterError> {
        self.check_id(id)?;
        self.check_len(maximum)?;
        self.check_len(allocation)?;
        for r in 0..self.resources {
            if allocation[r] > maximum[r] {
                return Err(ArbiterError::AllocationAboveMaximum {
                    id,
                    resource: r,
                    allocated: allocation[r],
                    maximum: maximum[r],
                });
            }
        }

        let row = self.row_range(id);
        self.maximum[row.clone()].copy_from_slice(maximum);
        self.allocation[row.clone()].copy_from_slice(allocation);
        for r in 0..self.resources {
            self.need[row.start + r] = maximum[r] - allocation[r];
        }
        Ok(())
    }

    pub fn available(&self) -> &[u32] {
        &self.available
    }

    pub fn maximum_row(&self, id: usize) -> Option<&[u32]> {
        self.row(&self.maximum, id)
    }

    pub fn allocation_row(&self, id: usize) -> Option<&[u32]> {
        self.row(&self.allocation, id)
    }

    pub fn need_row(&self, id: usize) -> Option<&[u32]> {
        self.row(&self.need, id)
    }

    /// Per-resource totals: `available[r] + sum over allocation[_][r]`.
    ///
    /// The arbiter never mutates this quantity after initialization; tests
    /// assert it stays constant across any granted/denied request sequence.
    pub fn totals(&self) -> Vec<u64> {
        let mut out: Vec<u64> = self.available.iter().map(|&v| u64::from(v)).collect();
        for p in 0..self.processes {
            let row = self.row_range(p);
            for r in 0..self.resources {
                out[r] += u64::from(self.allocation[row.start + r]);
            }
        }
        out
    }

    pub(crate) fn check_id(&self, id: usize) -> Result<(), ArbiterError> {
        if id >= self.processes {
            return Err(ArbiterError::UnknownProcess {
                id,
                processes: self.processes,
            });
        }
        Ok(())
    }

    pub(crate) fn check_len(&self, values: &[u32]) -> Result<(), ArbiterError> {
        if values.len() != self.resources {
            return Err(ArbiterError::DimensionMismatch {
                expected: self.resources,
                actual: values.len(),
            });
        }
        Ok(())
    }

    /// Apply or reverse a tentative grant. One code path for both directions
    /// keeps the rollback arithmetic in lockstep with the forward apply.
    ///
    /// Callers must have passed the claim and availability gates first:
    /// `grant` assumes `request <= need[id]` and `request <= available`,
    /// `!grant` assumes the same request was applied immediately before.
    pub(crate) fn shift(&mut self, id: usize, request: &[u32], grant: bool) {
        let row = self.row_range(id);
        for r in 0..self.resources {
            if grant {
                self.available[r] -= request[r];
                self.allocation[row.start + r] += request[r];
                self.need[row.start + r] -= request[r];
            } else {
                self.available[r] += request[r];
                self.allocation[row.start + r] -= request[r];
                self.need[row.start + r] += request[r];
            }
        }
    }

    pub(crate) fn row_range(&self, id: usize) -> std::ops::Range<usize> {
        let start = id * self.resources;
        start..start + self.resources
    }

    fn row<'a>(&self, matrix: &'a [u32], id: usize) -> Option<&'a [u32]> {
        if id >= self.processes {
            return None;
        }
        Some(&matrix[self.row_range(id)])
    }
}
