/// The result of merging a fragment `[b, e)` into a [`RangeSet`]: the
/// fragment is split into sub-ranges that were already covered (so the
/// caller should `check_stored` them) and ones that were not (so the
/// caller should `store_fragment` them), in left-to-right order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    New(i64, i64),
    AlreadyDone(i64, i64),
}

/// A sorted set of disjoint, non-adjacent `[start, end)` intervals over
/// `i64` offsets. Used both for a receiver's done-ranges and a sender's
/// todo-ranges — the same merge/gap bookkeeping applies to either, just
/// with opposite meaning attached by the caller.
#[derive(Debug, Default, Clone)]
pub struct RangeSet {
    ranges: Vec<(i64, i64)>,
}

impl RangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set that starts out covering the whole `[0, total_size)` span —
    /// the initial state of a sender's todo-ranges.
    pub fn full(total_size: i64) -> Self {
        let mut set = Self::new();
        if total_size > 0 {
            set.ranges.push((0, total_size));
        }
        set
    }

    pub fn ranges(&self) -> &[(i64, i64)] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn is_complete(&self, total_size: i64) -> bool {
        total_size <= 0 || (self.ranges.len() == 1 && self.ranges[0] == (0, total_size))
    }

    /// First interval, used by the outgoing path to pick the next bytes
    /// to send.
    pub fn first_range(&self) -> Option<(i64, i64)> {
        self.ranges.first().copied()
    }

    /// Merges `[b, e)` into the set, returning which parts of it were new
    /// versus already covered. Idempotent: merging the same range twice
    /// yields an empty set of `New` ops (and unchanged `ranges()`) the
    /// second time, only `AlreadyDone` ops.
    pub fn merge(&mut self, b: i64, e: i64) -> Vec<RangeOp> {
        if b >= e {
            return Vec::new();
        }
        let mut ops = Vec::new();
        let mut cursor = b;
        for &(rs, re) in &self.ranges {
            if re <= cursor {
                continue;
            }
            if rs >= e {
                break;
            }
            if rs > cursor {
                let stop = rs.min(e);
                ops.push(RangeOp::New(cursor, stop));
                cursor = stop;
            }
            let covered_end = re.min(e);
            if covered_end > cursor {
                ops.push(RangeOp::AlreadyDone(cursor, covered_end));
                cursor = covered_end;
            }
            if cursor >= e {
                break;
            }
        }
        if cursor < e {
            ops.push(RangeOp::New(cursor, e));
        }
        self.insert(b, e);
        ops
    }

    /// Inserts `[b, e)`, merging with any overlapping or touching
    /// existing interval so the set stays maximally coalesced.
    fn insert(&mut self, b: i64, e: i64) {
        let mut start = b;
        let mut end = e;
        let mut result = Vec::with_capacity(self.ranges.len() + 1);
        let mut inserted = false;
        for &(rs, re) in &self.ranges {
            if re < start {
                result.push((rs, re));
            } else if rs > end {
                if !inserted {
                    result.push((start, end));
                    inserted = true;
                }
                result.push((rs, re));
            } else {
                start = start.min(rs);
                end = end.max(re);
            }
        }
        if !inserted {
            result.push((start, end));
        }
        self.ranges = result;
    }

    /// Removes `[b, e)` from the set, splitting an interval if it only
    /// partially overlaps. Used by the outgoing path to drop bytes from
    /// the todo set once they have been sent.
    pub fn remove(&mut self, b: i64, e: i64) {
        if b >= e {
            return;
        }
        let mut result = Vec::with_capacity(self.ranges.len() + 1);
        for &(rs, re) in &self.ranges {
            if re <= b || rs >= e {
                result.push((rs, re));
                continue;
            }
            if rs < b {
                result.push((rs, b));
            }
            if re > e {
                result.push((e, re));
            }
        }
        self.ranges = result;
    }

    /// Gaps of `[0, total_size)` not covered by the set, in order.
    pub fn gaps(&self, total_size: i64) -> Vec<(i64, i64)> {
        let mut gaps = Vec::new();
        let mut cursor = 0i64;
        for &(rs, re) in &self.ranges {
            if rs > cursor {
                gaps.push((cursor, rs));
            }
            cursor = cursor.max(re);
        }
        if cursor < total_size {
            gaps.push((cursor, total_size));
        }
        gaps
    }
}
