use std::collections::HashMap;
use std::sync::RwLock;

use crate::types::Arbitrage;

struct Slot {
    value: Arbitrage,
    next: Option<usize>,
    prev: Option<usize>,
}

struct Inner {
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    by_pair: HashMap<String, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl Inner {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            by_pair: HashMap::new(),
            head: None,
            tail: None,
        }
    }

    fn profit_at(&self, idx: usize) -> rust_decimal::Decimal {
        self.slots[idx].as_ref().unwrap().value.profit_pct
    }

    fn alloc(&mut self, value: Arbitrage) -> usize {
        let slot = Slot {
            value,
            next: None,
            prev: None,
        };
        if let Some(idx) = self.free.pop() {
            self.slots[idx] = Some(slot);
            idx
        } else {
            self.slots.push(Some(slot));
            self.slots.len() - 1
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let s = self.slots[idx].as_ref().unwrap();
            (s.prev, s.next)
        };
        match prev {
            Some(p) => self.slots[p].as_mut().unwrap().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].as_mut().unwrap().prev = prev,
            None => self.tail = prev,
        }
    }

    fn insert_before(&mut self, anchor: usize, idx: usize) {
        let prev = self.slots[anchor].as_ref().unwrap().prev;
        self.slots[idx].as_mut().unwrap().next = Some(anchor);
        self.slots[idx].as_mut().unwrap().prev = prev;
        self.slots[anchor].as_mut().unwrap().prev = Some(idx);
        match prev {
            Some(p) => self.slots[p].as_mut().unwrap().next = Some(idx),
            None => self.head = Some(idx),
        }
    }

    fn insert_after(&mut self, anchor: usize, idx: usize) {
        let next = self.slots[anchor].as_ref().unwrap().next;
        self.slots[idx].as_mut().unwrap().prev = Some(anchor);
        self.slots[idx].as_mut().unwrap().next = next;
        self.slots[anchor].as_mut().unwrap().next = Some(idx);
        match next {
            Some(n) => self.slots[n].as_mut().unwrap().prev = Some(idx),
            None => self.tail = Some(idx),
        }
    }

    fn push_back(&mut self, idx: usize) {
        self.slots[idx].as_mut().unwrap().next = None;
        self.slots[idx].as_mut().unwrap().prev = self.tail;
        if let Some(t) = self.tail {
            self.slots[t].as_mut().unwrap().next = Some(idx);
        } else {
            self.head = Some(idx);
        }
        self.tail = Some(idx);
    }

    /// Two-ended scan: walk `from_head` forward and `from_tail`
    /// backward while they still straddle `profit`, then return
    /// whichever pointer the scan lands on.
    fn search(&self, mut from_head: usize, mut from_tail: usize, profit: rust_decimal::Decimal) -> usize {
        while self.profit_at(from_head) > profit && self.profit_at(from_tail) < profit {
            from_head = self.slots[from_head].as_ref().unwrap().next.unwrap_or(from_head);
            from_tail = self.slots[from_tail].as_ref().unwrap().prev.unwrap_or(from_tail);
        }
        if self.profit_at(from_head) <= profit {
            from_head
        } else {
            from_tail
        }
    }

    fn put(&mut self, value: Arbitrage) {
        let pair = value.pair.clone();
        let profit = value.profit_pct;

        let Some(head) = self.head else {
            let idx = self.alloc(value);
            self.head = Some(idx);
            self.tail = Some(idx);
            self.by_pair.insert(pair, idx);
            return;
        };

        if let Some(&found) = self.by_pair.get(&pair) {
            let scan_from = if self.profit_at(found) > profit {
                found
            } else {
                head
            };
            let target = self.search(scan_from, self.tail.unwrap(), profit);

            self.slots[found].as_mut().unwrap().value = value;

            if target != found {
                self.unlink(found);
                if self.profit_at(target) > profit {
                    self.insert_after(target, found);
                    if Some(target) == self.tail {
                        self.tail = Some(found);
                    }
                } else {
                    self.insert_before(target, found);
                    if Some(target) == self.head {
                        self.head = Some(found);
                    }
                }
            }
            return;
        }

        let tail = self.tail.unwrap();
        if profit < self.profit_at(tail) {
            let idx = self.alloc(value);
            self.push_back(idx);
            self.by_pair.insert(pair, idx);
        } else {
            let idx = self.alloc(value);
            let target = self.search(head, tail, profit);
            if self.profit_at(target) > profit {
                self.insert_after(target, idx);
                if Some(target) == self.tail {
                    self.tail = Some(idx);
                }
            } else {
                self.insert_before(target, idx);
                if Some(target) == self.head {
                    self.head = Some(idx);
                }
            }
            self.by_pair.insert(pair, idx);
        }
    }

    fn snapshot(&self, limit: Option<usize>) -> Vec<Arbitrage> {
        let mut out = Vec::new();
        let mut cur = self.head;
        while let Some(idx) = cur {
            if let Some(limit) = limit {
                if out.len() >= limit {
                    break;
                }
            }
            let slot = self.slots[idx].as_ref().unwrap();
            out.push(slot.value.clone());
            cur = slot.next;
        }
        out
    }
}

/// Concurrent ordered set keyed by pair, sorted by `profit_pct`
/// descending (head = highest), at most one entry per pair.
///
/// Backed by an arena-indexed doubly-linked list rather than raw
/// pointers, which Rust's aliasing rules make unsafe to express
/// directly. Reads (`snapshot`) and writes (`put`) are serialized by a
/// readers-writer lock: many concurrent snapshots, one exclusive
/// writer.
pub struct TopIndex {
    inner: RwLock<Inner>,
}

impl TopIndex {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::new()),
        }
    }

    /// Upsert by pair. Idempotent w.r.t. value: putting the same value
    /// twice leaves the snapshot unchanged.
    pub fn put(&self, arbitrage: Arbitrage) {
        self.inner.write().unwrap().put(arbitrage);
    }

    /// Head-to-tail copy, strictly non-increasing in `profit_pct`.
    pub fn snapshot(&self) -> Vec<Arbitrage> {
        self.inner.read().unwrap().snapshot(None)
    }

    /// Truncated head-to-tail copy of the top `limit` elements.
    pub fn snapshot_limit(&self, limit: usize) -> Vec<Arbitrage> {
        self.inner.read().unwrap().snapshot(Some(limit))
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().by_pair.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TopIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn arb(pair: &str, profit: rust_decimal::Decimal) -> Arbitrage {
        Arbitrage {
            pair: pair.to_string(),
            buy_exchange: Some("A".to_string()),
            sell_exchange: Some("B".to_string()),
            buy_price: dec!(1),
            sell_price: dec!(1),
            profit_pct: profit,
        }
    }

    #[test]
    fn orders_by_profit_descending() {
        let idx = TopIndex::new();
        idx.put(arb("X", dec!(5)));
        idx.put(arb("Y", dec!(9)));
        idx.put(arb("Z", dec!(2)));
        idx.put(arb("X", dec!(10)));

        let snap = idx.snapshot();
        let pairs: Vec<_> = snap.iter().map(|a| a.pair.as_str()).collect();
        assert_eq!(pairs, vec!["X", "Y", "Z"]);
        assert_eq!(snap[0].profit_pct, dec!(10));
    }

    #[test]
    fn at_most_one_entry_per_pair() {
        let idx = TopIndex::new();
        idx.put(arb("X", dec!(5)));
        idx.put(arb("X", dec!(1)));
        idx.put(arb("X", dec!(8)));
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.snapshot()[0].profit_pct, dec!(8));
    }

    #[test]
    fn put_is_idempotent_for_the_same_value() {
        let idx = TopIndex::new();
        idx.put(arb("X", dec!(5)));
        idx.put(arb("Y", dec!(9)));
        let before = idx.snapshot();
        idx.put(arb("X", dec!(5)));
        let after = idx.snapshot();
        assert_eq!(before, after);
    }

    #[test]
    fn snapshot_is_non_increasing() {
        let idx = TopIndex::new();
        for (pair, profit) in [("A", 3), ("B", 7), ("C", 1), ("D", 5), ("E", 9)] {
            idx.put(arb(pair, rust_decimal::Decimal::from(profit)));
        }
        let snap = idx.snapshot();
        for w in snap.windows(2) {
            assert!(w[0].profit_pct >= w[1].profit_pct);
        }
    }

    #[test]
    fn snapshot_limit_truncates_to_head() {
        let idx = TopIndex::new();
        idx.put(arb("A", dec!(3)));
        idx.put(arb("B", dec!(7)));
        idx.put(arb("C", dec!(1)));
        let top1 = idx.snapshot_limit(1);
        assert_eq!(top1.len(), 1);
        assert_eq!(top1[0].pair, "B");
    }
}
