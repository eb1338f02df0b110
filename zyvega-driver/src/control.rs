use heapless::FnvIndexMap;
use zyvega_common::address::UnicastAddress;

/// Transaction identifiers for Generic Set messages, one counter per
/// destination so that consecutive commands are never taken for
/// retransmissions.
pub struct TransactionIds<const N: usize> {
    next: FnvIndexMap<u16, u8, N>,
}

impl<const N: usize> Default for TransactionIds<N> {
    fn default() -> Self {
        Self {
            next: FnvIndexMap::new(),
        }
    }
}

impl<const N: usize> TransactionIds<N> {
    pub fn next(&mut self, destination: UnicastAddress) -> u8 {
        let key = destination.value();
        if let Some(tid) = self.next.get_mut(&key) {
            let current = *tid;
            *tid = current.wrapping_add(1);
            return current;
        }
        if self.next.insert(key, 1).is_err() {
            // table full, start over
            self.next.clear();
            let _ = self.next.insert(key, 1);
        }
        0
    }

    pub fn forget(&mut self, destination: UnicastAddress) {
        self.next.remove(&destination.value());
    }

    pub fn clear(&mut self) {
        self.next.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn per_destination_and_wrapping() {
        let mut tids: TransactionIds<4> = TransactionIds::default();
        let a = UnicastAddress::new(0x0002).unwrap();
        let b = UnicastAddress::new(0x0003).unwrap();

        assert_eq!(tids.next(a), 0);
        assert_eq!(tids.next(a), 1);
        assert_eq!(tids.next(b), 0);

        for _ in 2..256 {
            tids.next(a);
        }
        assert_eq!(tids.next(a), 0);

        tids.forget(b);
        assert_eq!(tids.next(b), 0);
    }

    #[test]
    fn full_table_starts_over() {
        let mut tids: TransactionIds<2> = TransactionIds::default();
        for addr in 2..4 {
            tids.next(UnicastAddress::new(addr).unwrap());
        }
        let c = UnicastAddress::new(0x0010).unwrap();
        assert_eq!(tids.next(c), 0);
        assert_eq!(tids.next(c), 1);
    }
}
