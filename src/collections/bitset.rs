//! 按编号索引的可增长位向量

/// 位向量，超出当前长度的插入会自动扩容
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct BitSet {
    words: Vec<u64>,
    /// 置位个数
    ones: usize,
}

impl BitSet {
    pub(crate) fn with_capacity(bits: usize) -> Self {
        Self {
            words: vec![0; bits.div_ceil(64)],
            ones: 0,
        }
    }

    /// 置位，返回此前是否未置位
    pub(crate) fn insert(&mut self, index: usize) -> bool {
        let word = index / 64;
        if word >= self.words.len() {
            let mut len = self.words.len().max(1);
            while len <= word {
                len *= 2;
            }
            self.words.resize(len, 0);
        }
        let mask = 1u64 << (index % 64);
        if self.words[word] & mask != 0 {
            return false;
        }
        self.words[word] |= mask;
        self.ones += 1;
        true
    }

    /// 清位，返回此前是否置位
    pub(crate) fn remove(&mut self, index: usize) -> bool {
        let mask = 1u64 << (index % 64);
        match self.words.get_mut(index / 64) {
            Some(w) if *w & mask != 0 => {
                *w &= !mask;
                self.ones -= 1;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn contains(&self, index: usize) -> bool {
        self.words
            .get(index / 64)
            .is_some_and(|w| w & (1u64 << (index % 64)) != 0)
    }

    pub(crate) fn count(&self) -> usize {
        self.ones
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.ones == 0
    }

    pub(crate) fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
        self.ones = 0;
    }

    fn recount(&mut self) {
        self.ones = self.words.iter().map(|w| w.count_ones() as usize).sum();
    }

    /// 并集，返回是否有变化
    pub(crate) fn union_with(&mut self, other: &BitSet) -> bool {
        if self.words.len() < other.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        let before = self.ones;
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a |= *b;
        }
        self.recount();
        self.ones != before
    }

    /// 交集，返回是否有变化
    pub(crate) fn intersect_with(&mut self, other: &BitSet) -> bool {
        let before = self.ones;
        for (i, a) in self.words.iter_mut().enumerate() {
            *a &= other.words.get(i).copied().unwrap_or(0);
        }
        self.recount();
        self.ones != before
    }

    /// 差集，返回是否有变化
    pub(crate) fn difference_with(&mut self, other: &BitSet) -> bool {
        let before = self.ones;
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a &= !*b;
        }
        self.recount();
        self.ones != before
    }

    /// 按编号升序遍历置位
    pub(crate) fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let mut w = word;
            std::iter::from_fn(move || {
                if w == 0 {
                    return None;
                }
                let bit = w.trailing_zeros() as usize;
                w &= w - 1;
                Some(i * 64 + bit)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_grows() {
        let mut bits = BitSet::with_capacity(10);
        assert!(bits.insert(3));
        assert!(!bits.insert(3));
        assert!(bits.insert(700));
        assert!(bits.contains(700));
        assert!(!bits.contains(5000));
        assert_eq!(bits.count(), 2);
        assert_eq!(bits.iter().collect::<Vec<_>>(), vec![3, 700]);

        assert!(bits.remove(3));
        assert!(!bits.remove(3));
        assert!(!bits.remove(9999));
        assert_eq!(bits.count(), 1);
    }

    #[test]
    fn test_bulk_ops_report_change() {
        let mut a = BitSet::default();
        let mut b = BitSet::default();
        for i in [1, 2, 3, 64] {
            a.insert(i);
        }
        for i in [2, 64, 200] {
            b.insert(i);
        }

        let mut u = a.clone();
        assert!(u.union_with(&b));
        assert!(!u.union_with(&b));
        assert_eq!(u.iter().collect::<Vec<_>>(), vec![1, 2, 3, 64, 200]);

        let mut i = a.clone();
        assert!(i.intersect_with(&b));
        assert!(!i.intersect_with(&b));
        assert_eq!(i.iter().collect::<Vec<_>>(), vec![2, 64]);

        assert!(a.difference_with(&b));
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![1, 3]);

        a.clear();
        assert!(a.is_empty());
    }
}
