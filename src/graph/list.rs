//! 基于槽位下标的侵入式双向链表
//!
//! 全局节点链表与全局边链表共用这里的拼接逻辑；记录通过 `Linked` 暴露自身的前驱/后继。

/// 链表指针
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Links {
    pub(crate) prev: Option<u32>,
    pub(crate) next: Option<u32>,
}

pub(crate) trait Linked {
    fn links(&self) -> &Links;
    fn links_mut(&mut self) -> &mut Links;
}

/// 链表首尾
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ListEnds {
    pub(crate) first: Option<u32>,
    pub(crate) last: Option<u32>,
}

fn slot_mut<R>(slots: &mut [Option<R>], id: u32) -> &mut R {
    match slots.get_mut(id as usize) {
        Some(Some(rec)) => rec,
        _ => panic!("链表槽位 {} 已释放", id),
    }
}

impl ListEnds {
    /// 追加到表尾
    pub(crate) fn push_back<R: Linked>(&mut self, slots: &mut [Option<R>], id: u32) {
        let last = self.last;
        *slot_mut(slots, id).links_mut() = Links { prev: last, next: None };
        match last {
            Some(l) => slot_mut(slots, l).links_mut().next = Some(id),
            None => self.first = Some(id),
        }
        self.last = Some(id);
    }

    /// 插入到表头
    pub(crate) fn push_front<R: Linked>(&mut self, slots: &mut [Option<R>], id: u32) {
        let first = self.first;
        *slot_mut(slots, id).links_mut() = Links { prev: None, next: first };
        match first {
            Some(f) => slot_mut(slots, f).links_mut().prev = Some(id),
            None => self.last = Some(id),
        }
        self.first = Some(id);
    }

    /// 摘除，记录本身保留
    pub(crate) fn unlink<R: Linked>(&mut self, slots: &mut [Option<R>], id: u32) {
        let Links { prev, next } = *slot_mut(slots, id).links();
        match prev {
            Some(p) => slot_mut(slots, p).links_mut().next = next,
            None => {
                assert_eq!(self.first, Some(id), "链表头不一致");
                self.first = next;
            }
        }
        match next {
            Some(n) => slot_mut(slots, n).links_mut().prev = prev,
            None => {
                assert_eq!(self.last, Some(id), "链表尾不一致");
                self.last = prev;
            }
        }
        *slot_mut(slots, id).links_mut() = Links::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Item {
        links: Links,
    }

    impl Linked for Item {
        fn links(&self) -> &Links {
            &self.links
        }
        fn links_mut(&mut self) -> &mut Links {
            &mut self.links
        }
    }

    fn order(ends: &ListEnds, slots: &[Option<Item>]) -> Vec<u32> {
        let mut out = Vec::new();
        let mut cur = ends.first;
        while let Some(id) = cur {
            out.push(id);
            cur = slots[id as usize].as_ref().unwrap().links.next;
        }
        out
    }

    #[test]
    fn test_push_and_unlink() {
        let mut slots: Vec<Option<Item>> = (0..4).map(|_| Some(Item::default())).collect();
        let mut ends = ListEnds::default();

        ends.push_back(&mut slots, 0);
        ends.push_back(&mut slots, 1);
        ends.push_front(&mut slots, 2);
        ends.push_back(&mut slots, 3);
        assert_eq!(order(&ends, &slots), vec![2, 0, 1, 3]);

        ends.unlink(&mut slots, 0);
        assert_eq!(order(&ends, &slots), vec![2, 1, 3]);

        ends.unlink(&mut slots, 2);
        ends.unlink(&mut slots, 3);
        assert_eq!(order(&ends, &slots), vec![1]);
        assert_eq!(ends.first, ends.last);

        ends.unlink(&mut slots, 1);
        assert_eq!(ends, ListEnds::default());
    }
}
