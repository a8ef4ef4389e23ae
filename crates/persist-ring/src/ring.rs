/// Index of an entry in the owning arena.
pub type Slot = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Link {
    /// Neighbour towards the head (more recently used).
    prev: Option<Slot>,
    /// Neighbour towards the tail (less recently used).
    next: Option<Slot>,
}

/// Doubly-linked recency ring over arena slots.
#[derive(Clone, Debug, Default)]
pub struct Ring {
    links: Vec<Option<Link>>,
    head: Option<Slot>,
    tail: Option<Slot>,
    len: usize,
}

impl Ring {
    /// Create an empty ring.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty ring with room for `capacity` slots.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            links: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Number of linked slots.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no slot is linked.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Most recently used slot.
    pub fn head(&self) -> Option<Slot> {
        self.head
    }

    /// Least recently used slot.
    pub fn tail(&self) -> Option<Slot> {
        self.tail
    }

    /// Returns `true` if `slot` is currently part of the ring.
    pub fn is_linked(&self, slot: Slot) -> bool {
        matches!(self.links.get(slot), Some(Some(_)))
    }

    /// Neighbour of `slot` towards the head, or `None` if `slot` is the head.
    ///
    /// Panics if `slot` is not linked.
    pub fn prev(&self, slot: Slot) -> Option<Slot> {
        self.link(slot).prev
    }

    /// Neighbour of `slot` towards the tail, or `None` if `slot` is the tail.
    ///
    /// Panics if `slot` is not linked.
    pub fn next(&self, slot: Slot) -> Option<Slot> {
        self.link(slot).next
    }

    /// Link `slot` in as the most recently used entry.
    pub fn add_to_head(&mut self, slot: Slot) {
        if self.is_linked(slot) {
            panic!("ring fault: slot {slot} is already linked");
        }
        if slot >= self.links.len() {
            self.links.resize(slot + 1, None);
        }

        let old_head = self.head;
        self.links[slot] = Some(Link {
            prev: None,
            next: old_head,
        });
        match old_head {
            Some(h) => self.link_mut(h).prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);
        self.len += 1;
    }

    /// Unlink `slot` from the ring.
    pub fn remove(&mut self, slot: Slot) {
        let link = match self.links.get_mut(slot).and_then(Option::take) {
            Some(link) => link,
            None => panic!("ring fault: cannot remove slot {slot}, it is not linked"),
        };

        match link.prev {
            Some(p) => self.link_mut(p).next = link.next,
            None => self.head = link.next,
        }
        match link.next {
            Some(n) => self.link_mut(n).prev = link.prev,
            None => self.tail = link.prev,
        }
        self.len -= 1;
    }

    /// Mark `slot` as the most recently used entry.
    pub fn move_to_head(&mut self, slot: Slot) {
        if self.head == Some(slot) {
            return;
        }
        self.remove(slot);
        self.add_to_head(slot);
    }

    /// Iterate from head (newest) to tail (oldest).
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            ring: self,
            cursor: self.head,
            reverse: false,
        }
    }

    /// Iterate from tail (oldest) to head (newest).
    pub fn iter_from_tail(&self) -> Iter<'_> {
        Iter {
            ring: self,
            cursor: self.tail,
            reverse: true,
        }
    }

    /// Unlink every slot, returning them in head-to-tail order.
    pub fn drain(&mut self) -> Vec<Slot> {
        let slots: Vec<Slot> = self.iter().collect();
        self.links.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
        slots
    }

    fn link(&self, slot: Slot) -> Link {
        match self.links.get(slot) {
            Some(Some(link)) => *link,
            _ => panic!("ring fault: slot {slot} is not linked"),
        }
    }

    fn link_mut(&mut self, slot: Slot) -> &mut Link {
        match self.links.get_mut(slot) {
            Some(Some(link)) => link,
            _ => panic!("ring fault: neighbour slot {slot} is not linked"),
        }
    }
}

/// Iterator over linked slots in either direction.
pub struct Iter<'a> {
    ring: &'a Ring,
    cursor: Option<Slot>,
    reverse: bool,
}

impl Iterator for Iter<'_> {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        let slot = self.cursor?;
        let link = self.ring.link(slot);
        self.cursor = if self.reverse { link.prev } else { link.next };
        Some(slot)
    }
}
