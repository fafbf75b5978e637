//! Ordered index: a B-tree whose nodes live in the record store.
//!
//! The tree stores references to data records and orders them through a
//! comparator supplied per operation, which is what lets one physical tree
//! serve both exact lookups and prefix scans (a prefix lookup is an exact
//! lookup under a comparator that treats a proper prefix as equal). Equal
//! keys are permitted and chain by insertion structure: a later-inserted
//! equal record lands to the right of earlier ones, so an in-order walk
//! reports them in insertion order.

use std::cmp::Ordering;

use smallvec::SmallVec;

use crate::error::{DbError, Result};
use crate::store::{RecordKind, RecordRef, RecordStore, NULL_REF};

/// Maximum records per node (2t - 1 with t = 4).
const MAX_RECORDS: usize = 7;
/// Minimum records per non-root node (t - 1).
const MIN_RECORDS: usize = 3;
const MAX_CHILDREN: usize = MAX_RECORDS + 1;

const OFF_COUNT: usize = 0;
const OFF_LEAF: usize = 2;
const OFF_KEYS: usize = 3;
const OFF_CHILDREN: usize = OFF_KEYS + 8 * MAX_RECORDS;
const NODE_SIZE: usize = OFF_CHILDREN + 8 * MAX_CHILDREN;

/// Orders two stored records.
pub trait RecordComparator {
    /// Returns the ordering of record `a` relative to record `b`.
    fn compare(&self, store: &RecordStore, a: RecordRef, b: RecordRef) -> Result<Ordering>;
}

/// Orders a lookup key relative to stored records.
pub trait SearchKey {
    /// Returns the ordering of the key relative to `record`.
    fn compare_to_record(&self, store: &RecordStore, record: RecordRef) -> Result<Ordering>;
}

/// In-order visitor with pruning and early abort.
pub trait IndexVisitor {
    /// Orders `record` relative to the visit target: `Less` means the
    /// record sorts before every match, `Equal` means it matches,
    /// `Greater` means it sorts after every match.
    fn compare(&self, store: &RecordStore, record: RecordRef) -> Result<Ordering>;
    /// Called for each matching record in order. Returning `false` stops
    /// the walk.
    fn visit(&mut self, store: &RecordStore, record: RecordRef) -> Result<bool>;
}

#[derive(Debug, Clone)]
struct Node {
    keys: SmallVec<[RecordRef; MAX_RECORDS]>,
    children: SmallVec<[RecordRef; MAX_CHILDREN]>,
}

impl Node {
    fn leaf() -> Self {
        Self {
            keys: SmallVec::new(),
            children: SmallVec::new(),
        }
    }

    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

fn read_node(store: &RecordStore, r: RecordRef) -> Result<Node> {
    let count = store.get_u16(r, OFF_COUNT)? as usize;
    if count > MAX_RECORDS {
        return Err(DbError::Corruption(format!(
            "index node holds {count} records"
        )));
    }
    let leaf = store.get_u8(r, OFF_LEAF)? != 0;
    let mut node = Node::leaf();
    for i in 0..count {
        node.keys.push(store.get_ref(r, OFF_KEYS + 8 * i)?);
    }
    if !leaf {
        for i in 0..=count {
            let child = store.get_ref(r, OFF_CHILDREN + 8 * i)?;
            if child.is_null() {
                return Err(DbError::Corruption("index node missing child".into()));
            }
            node.children.push(child);
        }
    }
    Ok(node)
}

fn write_node(store: &mut RecordStore, r: RecordRef, node: &Node) -> Result<()> {
    store.put_u16(r, OFF_COUNT, node.keys.len() as u16)?;
    store.put_u8(r, OFF_LEAF, u8::from(node.is_leaf()))?;
    for i in 0..MAX_RECORDS {
        let key = node.keys.get(i).copied().unwrap_or(NULL_REF);
        store.put_ref(r, OFF_KEYS + 8 * i, key)?;
    }
    for i in 0..MAX_CHILDREN {
        let child = node.children.get(i).copied().unwrap_or(NULL_REF);
        store.put_ref(r, OFF_CHILDREN + 8 * i, child)?;
    }
    Ok(())
}

fn alloc_node(store: &mut RecordStore, node: &Node) -> Result<RecordRef> {
    let r = store.allocate(RecordKind::BTreeNode, NODE_SIZE)?;
    write_node(store, r, node)?;
    Ok(r)
}

/// Handle to one ordered index; the root reference is persisted by the
/// owner (the database header keeps one per linkage plus the file index).
#[derive(Debug, Clone, Copy)]
pub struct BTree {
    root: RecordRef,
}

impl BTree {
    /// Wraps a persisted root (null for an empty tree).
    pub fn new(root: RecordRef) -> Self {
        Self { root }
    }

    /// Current root for header persistence.
    pub fn root(&self) -> RecordRef {
        self.root
    }

    /// Whether the tree holds no records.
    pub fn is_empty(&self) -> bool {
        self.root.is_null()
    }

    /// Inserts a record. Equal records chain to the right of the ones
    /// already present.
    pub fn insert(
        &mut self,
        store: &mut RecordStore,
        record: RecordRef,
        cmp: &dyn RecordComparator,
    ) -> Result<()> {
        if self.root.is_null() {
            let mut node = Node::leaf();
            node.keys.push(record);
            self.root = alloc_node(store, &node)?;
            return Ok(());
        }
        let root_node = read_node(store, self.root)?;
        if root_node.keys.len() >= MAX_RECORDS {
            let mut new_root = Node::leaf();
            new_root.children.push(self.root);
            let new_root_ref = alloc_node(store, &new_root)?;
            split_child(store, new_root_ref, 0)?;
            self.root = new_root_ref;
        }
        insert_non_full(store, self.root, record, cmp)
    }

    /// Finds the in-order-first record the key compares equal to.
    pub fn find_first(
        &self,
        store: &RecordStore,
        key: &dyn SearchKey,
    ) -> Result<Option<RecordRef>> {
        let mut node_ref = self.root;
        let mut best = None;
        while !node_ref.is_null() {
            let node = read_node(store, node_ref)?;
            let mut idx = node.keys.len();
            for (i, &k) in node.keys.iter().enumerate() {
                match key.compare_to_record(store, k)? {
                    Ordering::Less => {
                        idx = i;
                        break;
                    }
                    Ordering::Equal => {
                        best = Some(k);
                        idx = i;
                        break;
                    }
                    Ordering::Greater => {}
                }
            }
            if node.is_leaf() {
                break;
            }
            node_ref = node.children[idx];
        }
        Ok(best)
    }

    /// In-order traversal over the records the visitor compares equal to,
    /// stopping early when the visitor says so.
    pub fn visit(&self, store: &RecordStore, visitor: &mut dyn IndexVisitor) -> Result<()> {
        if self.root.is_null() {
            return Ok(());
        }
        visit_node(store, self.root, visitor)?;
        Ok(())
    }

    /// Removes one record located by identity among its comparator-equal
    /// peers. Returns whether it was found.
    pub fn remove(
        &mut self,
        store: &mut RecordStore,
        record: RecordRef,
        cmp: &dyn RecordComparator,
    ) -> Result<bool> {
        if self.root.is_null() {
            return Ok(false);
        }
        let removed = remove_rec(store, self.root, record, cmp)?;
        let root_node = read_node(store, self.root)?;
        if root_node.keys.is_empty() {
            let old_root = self.root;
            if root_node.is_leaf() {
                self.root = NULL_REF;
            } else {
                self.root = root_node.children[0];
            }
            store.free(old_root)?;
        }
        Ok(removed)
    }
}

fn visit_node(store: &RecordStore, node_ref: RecordRef, visitor: &mut dyn IndexVisitor) -> Result<bool> {
    let node = read_node(store, node_ref)?;
    for i in 0..=node.keys.len() {
        if !node.is_leaf() {
            let lower_ok =
                i == 0 || visitor.compare(store, node.keys[i - 1])? != Ordering::Greater;
            let upper_ok = i == node.keys.len()
                || visitor.compare(store, node.keys[i])? != Ordering::Less;
            if lower_ok && upper_ok && !visit_node(store, node.children[i], visitor)? {
                return Ok(false);
            }
        }
        if i < node.keys.len() {
            match visitor.compare(store, node.keys[i])? {
                Ordering::Less => {}
                Ordering::Equal => {
                    if !visitor.visit(store, node.keys[i])? {
                        return Ok(false);
                    }
                }
                // Everything further right sorts after the target.
                Ordering::Greater => return Ok(true),
            }
        }
    }
    Ok(true)
}

fn insert_non_full(
    store: &mut RecordStore,
    mut node_ref: RecordRef,
    record: RecordRef,
    cmp: &dyn RecordComparator,
) -> Result<()> {
    loop {
        let node = read_node(store, node_ref)?;
        let mut idx = node.keys.len();
        for (i, &k) in node.keys.iter().enumerate() {
            if cmp.compare(store, record, k)? == Ordering::Less {
                idx = i;
                break;
            }
        }
        if node.is_leaf() {
            let mut node = node;
            node.keys.insert(idx, record);
            return write_node(store, node_ref, &node);
        }
        let child_ref = node.children[idx];
        let child = read_node(store, child_ref)?;
        if child.keys.len() >= MAX_RECORDS {
            split_child(store, node_ref, idx)?;
            let node = read_node(store, node_ref)?;
            node_ref = if cmp.compare(store, record, node.keys[idx])? == Ordering::Less {
                node.children[idx]
            } else {
                node.children[idx + 1]
            };
        } else {
            node_ref = child_ref;
        }
    }
}

fn split_child(store: &mut RecordStore, parent_ref: RecordRef, idx: usize) -> Result<()> {
    let mut parent = read_node(store, parent_ref)?;
    let child_ref = parent.children[idx];
    let mut child = read_node(store, child_ref)?;

    let mid = MAX_RECORDS / 2;
    let median = child.keys[mid];

    let mut right = Node::leaf();
    right.keys.extend(child.keys.drain(mid + 1..));
    child.keys.pop();
    if !child.is_leaf() {
        right.children.extend(child.children.drain(mid + 1..));
    }
    let right_ref = alloc_node(store, &right)?;

    parent.keys.insert(idx, median);
    parent.children.insert(idx + 1, right_ref);

    write_node(store, child_ref, &child)?;
    write_node(store, parent_ref, &parent)
}

fn remove_rec(
    store: &mut RecordStore,
    node_ref: RecordRef,
    target: RecordRef,
    cmp: &dyn RecordComparator,
) -> Result<bool> {
    let node = read_node(store, node_ref)?;
    if let Some(idx) = node.keys.iter().position(|&k| k == target) {
        remove_at(store, node_ref, idx, cmp)?;
        return Ok(true);
    }
    if node.is_leaf() {
        return Ok(false);
    }
    // Equal keys chain, so the target may sit in any child whose range
    // can contain it; try them left to right. A child that actually lost
    // the record is repaired on the way back up if it went under-full.
    for i in 0..=node.keys.len() {
        let lower_ok =
            i == 0 || cmp.compare(store, node.keys[i - 1], target)? != Ordering::Greater;
        let upper_ok = i == node.keys.len()
            || cmp.compare(store, node.keys[i], target)? != Ordering::Less;
        if !(lower_ok && upper_ok) {
            continue;
        }
        if remove_rec(store, node.children[i], target, cmp)? {
            if read_node(store, node.children[i])?.keys.len() < MIN_RECORDS {
                fix_child(store, node_ref, i)?;
            }
            return Ok(true);
        }
    }
    Ok(false)
}

fn remove_at(
    store: &mut RecordStore,
    node_ref: RecordRef,
    idx: usize,
    cmp: &dyn RecordComparator,
) -> Result<()> {
    let node = read_node(store, node_ref)?;
    let target = node.keys[idx];
    if node.is_leaf() {
        let mut node = node;
        node.keys.remove(idx);
        return write_node(store, node_ref, &node);
    }

    let left_ref = node.children[idx];
    let right_ref = node.children[idx + 1];
    let left = read_node(store, left_ref)?;
    let right = read_node(store, right_ref)?;

    if left.keys.len() > MIN_RECORDS {
        let predecessor = take_extreme(store, left_ref, true)?;
        let mut node = read_node(store, node_ref)?;
        node.keys[idx] = predecessor;
        write_node(store, node_ref, &node)
    } else if right.keys.len() > MIN_RECORDS {
        let successor = take_extreme(store, right_ref, false)?;
        let mut node = read_node(store, node_ref)?;
        node.keys[idx] = successor;
        write_node(store, node_ref, &node)
    } else {
        merge_children(store, node_ref, idx)?;
        let node = read_node(store, node_ref)?;
        let merged_ref = node.children[idx];
        if remove_rec(store, merged_ref, target, cmp)? {
            Ok(())
        } else {
            Err(DbError::Corruption(
                "record lost while rebalancing index".into(),
            ))
        }
    }
}

/// Removes and returns the in-order max (`true`) or min (`false`) record
/// of the subtree, fixing minimal nodes on the way down.
fn take_extreme(store: &mut RecordStore, mut node_ref: RecordRef, max: bool) -> Result<RecordRef> {
    loop {
        let node = read_node(store, node_ref)?;
        if node.is_leaf() {
            let mut node = node;
            if node.keys.is_empty() {
                return Err(DbError::Corruption(
                    "empty leaf while rebalancing index".into(),
                ));
            }
            let record = if max {
                node.keys.pop().expect("leaf checked non-empty")
            } else {
                node.keys.remove(0)
            };
            write_node(store, node_ref, &node)?;
            return Ok(record);
        }
        let child_idx = if max { node.keys.len() } else { 0 };
        let child_ref = node.children[child_idx];
        let child = read_node(store, child_ref)?;
        if child.keys.len() <= MIN_RECORDS {
            fix_child(store, node_ref, child_idx)?;
            continue;
        }
        node_ref = child_ref;
    }
}

fn fix_child(store: &mut RecordStore, parent_ref: RecordRef, idx: usize) -> Result<()> {
    let parent = read_node(store, parent_ref)?;
    let left_rich = idx > 0
        && read_node(store, parent.children[idx - 1])?.keys.len() > MIN_RECORDS;
    if left_rich {
        return borrow_from_left(store, parent_ref, idx);
    }
    let right_rich = idx + 1 < parent.children.len()
        && read_node(store, parent.children[idx + 1])?.keys.len() > MIN_RECORDS;
    if right_rich {
        return borrow_from_right(store, parent_ref, idx);
    }
    if idx > 0 {
        merge_children(store, parent_ref, idx - 1)
    } else {
        merge_children(store, parent_ref, idx)
    }
}

fn borrow_from_left(store: &mut RecordStore, parent_ref: RecordRef, idx: usize) -> Result<()> {
    let mut parent = read_node(store, parent_ref)?;
    let left_ref = parent.children[idx - 1];
    let child_ref = parent.children[idx];
    let mut left = read_node(store, left_ref)?;
    let mut child = read_node(store, child_ref)?;

    let borrowed = left
        .keys
        .pop()
        .ok_or_else(|| DbError::Corruption("empty sibling while rebalancing index".into()))?;
    child.keys.insert(0, parent.keys[idx - 1]);
    parent.keys[idx - 1] = borrowed;
    if !child.is_leaf() {
        let moved = left
            .children
            .pop()
            .ok_or_else(|| DbError::Corruption("childless sibling while rebalancing".into()))?;
        child.children.insert(0, moved);
    }

    write_node(store, left_ref, &left)?;
    write_node(store, child_ref, &child)?;
    write_node(store, parent_ref, &parent)
}

fn borrow_from_right(store: &mut RecordStore, parent_ref: RecordRef, idx: usize) -> Result<()> {
    let mut parent = read_node(store, parent_ref)?;
    let child_ref = parent.children[idx];
    let right_ref = parent.children[idx + 1];
    let mut child = read_node(store, child_ref)?;
    let mut right = read_node(store, right_ref)?;

    child.keys.push(parent.keys[idx]);
    parent.keys[idx] = right.keys.remove(0);
    if !child.is_leaf() {
        child.children.push(right.children.remove(0));
    }

    write_node(store, child_ref, &child)?;
    write_node(store, right_ref, &right)?;
    write_node(store, parent_ref, &parent)
}

fn merge_children(store: &mut RecordStore, parent_ref: RecordRef, idx: usize) -> Result<()> {
    let mut parent = read_node(store, parent_ref)?;
    let left_ref = parent.children[idx];
    let right_ref = parent.children[idx + 1];
    let mut left = read_node(store, left_ref)?;
    let right = read_node(store, right_ref)?;

    left.keys.push(parent.keys.remove(idx));
    left.keys.extend(right.keys.iter().copied());
    left.children.extend(right.children.iter().copied());
    parent.children.remove(idx + 1);

    write_node(store, left_ref, &left)?;
    write_node(store, parent_ref, &parent)?;
    store.free(right_ref)
}
