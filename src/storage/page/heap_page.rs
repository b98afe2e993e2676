use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::common::{PageId, QuarryError, RecordId, Result, SlotId, TransactionId};
use crate::tuple::{Tuple, TupleDesc};

/// A heap page shared between the buffer pool and the transactions using it.
/// Mutation is only legal while holding an exclusive lock on the page.
pub type PageRef = Arc<RwLock<HeapPage>>;

/// Heap page layout:
///
/// +----------------------+
/// | Slot bitmap          |  ceil(num_slots / 8) bytes
/// +----------------------+
/// | Slot 0               |  tuple_size bytes each
/// | Slot 1               |
/// | ...                  |
/// | Slot num_slots - 1   |
/// +----------------------+
/// | Unused tail          |
/// +----------------------+
///
/// Bit `i % 8` of header byte `i / 8` is set when slot `i` holds a tuple.
/// `num_slots = floor(page_size * 8 / (tuple_size * 8 + 1))`, so each slot
/// costs its tuple bytes plus one header bit.
#[derive(Debug, Clone)]
pub struct HeapPage {
    page_id: PageId,
    desc: Arc<TupleDesc>,
    data: Vec<u8>,
    num_slots: usize,
    /// Transaction that last dirtied the page
    dirtier: Option<TransactionId>,
    /// Page bytes as of the moment the page became dirty
    before_image: Option<Bytes>,
}

impl HeapPage {
    /// Wraps raw page bytes read from disk. The page starts out clean.
    pub fn new(page_id: PageId, desc: Arc<TupleDesc>, data: Vec<u8>) -> Self {
        let num_slots = Self::slots_per_page(data.len(), &desc);
        Self {
            page_id,
            desc,
            data,
            num_slots,
            dirtier: None,
            before_image: None,
        }
    }

    /// Returns the bytes of a page with no tuples.
    pub fn empty_page_data(page_size: usize) -> Vec<u8> {
        vec![0u8; page_size]
    }

    /// Number of tuple slots on a page of `page_size` bytes.
    pub fn slots_per_page(page_size: usize, desc: &TupleDesc) -> usize {
        let tuple_bits = desc.byte_size() * 8 + 1;
        (page_size * 8) / tuple_bits
    }

    /// Size of the slot bitmap in bytes.
    pub fn header_size(&self) -> usize {
        self.num_slots.div_ceil(8)
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn page_size(&self) -> usize {
        self.data.len()
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    /// Returns whether slot `slot` holds a tuple.
    pub fn is_slot_used(&self, slot: usize) -> bool {
        slot < self.num_slots && (self.data[slot / 8] >> (slot % 8)) & 1 == 1
    }

    fn set_slot(&mut self, slot: usize, used: bool) {
        let mask = 1u8 << (slot % 8);
        if used {
            self.data[slot / 8] |= mask;
        } else {
            self.data[slot / 8] &= !mask;
        }
    }

    /// Returns the number of free slots.
    pub fn num_empty_slots(&self) -> usize {
        (0..self.num_slots).filter(|&s| !self.is_slot_used(s)).count()
    }

    fn slot_range(&self, slot: usize) -> std::ops::Range<usize> {
        let size = self.desc.byte_size();
        let start = self.header_size() + slot * size;
        start..start + size
    }

    /// Reads the tuple stored in `slot`.
    pub fn tuple(&self, slot: SlotId) -> Result<Tuple> {
        let slot_no = slot.as_usize();
        if slot_no >= self.num_slots {
            return Err(QuarryError::TupleNotFound(RecordId::new(self.page_id, slot)));
        }
        if !self.is_slot_used(slot_no) {
            return Err(QuarryError::EmptySlot(slot.as_u16()));
        }
        let range = self.slot_range(slot_no);
        let mut tuple = Tuple::from_bytes(Arc::clone(&self.desc), &self.data[range])
            .ok_or_else(|| QuarryError::SchemaMismatch("corrupt tuple bytes".to_string()))?;
        tuple.set_record_id(Some(RecordId::new(self.page_id, slot)));
        Ok(tuple)
    }

    /// Returns every stored tuple in slot order, each carrying its record id.
    pub fn tuples(&self) -> Vec<Tuple> {
        (0..self.num_slots)
            .filter(|&s| self.is_slot_used(s))
            .filter_map(|s| self.tuple(SlotId::new(s as u16)).ok())
            .collect()
    }

    /// Stores `tuple` in the first free slot and assigns its record id.
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> Result<RecordId> {
        if **tuple.tuple_desc() != *self.desc {
            return Err(QuarryError::SchemaMismatch(format!(
                "tuple is ({}), page holds ({})",
                tuple.tuple_desc(),
                self.desc
            )));
        }
        let slot = (0..self.num_slots)
            .find(|&s| !self.is_slot_used(s))
            .ok_or(QuarryError::PageFull(self.page_id))?;

        self.capture_before_image();
        let range = self.slot_range(slot);
        self.data[range].copy_from_slice(&tuple.to_bytes());
        self.set_slot(slot, true);

        let record_id = RecordId::new(self.page_id, SlotId::new(slot as u16));
        tuple.set_record_id(Some(record_id));
        Ok(record_id)
    }

    /// Frees the slot `tuple` occupies. Other slots are left where they are.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<()> {
        let record_id = tuple.record_id().ok_or(QuarryError::InvalidRecordId)?;
        let slot = record_id.slot_id.as_usize();
        if record_id.page_id != self.page_id || slot >= self.num_slots {
            return Err(QuarryError::TupleNotFound(record_id));
        }
        if !self.is_slot_used(slot) {
            return Err(QuarryError::EmptySlot(record_id.slot_id.as_u16()));
        }

        self.capture_before_image();
        self.set_slot(slot, false);
        Ok(())
    }

    fn capture_before_image(&mut self) {
        if self.before_image.is_none() {
            self.before_image = Some(Bytes::copy_from_slice(&self.data));
        }
    }

    /// Marks the page dirty on behalf of `txn`, or clean when `txn` is None.
    /// Becoming clean drops the before-image.
    pub fn mark_dirty(&mut self, txn: Option<TransactionId>) {
        match txn {
            Some(txn) => {
                self.capture_before_image();
                self.dirtier = Some(txn);
            }
            None => {
                self.dirtier = None;
                self.before_image = None;
            }
        }
    }

    /// Returns the transaction that dirtied the page, if it is dirty.
    pub fn dirtier(&self) -> Option<TransactionId> {
        self.dirtier
    }

    pub fn is_dirty(&self) -> bool {
        self.dirtier.is_some()
    }

    /// Returns the page bytes.
    pub fn page_data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the bytes the page had when it last became dirty,
    /// or its current bytes when it is clean.
    pub fn before_image_data(&self) -> Bytes {
        match &self.before_image {
            Some(image) => image.clone(),
            None => Bytes::copy_from_slice(&self.data),
        }
    }

    /// Returns a clean copy of the page as it was before it became dirty.
    pub fn before_image(&self) -> HeapPage {
        HeapPage::new(
            self.page_id,
            Arc::clone(&self.desc),
            self.before_image_data().to_vec(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TableId;
    use crate::tuple::{Field, FieldType};

    fn int_desc(n: usize) -> Arc<TupleDesc> {
        Arc::new(TupleDesc::unnamed(&vec![FieldType::Int; n]))
    }

    fn page(desc: &Arc<TupleDesc>) -> HeapPage {
        HeapPage::new(
            PageId::new(TableId::new(1), 0),
            Arc::clone(desc),
            HeapPage::empty_page_data(4096),
        )
    }

    fn row(desc: &Arc<TupleDesc>, v: i32) -> Tuple {
        let fields = (0..desc.num_fields()).map(|_| Field::Int(v)).collect();
        Tuple::new(Arc::clone(desc), fields).unwrap()
    }

    #[test]
    fn test_layout() {
        let desc = int_desc(2);
        let p = page(&desc);
        // 4096 * 8 / (8 * 8 + 1) = 504 slots, 63 header bytes
        assert_eq!(p.num_slots(), 504);
        assert_eq!(p.header_size(), 63);
        assert!(p.header_size() + p.num_slots() * 8 <= 4096);
        assert_eq!(p.num_empty_slots(), 504);
    }

    #[test]
    fn test_insert_assigns_first_free_slot() {
        let desc = int_desc(2);
        let mut p = page(&desc);

        let mut t0 = row(&desc, 10);
        let mut t1 = row(&desc, 11);
        assert_eq!(p.insert_tuple(&mut t0).unwrap().slot_id, SlotId::new(0));
        assert_eq!(p.insert_tuple(&mut t1).unwrap().slot_id, SlotId::new(1));
        assert_eq!(t1.record_id().unwrap().page_id, p.page_id());

        p.delete_tuple(&t0).unwrap();
        let mut t2 = row(&desc, 12);
        assert_eq!(p.insert_tuple(&mut t2).unwrap().slot_id, SlotId::new(0));
    }

    #[test]
    fn test_delete_does_not_move_other_slots() {
        let desc = int_desc(1);
        let mut p = page(&desc);
        let mut rows: Vec<Tuple> = (0..3).map(|v| row(&desc, v)).collect();
        for t in rows.iter_mut() {
            p.insert_tuple(t).unwrap();
        }

        p.delete_tuple(&rows[1]).unwrap();
        assert!(!p.is_slot_used(1));
        assert_eq!(p.tuple(SlotId::new(2)).unwrap(), rows[2]);
        assert_eq!(p.tuples().len(), 2);
        assert!(matches!(
            p.delete_tuple(&rows[1]),
            Err(QuarryError::EmptySlot(1))
        ));
    }

    #[test]
    fn test_page_full() {
        let desc = int_desc(1);
        let mut p = HeapPage::new(
            PageId::new(TableId::new(1), 0),
            Arc::clone(&desc),
            HeapPage::empty_page_data(64),
        );
        // 64 * 8 / 33 = 15 slots
        assert_eq!(p.num_slots(), 15);
        for v in 0..15 {
            p.insert_tuple(&mut row(&desc, v)).unwrap();
        }
        assert!(matches!(
            p.insert_tuple(&mut row(&desc, 99)),
            Err(QuarryError::PageFull(_))
        ));
    }

    #[test]
    fn test_schema_mismatch_rejected() {
        let mut p = page(&int_desc(2));
        let other = int_desc(3);
        assert!(matches!(
            p.insert_tuple(&mut row(&other, 1)),
            Err(QuarryError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_before_image_tracks_clean_state() {
        let desc = int_desc(1);
        let mut p = page(&desc);
        let clean = p.page_data().to_vec();

        p.insert_tuple(&mut row(&desc, 1)).unwrap();
        p.mark_dirty(Some(TransactionId(7)));
        p.insert_tuple(&mut row(&desc, 2)).unwrap();

        assert_eq!(p.dirtier(), Some(TransactionId(7)));
        assert_eq!(&p.before_image_data()[..], &clean[..]);
        assert_eq!(p.before_image().tuples().len(), 0);

        p.mark_dirty(None);
        assert!(!p.is_dirty());
        assert_eq!(&p.before_image_data()[..], p.page_data());
    }

    #[test]
    fn test_foreign_record_id_rejected() {
        let desc = int_desc(1);
        let mut p = page(&desc);
        let mut t = row(&desc, 1);
        t.set_record_id(Some(RecordId::new(
            PageId::new(TableId::new(2), 0),
            SlotId::new(0),
        )));
        assert!(matches!(
            p.delete_tuple(&t),
            Err(QuarryError::TupleNotFound(_))
        ));
        assert!(matches!(
            p.delete_tuple(&row(&desc, 1)),
            Err(QuarryError::InvalidRecordId)
        ));
    }
}
