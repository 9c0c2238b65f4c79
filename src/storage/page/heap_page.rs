use crate::access::schema::SchemaDescriptor;
use crate::access::tuple::{RecordId, Tuple};
use crate::access::value::Field;
use crate::error::{DbError, DbResult};
use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use std::io::Cursor;
use std::sync::Arc;

// Layout: a slot bitmap (one bit per slot, LSB first) followed by
// fixed-width tuple records, then zero padding up to the page size.

/// A decoded heap page.
#[derive(Debug, Clone)]
pub struct HeapPage {
    page_id: PageId,
    schema: Arc<SchemaDescriptor>,
    page_size: usize,
    header: Vec<u8>,
    slots: Vec<Option<Tuple>>,
    dirtied_by: Option<TransactionId>,
}

impl HeapPage {
    /// Decode a page from exactly `page_size` bytes.
    pub fn new(
        page_id: PageId,
        schema: Arc<SchemaDescriptor>,
        page_size: usize,
        data: &[u8],
    ) -> DbResult<Self> {
        if data.len() != page_size {
            return Err(DbError::InvalidArgument(format!(
                "Page data must be {} bytes, got {}",
                page_size,
                data.len()
            )));
        }

        let num_slots = Self::slots_per_page(page_size, schema.byte_size());
        let header_size = num_slots.div_ceil(8);
        let tuple_size = schema.byte_size();
        let header = data[..header_size].to_vec();

        let mut slots = Vec::with_capacity(num_slots);
        for slot in 0..num_slots {
            if header[slot / 8] & (1 << (slot % 8)) == 0 {
                slots.push(None);
                continue;
            }
            let start = header_size + slot * tuple_size;
            let mut reader = Cursor::new(&data[start..start + tuple_size]);
            let fields = schema
                .types()
                .map(|t| t.parse_field(&mut reader))
                .collect::<DbResult<Vec<_>>>()?;
            let mut tuple = Tuple::new(fields);
            tuple.set_record_id(Some(RecordId::new(page_id, slot)));
            slots.push(Some(tuple));
        }

        Ok(Self {
            page_id,
            schema,
            page_size,
            header,
            slots,
            dirtied_by: None,
        })
    }

    /// Bytes of a page with every slot free.
    pub fn empty_page_data(page_size: usize) -> Vec<u8> {
        vec![0u8; page_size]
    }

    /// Number of tuples of `tuple_size` bytes that fit on a page, counting one
    /// header bit per slot.
    pub fn slots_per_page(page_size: usize, tuple_size: usize) -> usize {
        (page_size * 8) / (tuple_size * 8 + 1)
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn schema(&self) -> &Arc<SchemaDescriptor> {
        &self.schema
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn num_empty_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_none()).count()
    }

    pub fn has_empty_slot(&self) -> bool {
        self.slots.iter().any(|s| s.is_none())
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        matches!(self.slots.get(slot), Some(Some(_)))
    }

    /// Store `tuple` in the first free slot and return its new record id.
    pub fn insert_tuple(&mut self, tuple: Tuple) -> DbResult<RecordId> {
        self.schema.check(&tuple)?;

        let slot = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(DbError::PageFull(self.page_id))?;

        let record_id = RecordId::new(self.page_id, slot);
        let mut tuple = Tuple::new(
            tuple
                .into_fields()
                .into_iter()
                .map(Field::into_stored)
                .collect(),
        );
        tuple.set_record_id(Some(record_id));
        self.slots[slot] = Some(tuple);
        self.set_slot_bit(slot, true);
        Ok(record_id)
    }

    /// Free the slot referenced by `tuple`'s record id.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> DbResult<()> {
        let record_id = tuple
            .record_id()
            .ok_or_else(|| DbError::NotFound("tuple has no record id".to_string()))?;

        if record_id.page_id != self.page_id {
            return Err(DbError::NotFound(format!(
                "tuple lives on page {}, not {}",
                record_id.page_id, self.page_id
            )));
        }
        if !self.is_slot_used(record_id.slot) {
            return Err(DbError::NotFound(format!(
                "slot {} on page {} is already empty",
                record_id.slot, self.page_id
            )));
        }

        self.slots[record_id.slot] = None;
        self.set_slot_bit(record_id.slot, false);
        Ok(())
    }

    /// Stored tuples in slot order.
    pub fn tuples(&self) -> impl Iterator<Item = &Tuple> + '_ {
        self.slots.iter().flatten()
    }

    /// Encode the page back into `page_size` bytes.
    pub fn to_bytes(&self) -> DbResult<Vec<u8>> {
        let tuple_size = self.schema.byte_size();
        let mut data = Vec::with_capacity(self.page_size);
        data.extend_from_slice(&self.header);

        for slot in &self.slots {
            match slot {
                Some(tuple) => {
                    for field in tuple.fields() {
                        field.write_to(&mut data)?;
                    }
                }
                None => data.resize(data.len() + tuple_size, 0),
            }
        }

        data.resize(self.page_size, 0);
        Ok(data)
    }

    /// Record the transaction that last modified the page, or clear it.
    pub fn mark_dirty(&mut self, txn: Option<TransactionId>) {
        self.dirtied_by = txn;
    }

    pub fn dirtied_by(&self) -> Option<TransactionId> {
        self.dirtied_by
    }

    fn set_slot_bit(&mut self, slot: usize, used: bool) {
        let mask = 1u8 << (slot % 8);
        if used {
            self.header[slot / 8] |= mask;
        } else {
            self.header[slot / 8] &= !mask;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::value::{Field, FieldType};
    use crate::catalog::TableId;
    use anyhow::Result;

    const PAGE_SIZE: usize = 4096;

    fn int_pair_schema() -> Arc<SchemaDescriptor> {
        Arc::new(SchemaDescriptor::from_types(&[FieldType::Int, FieldType::Int]))
    }

    fn empty_page(schema: Arc<SchemaDescriptor>) -> Result<HeapPage> {
        let pid = PageId::new(TableId(1), 0);
        Ok(HeapPage::new(
            pid,
            schema,
            PAGE_SIZE,
            &HeapPage::empty_page_data(PAGE_SIZE),
        )?)
    }

    fn pair(a: i32, b: i32) -> Tuple {
        Tuple::new(vec![Field::Int(a), Field::Int(b)])
    }

    #[test]
    fn test_slot_capacity() -> Result<()> {
        // 4096 * 8 / (8 * 8 + 1) = 504
        let page = empty_page(int_pair_schema())?;
        assert_eq!(page.num_slots(), 504);
        assert_eq!(page.num_empty_slots(), 504);
        assert!(page.has_empty_slot());
        assert_eq!(page.tuples().count(), 0);
        Ok(())
    }

    #[test]
    fn test_insert_and_iterate() -> Result<()> {
        let mut page = empty_page(int_pair_schema())?;

        let rid1 = page.insert_tuple(pair(1, 10))?;
        let rid2 = page.insert_tuple(pair(2, 20))?;
        assert_eq!(rid1.slot, 0);
        assert_eq!(rid2.slot, 1);
        assert!(page.is_slot_used(0));
        assert_eq!(page.num_empty_slots(), 502);

        let stored: Vec<_> = page.tuples().cloned().collect();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].fields(), pair(1, 10).fields());
        assert_eq!(stored[1].record_id(), Some(rid2));
        Ok(())
    }

    #[test]
    fn test_insert_reuses_freed_slot() -> Result<()> {
        let mut page = empty_page(int_pair_schema())?;
        page.insert_tuple(pair(1, 1))?;
        page.insert_tuple(pair(2, 2))?;

        let victim = page.tuples().next().cloned().expect("slot 0 is used");
        page.delete_tuple(&victim)?;
        assert!(!page.is_slot_used(0));

        let rid = page.insert_tuple(pair(3, 3))?;
        assert_eq!(rid.slot, 0);
        Ok(())
    }

    #[test]
    fn test_delete_twice_fails() -> Result<()> {
        let mut page = empty_page(int_pair_schema())?;
        page.insert_tuple(pair(1, 1))?;
        let stored = page.tuples().next().cloned().expect("tuple stored");

        page.delete_tuple(&stored)?;
        assert!(matches!(page.delete_tuple(&stored), Err(DbError::NotFound(_))));
        Ok(())
    }

    #[test]
    fn test_delete_requires_record_id() -> Result<()> {
        let mut page = empty_page(int_pair_schema())?;
        assert!(matches!(
            page.delete_tuple(&pair(1, 1)),
            Err(DbError::NotFound(_))
        ));
        Ok(())
    }

    #[test]
    fn test_page_full() -> Result<()> {
        let mut page = empty_page(int_pair_schema())?;
        for i in 0..page.num_slots() {
            page.insert_tuple(pair(i as i32, 0))?;
        }
        assert!(!page.has_empty_slot());
        assert!(matches!(
            page.insert_tuple(pair(0, 0)),
            Err(DbError::PageFull(_))
        ));
        Ok(())
    }

    #[test]
    fn test_insert_rejects_wrong_shape() -> Result<()> {
        let mut page = empty_page(int_pair_schema())?;
        let bad = Tuple::new(vec![Field::Int(1), Field::Str("x".to_string())]);
        assert!(matches!(page.insert_tuple(bad), Err(DbError::TypeMismatch(_))));
        assert_eq!(page.num_empty_slots(), page.num_slots());
        Ok(())
    }

    #[test]
    fn test_bytes_survive_reload() -> Result<()> {
        let schema = Arc::new(SchemaDescriptor::from_types(&[FieldType::Int, FieldType::Str]));
        let mut page = empty_page(schema.clone())?;
        page.insert_tuple(Tuple::new(vec![Field::Int(1), Field::Str("a".to_string())]))?;
        page.insert_tuple(Tuple::new(vec![Field::Int(2), Field::Str("b".to_string())]))?;
        let first = page.tuples().next().cloned().expect("tuple stored");
        page.delete_tuple(&first)?;

        let bytes = page.to_bytes()?;
        assert_eq!(bytes.len(), PAGE_SIZE);
        // Slot 0 freed, slot 1 used
        assert_eq!(bytes[0], 0b0000_0010);

        let reloaded = HeapPage::new(page.page_id(), schema, PAGE_SIZE, &bytes)?;
        let tuples: Vec<_> = reloaded.tuples().collect();
        assert_eq!(tuples.len(), 1);
        assert_eq!(tuples[0].fields()[1], Field::Str("b".to_string()));
        assert_eq!(tuples[0].record_id().map(|r| r.slot), Some(1));
        Ok(())
    }

    #[test]
    fn test_long_string_cached_as_persisted() -> Result<()> {
        let schema = Arc::new(SchemaDescriptor::from_types(&[FieldType::Str]));
        let mut page = empty_page(schema.clone())?;
        page.insert_tuple(Tuple::new(vec![Field::Str("x".repeat(200))]))?;

        let cached = page.tuples().next().cloned().expect("tuple stored");
        assert_eq!(cached.fields(), &[Field::Str("x".repeat(128))]);

        let reloaded = HeapPage::new(page.page_id(), schema, PAGE_SIZE, &page.to_bytes()?)?;
        let persisted = reloaded.tuples().next().cloned().expect("tuple reloaded");
        assert_eq!(cached, persisted);
        Ok(())
    }

    #[test]
    fn test_wrong_data_length() {
        let result = HeapPage::new(
            PageId::new(TableId(1), 0),
            int_pair_schema(),
            PAGE_SIZE,
            &[0u8; 100],
        );
        assert!(matches!(result, Err(DbError::InvalidArgument(_))));
    }

    #[test]
    fn test_dirty_marker() -> Result<()> {
        let mut page = empty_page(int_pair_schema())?;
        assert_eq!(page.dirtied_by(), None);
        page.mark_dirty(Some(TransactionId::new(3)));
        assert_eq!(page.dirtied_by(), Some(TransactionId::new(3)));
        page.mark_dirty(None);
        assert_eq!(page.dirtied_by(), None);
        Ok(())
    }
}
