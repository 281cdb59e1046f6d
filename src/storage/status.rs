//! Status variable table
//!
//! Fixed-index array of [`Value32`] cells in FRAM at byte offset
//! `index * 4`. With triple writing enabled the physical layout is three
//! consecutive copies of the table; a logical write updates all three
//! and a logical read returns the majority value, which tolerates a
//! single-event upset in any one copy.

use crate::log_error;
use crate::platform::traits::FramInterface;
use crate::storage::error::{Result, StorageError};
use crate::storage::value::Value32;

/// Number of physical copies when triple writing is on.
const TRIPLE_COPIES: usize = 3;

#[derive(Debug)]
pub(crate) struct StatusTable {
    len: usize,
    copies: usize,
}

impl StatusTable {
    pub fn new(len: usize, triple_writing: bool) -> Self {
        Self {
            len,
            copies: if triple_writing { TRIPLE_COPIES } else { 1 },
        }
    }

    /// Bytes of FRAM occupied by all copies.
    pub fn fram_bytes(&self) -> usize {
        self.len * self.copies * 4
    }

    /// Overwrite every slot of every copy with zero.
    pub fn clear<M: FramInterface>(&self, fram: &mut M) -> Result<()> {
        for slot in 0..self.len * self.copies {
            write_slot(fram, slot, Value32::ZERO)?;
        }
        Ok(())
    }

    /// Logical read with majority voting.
    pub fn get<M: FramInterface>(&self, fram: &mut M, index: usize) -> Result<Value32> {
        if index >= self.len {
            return Err(StorageError::Bounds);
        }

        let v1 = read_slot(fram, index)?;
        if self.copies == 1 {
            return Ok(v1);
        }

        let v2 = read_slot(fram, index + self.len)?;
        let v3 = read_slot(fram, index + 2 * self.len)?;

        if v1 == v2 || v1 == v3 {
            Ok(v1)
        } else if v2 == v3 {
            Ok(v2)
        } else {
            log_error!("Unable to get a correct value for status index {}", index);
            Ok(v1)
        }
    }

    /// Logical write to every copy.
    ///
    /// All copies are attempted even if one fails, so a transient fault
    /// in one region cannot leave the others stale.
    pub fn set<M: FramInterface>(&self, fram: &mut M, index: usize, value: Value32) -> Result<()> {
        if index >= self.len {
            return Err(StorageError::Bounds);
        }

        let mut result = Ok(());
        for copy in 0..self.copies {
            let rc = write_slot(fram, index + copy * self.len, value);
            if result.is_ok() {
                result = rc;
            }
        }
        result
    }
}

fn read_slot<M: FramInterface>(fram: &mut M, slot: usize) -> Result<Value32> {
    let mut buf = [0u8; 4];
    fram.read(slot as u32 * 4, &mut buf)?;
    Ok(Value32::from_le_bytes(buf))
}

fn write_slot<M: FramInterface>(fram: &mut M, slot: usize, value: Value32) -> Result<()> {
    fram.write(slot as u32 * 4, &value.to_le_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::MockFram;

    const LEN: usize = 16;

    #[test]
    fn single_copy_roundtrip() {
        let mut fram = MockFram::new(1024);
        let table = StatusTable::new(LEN, false);

        table.set(&mut fram, 3, Value32::from_int(-42)).unwrap();
        assert_eq!(table.get(&mut fram, 3).unwrap().as_int(), -42);
        assert_eq!(table.fram_bytes(), LEN * 4);
    }

    #[test]
    fn triple_write_updates_all_copies() {
        let mut fram = MockFram::new(1024);
        let table = StatusTable::new(LEN, true);

        table.set(&mut fram, 7, Value32::from_uint(0xA5)).unwrap();

        for copy in 0..3 {
            assert_eq!(
                fram.contents((7 + copy * LEN) as u32 * 4, 4),
                0xA5u32.to_le_bytes().to_vec()
            );
        }
    }

    #[test]
    fn voting_outvotes_single_corruption() {
        let mut fram = MockFram::new(1024);
        let table = StatusTable::new(LEN, true);

        table.set(&mut fram, 7, Value32::from_uint(0xA5)).unwrap();
        // Flip the first copy
        fram.write(7 * 4, &0u32.to_le_bytes()).unwrap();

        assert_eq!(table.get(&mut fram, 7).unwrap().as_uint(), 0xA5);
    }

    #[test]
    fn double_corruption_does_not_abort() {
        let mut fram = MockFram::new(1024);
        let table = StatusTable::new(LEN, true);

        table.set(&mut fram, 7, Value32::from_uint(0xA5)).unwrap();
        fram.write(7 * 4, &1u32.to_le_bytes()).unwrap();
        fram.write((7 + LEN) as u32 * 4, &2u32.to_le_bytes()).unwrap();

        // Three-way disagreement: the first copy is returned
        assert_eq!(table.get(&mut fram, 7).unwrap().as_uint(), 1);
    }

    #[test]
    fn out_of_bounds_index_rejected() {
        let mut fram = MockFram::new(1024);
        let table = StatusTable::new(LEN, true);

        assert_eq!(
            table.get(&mut fram, LEN).unwrap_err(),
            StorageError::Bounds
        );
        assert_eq!(
            table.set(&mut fram, LEN, Value32::ZERO).unwrap_err(),
            StorageError::Bounds
        );
    }

    #[test]
    fn clear_zeroes_every_copy() {
        let mut fram = MockFram::new(1024);
        let table = StatusTable::new(LEN, true);

        table.set(&mut fram, 0, Value32::from_uint(0xFFFF)).unwrap();
        table.clear(&mut fram).unwrap();

        assert_eq!(table.get(&mut fram, 0).unwrap(), Value32::ZERO);
        assert_eq!(fram.contents(0, LEN * 3 * 4), vec![0u8; LEN * 3 * 4]);
    }
}
