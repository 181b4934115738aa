use crate::consts::{NDIRECT, NINDIRECT};
use crate::util::error::{Error, Result};

/// Sizes of the direct and indirect addressing tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tiers {
    pub direct: usize,
    pub indirect: usize,
}

/// Where a logical block lives inside a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockIndex {
    Direct(usize),
    Indirect(usize),
    DoublyIndirect { outer: usize, inner: usize },
}

impl Tiers {
    pub const ON_DISK: Tiers = Tiers { direct: NDIRECT, indirect: NINDIRECT };

    /// Narrower tiers still have to fit the on-disk pointer arrays.
    pub fn new(direct: usize, indirect: usize) -> Result<Tiers> {
        if direct > NDIRECT || indirect == 0 || indirect > NINDIRECT {
            return Err(Error::Geometry(format!("unsupported tiers {}/{}", direct, indirect)));
        }
        Ok(Tiers { direct, indirect })
    }

    pub fn max_blocks(&self) -> usize {
        self.direct + self.indirect + self.indirect * self.indirect
    }

    pub fn is_direct(&self, block: usize) -> bool {
        block < self.direct
    }

    pub fn is_indirect(&self, block: usize) -> bool {
        block >= self.direct && block < self.direct + self.indirect
    }

    pub fn is_doubly_indirect(&self, block: usize) -> bool {
        block >= self.direct + self.indirect
    }

    pub fn locate(&self, block: usize) -> BlockIndex {
        if self.is_direct(block) {
            BlockIndex::Direct(block)
        } else if self.is_indirect(block) {
            BlockIndex::Indirect(block - self.direct)
        } else {
            let offset = block - self.direct - self.indirect;
            BlockIndex::DoublyIndirect { outer: offset / self.indirect, inner: offset % self.indirect }
        }
    }
}

impl Default for Tiers {
    fn default() -> Self {
        Tiers::ON_DISK
    }
}
