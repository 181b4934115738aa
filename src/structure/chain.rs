use tracing::{debug, warn};

use crate::consts::{BlockPointer, BLOCK_SIZE, NULL_POINTER};
use crate::driver::DeviceDriver;
use crate::structure::index::BlockIndex;
use crate::structure::inode::{blocks_for_size, Chain};
use crate::structure::Volume;
use crate::util::error::{Error, Result};

/// Blocks allocated for one grow step, not yet linked into the chain.
struct Staged {
    indirect2: Option<BlockPointer>,
    indirect: Option<BlockPointer>,
    data: BlockPointer,
}

impl<A: DeviceDriver> Volume<A> {
    /// Physical block holding logical block `block` of the chain.
    pub fn block_at(&self, chain: &Chain, block: usize) -> Result<BlockPointer> {
        if block >= chain.block_count() {
            return Err(Error::corrupt(format!("block {} is past the end of the file", block)));
        }
        let pointer = match self.tiers.locate(block) {
            BlockIndex::Direct(i) => chain.direct[i],
            BlockIndex::Indirect(i) => {
                let indirect = require(chain.indirect, "indirect block")?;
                self.io.read_pointer(indirect, i)?
            }
            BlockIndex::DoublyIndirect { outer, inner } => {
                let indirect2 = require(chain.indirect2, "doubly-indirect block")?;
                let indirect = require(self.io.read_pointer(indirect2, outer)?, "indirect block")?;
                self.io.read_pointer(indirect, inner)?
            }
        };
        require(pointer, "data block")
    }

    /// Appends one zeroed data block, allocating indirect blocks as tier
    /// boundaries are crossed. On failure the chain is left as it was and the
    /// blocks allocated for this step go back to the bitmap.
    pub fn grow(&mut self, chain: &mut Chain) -> Result<()> {
        let n = chain.block_count();
        if n >= self.tiers.max_blocks() {
            return Err(Error::FileTooLarge);
        }
        let location = self.tiers.locate(n);

        let mut fresh = Vec::with_capacity(3);
        let staged = match self.stage(chain, location, &mut fresh) {
            Ok(staged) => staged,
            Err(err) => {
                self.release(&fresh);
                return Err(err);
            }
        };

        let before = chain.clone();
        if let Err(err) = self.wire(chain, location, &staged) {
            // an existing doubly-indirect block may already point at the staged indirect block
            if let (BlockIndex::DoublyIndirect { outer, .. }, Some(_), None) = (location, staged.indirect, staged.indirect2) {
                if let Err(undo) = self.io.write_pointer(before.indirect2, outer, NULL_POINTER) {
                    warn!(%undo, "could not clear indirect slot during rollback");
                }
            }
            *chain = before;
            self.release(&fresh);
            return Err(err);
        }

        chain.size = ((n + 1) * BLOCK_SIZE) as u32;
        debug!(blocks = n + 1, data = staged.data, "grew chain");
        Ok(())
    }

    /// Links staged blocks into the chain and stores the data pointer.
    fn wire(&mut self, chain: &mut Chain, location: BlockIndex, staged: &Staged) -> Result<()> {
        match location {
            BlockIndex::Direct(i) => chain.direct[i] = staged.data,
            BlockIndex::Indirect(i) => {
                if let Some(indirect) = staged.indirect {
                    chain.indirect = indirect;
                }
                self.io.write_pointer(chain.indirect, i, staged.data)?;
            }
            BlockIndex::DoublyIndirect { outer, inner } => {
                if let Some(indirect2) = staged.indirect2 {
                    chain.indirect2 = indirect2;
                }
                if let Some(indirect) = staged.indirect {
                    self.io.write_pointer(chain.indirect2, outer, indirect)?;
                }
                let indirect = require(self.io.read_pointer(chain.indirect2, outer)?, "indirect block")?;
                self.io.write_pointer(indirect, inner, staged.data)?;
            }
        }
        Ok(())
    }

    /// Allocates (and zeroes) every block the next grow needs, recording each
    /// one in `fresh` so the caller can give them back on failure.
    fn stage(&mut self, chain: &Chain, location: BlockIndex, fresh: &mut Vec<BlockPointer>) -> Result<Staged> {
        let mut staged = Staged { indirect2: None, indirect: None, data: NULL_POINTER };
        match location {
            BlockIndex::Direct(_) => {}
            BlockIndex::Indirect(_) => {
                if chain.indirect == NULL_POINTER {
                    staged.indirect = Some(self.allocate_zeroed(fresh)?);
                }
            }
            BlockIndex::DoublyIndirect { outer, .. } => {
                let missing_indirect = if chain.indirect2 == NULL_POINTER {
                    staged.indirect2 = Some(self.allocate_zeroed(fresh)?);
                    true
                } else {
                    self.io.read_pointer(chain.indirect2, outer)? == NULL_POINTER
                };
                if missing_indirect {
                    staged.indirect = Some(self.allocate_zeroed(fresh)?);
                }
            }
        }
        staged.data = self.allocate_zeroed(fresh)?;
        Ok(staged)
    }

    fn allocate_zeroed(&mut self, fresh: &mut Vec<BlockPointer>) -> Result<BlockPointer> {
        let block = self.block_map.allocate(&mut self.io)?;
        fresh.push(block);
        self.io.zero_block(block)?;
        Ok(block)
    }

    fn release(&mut self, blocks: &[BlockPointer]) {
        for &block in blocks.iter().rev() {
            if let Err(err) = self.block_map.free(&mut self.io, block) {
                warn!(block, %err, "could not return block during rollback");
            }
        }
    }

    /// Removes the tail data block, freeing indirect blocks that become empty.
    /// A missing chain block is reported before anything is freed.
    pub fn shrink(&mut self, chain: &mut Chain) -> Result<()> {
        let n = chain.block_count();
        if n == 0 {
            return Ok(());
        }
        let tail = n - 1;

        match self.tiers.locate(tail) {
            BlockIndex::Direct(i) => {
                let data = require(chain.direct[i], "data block")?;
                self.block_map.free(&mut self.io, data)?;
                chain.direct[i] = NULL_POINTER;
            }
            BlockIndex::Indirect(i) => {
                let indirect = require(chain.indirect, "indirect block")?;
                let data = require(self.io.read_pointer(indirect, i)?, "data block")?;
                self.block_map.free(&mut self.io, data)?;
                self.io.write_pointer(indirect, i, NULL_POINTER)?;
                if i == 0 {
                    self.block_map.free(&mut self.io, indirect)?;
                    chain.indirect = NULL_POINTER;
                }
            }
            BlockIndex::DoublyIndirect { outer, inner } => {
                let indirect2 = require(chain.indirect2, "doubly-indirect block")?;
                let indirect = require(self.io.read_pointer(indirect2, outer)?, "indirect block")?;
                let data = require(self.io.read_pointer(indirect, inner)?, "data block")?;
                self.block_map.free(&mut self.io, data)?;
                self.io.write_pointer(indirect, inner, NULL_POINTER)?;
                if inner == 0 {
                    self.block_map.free(&mut self.io, indirect)?;
                    self.io.write_pointer(indirect2, outer, NULL_POINTER)?;
                    if outer == 0 {
                        self.block_map.free(&mut self.io, indirect2)?;
                        chain.indirect2 = NULL_POINTER;
                    }
                }
            }
        }

        chain.size = (tail * BLOCK_SIZE) as u32;
        debug!(blocks = tail, "shrank chain");
        Ok(())
    }

    /// Grows or shrinks the chain one block at a time until it holds exactly
    /// `size` bytes. Running out of space undoes every block added here.
    /// Bytes past the end of file in the last block are kept zeroed.
    pub fn resize(&mut self, chain: &mut Chain, size: u64) -> Result<()> {
        let wanted = blocks_for_size(size);
        if wanted > self.tiers.max_blocks() || size > u32::MAX as u64 {
            return Err(Error::FileTooLarge);
        }

        let original_size = chain.size;
        if size > original_size as u64 {
            // bytes past the old end of file must read back as zeroes
            self.zero_tail(chain)?;
        }
        let mut grown = 0;
        while chain.block_count() < wanted {
            match self.grow(chain) {
                Ok(()) => grown += 1,
                Err(Error::NoSpace) => {
                    for _ in 0..grown {
                        if let Err(err) = self.shrink(chain) {
                            warn!(%err, "rollback of a failed resize stopped early");
                            return Err(err);
                        }
                    }
                    chain.size = original_size;
                    debug!(size, "resize ran out of space, rolled back");
                    return Err(Error::NoSpace);
                }
                Err(err) => return Err(err),
            }
        }
        while chain.block_count() > wanted {
            self.shrink(chain)?;
        }

        chain.size = size as u32;
        if size < original_size as u64 {
            self.zero_tail(chain)?;
        }
        debug!(from = original_size, to = size, "resized chain");
        Ok(())
    }

    /// Clears the unused part of the last block, from `chain.size` on.
    fn zero_tail(&mut self, chain: &Chain) -> Result<()> {
        let used = chain.size as usize % BLOCK_SIZE;
        if used == 0 {
            return Ok(());
        }
        let block = self.block_at(chain, chain.block_count() - 1)?;
        let mut data = self.io.read_block(block)?;
        data[used..].fill(0);
        self.io.write_block(block, &data)
    }

    /// Every block reachable from the chain, indirect blocks included.
    #[cfg(test)]
    pub(crate) fn chain_blocks(&self, chain: &Chain) -> Result<Vec<BlockPointer>> {
        let mut blocks = Vec::new();
        for b in 0..chain.block_count() {
            blocks.push(self.block_at(chain, b)?);
        }
        if chain.indirect != NULL_POINTER {
            blocks.push(chain.indirect);
        }
        if chain.indirect2 != NULL_POINTER {
            blocks.push(chain.indirect2);
            for outer in 0..self.tiers.indirect {
                let indirect = self.io.read_pointer(chain.indirect2, outer)?;
                if indirect != NULL_POINTER {
                    blocks.push(indirect);
                }
            }
        }
        Ok(blocks)
    }
}

fn require(pointer: BlockPointer, what: &str) -> Result<BlockPointer> {
    if pointer == NULL_POINTER {
        return Err(Error::corrupt(format!("expected {} is missing", what)));
    }
    Ok(pointer)
}
