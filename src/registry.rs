use crate::block::Block;
use crate::error::{ConvertError, Result};
use crate::project::RawBlock;
use crate::value::BlockIndex;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Arena of one target's blocks, addressable by save-file id.
#[derive(Debug, Clone)]
pub struct BlockRegistry {
    pub(crate) target: String,
    pub(crate) blocks: Vec<Block>,
    pub(crate) index: HashMap<String, BlockIndex>,
}

impl BlockRegistry {
    pub fn build(
        target: &str,
        raw_blocks: &BTreeMap<String, RawBlock>,
        max_blocks: usize,
    ) -> Result<BlockRegistry> {
        if raw_blocks.len() > max_blocks {
            return Err(ConvertError::LimitExceeded {
                what: format!("Block count of target '{}' ({})", target, raw_blocks.len()),
                limit: max_blocks,
            });
        }
        let mut blocks = Vec::with_capacity(raw_blocks.len());
        let mut index = HashMap::with_capacity(raw_blocks.len());
        for (id, raw) in raw_blocks {
            index.insert(id.clone(), BlockIndex(blocks.len()));
            blocks.push(Block::from_raw(id, raw)?);
        }
        debug!(target_name = %target, blocks = blocks.len(), "built block registry");
        Ok(BlockRegistry {
            target: target.to_string(),
            blocks,
            index,
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn get(&self, index: BlockIndex) -> &Block {
        &self.blocks[index.0]
    }

    pub fn lookup(&self, id: &str) -> Option<BlockIndex> {
        self.index.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BlockIndex, &Block)> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(position, block)| (BlockIndex(position), block))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn raw(opcode: &str) -> RawBlock {
        RawBlock {
            opcode: opcode.to_string(),
            ..RawBlock::default()
        }
    }

    #[test]
    fn blocks_are_indexed_by_id() {
        let raws = BTreeMap::from([
            ("b".to_string(), raw("operator_not")),
            ("a".to_string(), raw("control_forever")),
        ]);
        let registry = BlockRegistry::build("Sprite1", &raws, 10).unwrap();
        assert_eq!(registry.len(), 2);
        let a = registry.lookup("a").unwrap();
        assert_eq!(registry.get(a).opcode, "control_forever");
        assert!(registry.lookup("c").is_none());
    }

    #[test]
    fn unreachable_unknown_opcode_fails_the_build() {
        let raws = BTreeMap::from([
            ("a".to_string(), raw("control_forever")),
            ("z".to_string(), raw("pen_penDown")),
        ]);
        let err = BlockRegistry::build("Sprite1", &raws, 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnimplementedOpcode);
    }

    #[test]
    fn oversized_registry_is_rejected_before_construction() {
        let raws = BTreeMap::from([
            ("a".to_string(), raw("pen_penDown")),
            ("b".to_string(), raw("pen_penDown")),
        ]);
        let err = BlockRegistry::build("Sprite1", &raws, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LimitExceeded);
    }
}
