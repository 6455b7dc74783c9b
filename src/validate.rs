use crate::error::{ConvertError, Result};
use crate::registry::BlockRegistry;
use crate::value::BlockIndex;

/// Returns the single top-level block of the registry.
pub fn entry_point(registry: &BlockRegistry) -> Result<BlockIndex> {
    let top_level = registry
        .iter()
        .filter(|(_, block)| block.top_level)
        .map(|(index, _)| index)
        .collect::<Vec<_>>();
    match top_level.as_slice() {
        [] => Err(ConvertError::NoTopLevel {
            target: registry.target().to_string(),
        }),
        [entry] => Ok(*entry),
        many => Err(ConvertError::TooManyTopLevel {
            target: registry.target().to_string(),
            count: many.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::project::RawBlock;
    use std::collections::BTreeMap;
    use test_case::test_case;

    fn registry(top_level: usize, nested: usize) -> BlockRegistry {
        let mut raws = BTreeMap::new();
        for i in 0..top_level {
            raws.insert(
                format!("top{}", i),
                RawBlock {
                    opcode: "event_whenflagclicked".to_string(),
                    top_level: true,
                    ..RawBlock::default()
                },
            );
        }
        for i in 0..nested {
            raws.insert(
                format!("nested{}", i),
                RawBlock {
                    opcode: "control_wait".to_string(),
                    ..RawBlock::default()
                },
            );
        }
        BlockRegistry::build("Sprite1", &raws, 10_000).unwrap()
    }

    #[test_case(0, 0; "empty registry")]
    #[test_case(0, 1; "one nested block")]
    #[test_case(0, 50; "many nested blocks")]
    fn no_top_level(top: usize, nested: usize) {
        let err = entry_point(&registry(top, nested)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoTopLevel);
    }

    #[test_case(2, 0; "two hats")]
    #[test_case(3, 7; "three hats with nested blocks")]
    #[test_case(20, 200; "many hats")]
    fn too_many_top_level(top: usize, nested: usize) {
        let err = entry_point(&registry(top, nested)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TooManyTopLevel);
        assert!(err.to_string().contains(&top.to_string()));
    }

    #[test]
    fn single_top_level_is_the_entry() {
        let registry = registry(1, 4);
        let entry = entry_point(&registry).unwrap();
        assert_eq!(registry.get(entry).id, "top0");
    }
}
