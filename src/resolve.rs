use crate::error::{ConvertError, Relation, Result};
use crate::registry::BlockRegistry;
use crate::storage::{Storage, StorageKind};
use crate::value::{BlockIndex, Link, ScratchValue, StorageRef};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Replaces every id reference in the registry with an arena link, fills empty
/// inputs with their neutral literal and checks that each block has exactly one owner.
pub fn resolve(registry: &mut BlockRegistry, storage: &Storage) -> Result<()> {
    let BlockRegistry { blocks, index, .. } = registry;
    let mut owners: Vec<Vec<BlockIndex>> = vec![Vec::new(); blocks.len()];

    for (position, block) in blocks.iter_mut().enumerate() {
        let owner = BlockIndex(position);
        let id = block.id.as_str();

        if let Some(next) = block.next.as_mut() {
            let target = link(index, id, Relation::Next, next)?;
            owners[target.0].push(owner);
        }
        if let Some(parent) = block.parent.as_mut() {
            link(index, id, Relation::Parent, parent)?;
        }
        for input in block.kind.inputs_mut() {
            match input.value.as_mut() {
                Some(ScratchValue::Block(value)) => {
                    let target = link(index, id, Relation::Input(input.name.to_string()), value)?;
                    owners[target.0].push(owner);
                }
                Some(ScratchValue::Variable(reference)) => {
                    bind_storage(storage, StorageKind::Variable, reference, id)?;
                }
                Some(ScratchValue::List(reference)) => {
                    bind_storage(storage, StorageKind::List, reference, id)?;
                }
                Some(ScratchValue::Literal(_)) => {}
                None => input.value = Some(ScratchValue::Literal(input.neutral.clone())),
            }
            if let Some(shadow) = input.shadow.as_mut() {
                let target = link(index, id, Relation::Shadow(input.name.to_string()), shadow)?;
                owners[target.0].push(owner);
            }
        }
        for substack in block.kind.substacks_mut() {
            if let Some(body) = substack.link.as_mut() {
                let target = link(index, id, Relation::Substack(substack.name.to_string()), body)?;
                owners[target.0].push(owner);
            }
        }
        if let Some((kind, reference)) = block.kind.storage_mut() {
            bind_storage(storage, kind, reference, id)?;
        }
    }

    // Without a single entry the top-level check reports the target, not its loose roots.
    let single_entry = blocks.iter().filter(|block| block.top_level).count() == 1;
    for (block, owned_by) in blocks.iter().zip(&owners) {
        match (block.top_level, owned_by.as_slice()) {
            (true, []) => {}
            (false, [owner]) => {
                let parent = block.parent.as_ref().and_then(Link::index);
                if parent != Some(*owner) {
                    warn!(
                        block = %block.id,
                        owner = %blocks[owner.0].id,
                        "parent id does not match the owning block"
                    );
                }
            }
            (true, [owner, ..]) => {
                return Err(ConvertError::structural(
                    &block.id,
                    format!(
                        "top-level block is also referenced by block '{}'",
                        blocks[owner.0].id
                    ),
                ))
            }
            (false, []) if !single_entry => {}
            (false, []) => {
                return Err(ConvertError::structural(
                    &block.id,
                    "block is neither top-level nor referenced by another block",
                ))
            }
            (false, many) => {
                let ids = many
                    .iter()
                    .map(|owner| format!("'{}'", blocks[owner.0].id))
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(ConvertError::structural(
                    &block.id,
                    format!("block is referenced by more than one relation ({})", ids),
                ));
            }
        }
    }

    debug!(target_name = %registry.target, blocks = registry.blocks.len(), "resolved relations");
    Ok(())
}

fn link(
    index: &HashMap<String, BlockIndex>,
    block: &str,
    relation: Relation,
    slot: &mut Link,
) -> Result<BlockIndex> {
    let resolved = match slot {
        Link::Resolved(resolved) => *resolved,
        Link::Unresolved(id) => *index.get(id.as_str()).ok_or_else(|| {
            ConvertError::ReferentialIntegrity {
                block: block.to_string(),
                relation,
                id: id.clone(),
            }
        })?,
    };
    *slot = Link::Resolved(resolved);
    Ok(resolved)
}

fn bind_storage(
    storage: &Storage,
    kind: StorageKind,
    reference: &mut StorageRef,
    block: &str,
) -> Result<()> {
    let slot = storage
        .lookup(kind, reference)
        .ok_or_else(|| ConvertError::ReferentialIntegrity {
            block: block.to_string(),
            relation: match kind {
                StorageKind::Variable => Relation::Variable,
                StorageKind::List => Relation::List,
            },
            id: reference.id.clone().unwrap_or_else(|| reference.name.clone()),
        })?;
    reference.ident = Some(slot.ident.clone());
    Ok(())
}
