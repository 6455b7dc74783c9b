use crate::project::{ListDecl, TargetRecord, VariableDecl};
use crate::value::{Literal, StorageRef};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Variable,
    List,
}

impl StorageKind {
    fn prefix(self) -> &'static str {
        match self {
            StorageKind::Variable => "v",
            StorageKind::List => "l",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageSlot {
    pub id: String,
    pub name: String,
    pub ident: String,
    pub initial: Vec<Literal>,
}

/// Variables and lists visible to one target: its own plus the stage's globals.
#[derive(Debug, Clone, Default)]
pub struct Storage {
    variables: BTreeMap<String, StorageSlot>,
    lists: BTreeMap<String, StorageSlot>,
}

impl Storage {
    pub fn for_target(target: &TargetRecord, stage: Option<&TargetRecord>) -> Storage {
        let mut storage = Storage::default();
        if let Some(stage) = stage.filter(|s| !std::ptr::eq(*s, target)) {
            storage.add_target(stage);
        }
        storage.add_target(target);
        storage
    }

    fn add_target(&mut self, target: &TargetRecord) {
        for VariableDecl { id, name, value } in &target.variables {
            self.variables.insert(
                id.clone(),
                slot(StorageKind::Variable, id, name, vec![value.clone()]),
            );
        }
        for ListDecl { id, name, items } in &target.lists {
            self.lists
                .insert(id.clone(), slot(StorageKind::List, id, name, items.clone()));
        }
    }

    /// Looks the reference up by id first and by name second.
    pub fn lookup(&self, kind: StorageKind, reference: &StorageRef) -> Option<&StorageSlot> {
        let table = match kind {
            StorageKind::Variable => &self.variables,
            StorageKind::List => &self.lists,
        };
        if let Some(slot) = reference.id.as_ref().and_then(|id| table.get(id)) {
            return Some(slot);
        }
        table.values().find(|slot| slot.name == reference.name)
    }

    pub fn variables(&self) -> impl Iterator<Item = &StorageSlot> {
        self.variables.values()
    }

    pub fn lists(&self) -> impl Iterator<Item = &StorageSlot> {
        self.lists.values()
    }
}

fn slot(kind: StorageKind, id: &str, name: &str, initial: Vec<Literal>) -> StorageSlot {
    StorageSlot {
        id: id.to_string(),
        name: name.to_string(),
        ident: storage_ident(kind, name, id),
        initial,
    }
}

pub fn storage_ident(kind: StorageKind, name: &str, id: &str) -> String {
    static INVALID: OnceLock<Regex> = OnceLock::new();
    let invalid = INVALID.get_or_init(|| Regex::new(r"[^A-Za-z0-9_]+").expect("static regex"));
    let sanitized = invalid.replace_all(name, "_");
    let sanitized = sanitized.trim_matches('_');
    let digest = format!("{:x}", md5::compute(id.as_bytes()));
    if sanitized.is_empty() {
        format!("{}_{}", kind.prefix(), &digest[..8])
    } else {
        format!("{}_{}_{}", kind.prefix(), sanitized, &digest[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn target(name: &str, is_stage: bool, vars: &[(&str, &str)]) -> TargetRecord {
        TargetRecord {
            name: name.to_string(),
            is_stage,
            variables: vars
                .iter()
                .map(|(id, name)| VariableDecl {
                    id: id.to_string(),
                    name: name.to_string(),
                    value: Literal::Number(0.0),
                })
                .collect(),
            lists: Vec::new(),
            blocks: BTreeMap::new(),
        }
    }

    #[test]
    fn identifiers_are_sanitized_and_disambiguated() {
        let a = storage_ident(StorageKind::Variable, "my score!", "id-1");
        let b = storage_ident(StorageKind::Variable, "my score!", "id-2");
        assert!(a.starts_with("v_my_score_"));
        assert_ne!(a, b);
        assert_eq!(a.len(), "v_my_score_".len() + 8);
        assert!(storage_ident(StorageKind::List, "ü", "x").starts_with("l_"));
    }

    #[test]
    fn sprite_sees_stage_globals() {
        let stage = target("Stage", true, &[("g", "global")]);
        let sprite = target("Sprite1", false, &[("l", "local")]);
        let storage = Storage::for_target(&sprite, Some(&stage));
        assert!(storage
            .lookup(StorageKind::Variable, &StorageRef::new("global", Some("g".to_string())))
            .is_some());
        assert!(storage
            .lookup(StorageKind::Variable, &StorageRef::new("local", None))
            .is_some());
        assert!(storage
            .lookup(StorageKind::Variable, &StorageRef::new("nope", Some("n".to_string())))
            .is_none());
        assert!(storage
            .lookup(StorageKind::List, &StorageRef::new("global", Some("g".to_string())))
            .is_none());
    }
}
