use crate::error::{ConvertError, Result};
use crate::value::Literal;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct Save {
    pub targets: Vec<TargetRecord>,
}

#[derive(Debug, Clone)]
pub struct TargetRecord {
    pub name: String,
    pub is_stage: bool,
    pub variables: Vec<VariableDecl>,
    pub lists: Vec<ListDecl>,
    pub blocks: BTreeMap<String, RawBlock>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDecl {
    pub id: String,
    pub name: String,
    pub value: Literal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListDecl {
    pub id: String,
    pub name: String,
    pub items: Vec<Literal>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBlock {
    pub opcode: String,
    pub next: Option<String>,
    pub parent: Option<String>,
    pub inputs: BTreeMap<String, RawInput>,
    pub fields: BTreeMap<String, RawField>,
    pub top_level: bool,
    pub shadow: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawInput {
    pub value: Option<RawValue>,
    pub shadow: Option<RawValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Block(String),
    Primitive(Primitive),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Number(String),
    Color(String),
    Text(String),
    Broadcast(String),
    Variable { name: String, id: Option<String> },
    List { name: String, id: Option<String> },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawField {
    pub value: Option<String>,
    pub id: Option<String>,
}

impl Save {
    pub fn from_json_str(json: &str) -> Result<Save> {
        let root: Value = serde_json::from_str(json)?;
        Save::from_json_value(&root)
    }

    pub fn from_json_value(root: &Value) -> Result<Save> {
        let targets = root
            .get("targets")
            .and_then(Value::as_array)
            .ok_or_else(|| ConvertError::malformed("project.json is missing the 'targets' array."))?;
        let targets = targets
            .iter()
            .enumerate()
            .map(|(index, target)| TargetRecord::from_json_value(target, index))
            .collect::<Result<Vec<_>>>()?;
        debug!(targets = targets.len(), "decoded save");
        Ok(Save { targets })
    }

    pub fn stage(&self) -> Option<&TargetRecord> {
        self.targets.iter().find(|t| t.is_stage)
    }
}

impl TargetRecord {
    pub fn from_json_str(json: &str) -> Result<TargetRecord> {
        let root: Value = serde_json::from_str(json)?;
        TargetRecord::from_json_value(&root, 0)
    }

    fn from_json_value(target: &Value, index: usize) -> Result<TargetRecord> {
        let name = match target.get("name") {
            Some(Value::String(name)) => name.clone(),
            None | Some(Value::Null) => format!("target{}", index),
            Some(_) => {
                return Err(ConvertError::malformed(format!(
                    "Target {} has a non-string 'name'.",
                    index
                )))
            }
        };
        let is_stage = target
            .get("isStage")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let blocks_obj = target
            .get("blocks")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                ConvertError::malformed(format!("Target '{}' is missing its blocks object.", name))
            })?;

        let mut blocks = BTreeMap::new();
        for (id, block) in blocks_obj {
            match block {
                Value::Object(obj) => {
                    blocks.insert(id.clone(), decode_block(&name, id, obj)?);
                }
                Value::Array(_) => {
                    warn!(target_name = %name, block = %id, "skipping loose top-level reporter");
                }
                _ => {
                    return Err(ConvertError::malformed(format!(
                        "Block '{}' in target '{}' is neither an object nor an array.",
                        id, name
                    )))
                }
            }
        }

        Ok(TargetRecord {
            variables: read_variables(&name, target.get("variables"))?,
            lists: read_lists(&name, target.get("lists"))?,
            name,
            is_stage,
            blocks,
        })
    }
}

fn read_variables(target: &str, node: Option<&Value>) -> Result<Vec<VariableDecl>> {
    let mut out = Vec::new();
    let Some(obj) = node.and_then(Value::as_object) else {
        return Ok(out);
    };
    for (id, decl) in obj {
        let (name, value) = decl_parts(target, "variable", id, decl)?;
        out.push(VariableDecl {
            id: id.clone(),
            name,
            value: value.map(Literal::from_json).unwrap_or(Literal::Number(0.0)),
        });
    }
    Ok(out)
}

fn read_lists(target: &str, node: Option<&Value>) -> Result<Vec<ListDecl>> {
    let mut out = Vec::new();
    let Some(obj) = node.and_then(Value::as_object) else {
        return Ok(out);
    };
    for (id, decl) in obj {
        let (name, items) = decl_parts(target, "list", id, decl)?;
        let items = items
            .and_then(Value::as_array)
            .map(|items| items.iter().map(Literal::from_json).collect())
            .unwrap_or_default();
        out.push(ListDecl {
            id: id.clone(),
            name,
            items,
        });
    }
    Ok(out)
}

fn decl_parts<'a>(
    target: &str,
    kind: &str,
    id: &str,
    decl: &'a Value,
) -> Result<(String, Option<&'a Value>)> {
    let arr = decl.as_array().ok_or_else(|| {
        ConvertError::malformed(format!(
            "The {} '{}' of target '{}' is not an array.",
            kind, id, target
        ))
    })?;
    let name = arr.first().and_then(Value::as_str).ok_or_else(|| {
        ConvertError::malformed(format!(
            "The {} '{}' of target '{}' has no name.",
            kind, id, target
        ))
    })?;
    Ok((name.to_string(), arr.get(1)))
}

fn decode_block(target: &str, id: &str, block: &Map<String, Value>) -> Result<RawBlock> {
    let opcode = block
        .get("opcode")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ConvertError::malformed(format!(
                "Block '{}' in target '{}' has no opcode.",
                id, target
            ))
        })?
        .to_string();

    let mut inputs = BTreeMap::new();
    if let Some(obj) = optional_object(block, "inputs", id)? {
        for (name, input) in obj {
            inputs.insert(name.clone(), decode_input(id, name, input)?);
        }
    }
    let mut fields = BTreeMap::new();
    if let Some(obj) = optional_object(block, "fields", id)? {
        for (name, field) in obj {
            fields.insert(name.clone(), decode_field(id, name, field)?);
        }
    }

    Ok(RawBlock {
        opcode,
        next: optional_id(block, "next", id)?,
        parent: optional_id(block, "parent", id)?,
        inputs,
        fields,
        top_level: block.get("topLevel").and_then(Value::as_bool).unwrap_or(false),
        shadow: block.get("shadow").and_then(Value::as_bool).unwrap_or(false),
    })
}

fn optional_object<'a>(
    block: &'a Map<String, Value>,
    key: &str,
    id: &str,
) -> Result<Option<&'a Map<String, Value>>> {
    match block.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(obj)) => Ok(Some(obj)),
        Some(_) => Err(ConvertError::malformed(format!(
            "Block '{}' has a non-object '{}'.",
            id, key
        ))),
    }
}

fn optional_id(block: &Map<String, Value>, key: &str, id: &str) -> Result<Option<String>> {
    match block.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ConvertError::malformed(format!(
            "Block '{}' has a non-string '{}'.",
            id, key
        ))),
    }
}

fn decode_input(block: &str, name: &str, input: &Value) -> Result<RawInput> {
    let malformed = || {
        ConvertError::malformed(format!(
            "Input '{}' of block '{}' is not a [kind, value, shadow?] array.",
            name, block
        ))
    };
    let arr = input.as_array().ok_or_else(malformed)?;
    let kind = arr.first().and_then(Value::as_i64).ok_or_else(malformed)?;
    let value = match arr.get(1) {
        Some(value) => decode_input_value(block, name, value)?,
        None => None,
    };
    let shadow = match (kind, arr.get(2)) {
        (3, Some(shadow)) => decode_input_value(block, name, shadow)?,
        _ => None,
    };
    Ok(RawInput { value, shadow })
}

fn decode_input_value(block: &str, name: &str, value: &Value) -> Result<Option<RawValue>> {
    match value {
        Value::Null => Ok(None),
        Value::String(id) => Ok(Some(RawValue::Block(id.clone()))),
        Value::Array(arr) => decode_primitive(block, name, arr).map(|p| Some(RawValue::Primitive(p))),
        _ => Err(ConvertError::malformed(format!(
            "Input '{}' of block '{}' holds neither a block id nor a primitive.",
            name, block
        ))),
    }
}

fn decode_primitive(block: &str, name: &str, arr: &[Value]) -> Result<Primitive> {
    let code = arr.first().and_then(Value::as_i64).ok_or_else(|| {
        ConvertError::malformed(format!(
            "Primitive in input '{}' of block '{}' has no type code.",
            name, block
        ))
    })?;
    let text = arr.get(1).map(scalar_text).unwrap_or_default();
    let id = arr.get(2).and_then(Value::as_str).map(ToString::to_string);
    match code {
        4..=8 => Ok(Primitive::Number(text)),
        9 => Ok(Primitive::Color(text)),
        10 => Ok(Primitive::Text(text)),
        11 => Ok(Primitive::Broadcast(text)),
        12 => Ok(Primitive::Variable { name: text, id }),
        13 => Ok(Primitive::List { name: text, id }),
        other => Err(ConvertError::malformed(format!(
            "Primitive in input '{}' of block '{}' has unknown type code {}.",
            name, block, other
        ))),
    }
}

fn decode_field(block: &str, name: &str, field: &Value) -> Result<RawField> {
    match field {
        Value::Array(arr) => Ok(RawField {
            value: arr.first().filter(|v| !v.is_null()).map(scalar_text),
            id: arr.get(1).and_then(Value::as_str).map(ToString::to_string),
        }),
        Value::String(s) => Ok(RawField {
            value: Some(s.clone()),
            id: None,
        }),
        _ => Err(ConvertError::malformed(format!(
            "Field '{}' of block '{}' is not an array.",
            name, block
        ))),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
