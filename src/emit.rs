use crate::block::{Block, BlockKind};
use crate::error::{ConvertError, Relation, Result};
use crate::field::StopOption;
use crate::registry::BlockRegistry;
use crate::storage::{Storage, StorageSlot};
use crate::value::{BlockIndex, Link, Literal, StorageRef, Substack};
use crate::ConvertOptions;
use tracing::debug;

const INDENT: &str = "  ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedProgram {
    pub source: String,
    pub statement_count: usize,
}

/// Walks a resolved registry and renders blocks as target-language text.
pub struct CodeEmitter<'a> {
    registry: &'a BlockRegistry,
    max_depth: usize,
    statements: usize,
    current: Option<BlockIndex>,
}

impl<'a> CodeEmitter<'a> {
    pub fn new(registry: &'a BlockRegistry, max_depth: usize) -> Self {
        Self {
            registry,
            max_depth,
            statements: 0,
            current: None,
        }
    }

    pub fn statement_count(&self) -> usize {
        self.statements
    }

    /// Emits `start` and every block following it through `next`.
    pub fn statements(&mut self, start: Option<BlockIndex>, depth: usize) -> Result<String> {
        let mut out = String::new();
        let mut current = start;
        while let Some(index) = current {
            out.push_str(&self.statement(index, depth)?);
            self.current = Some(index);
            current = match &self.registry.get(index).next {
                Some(next) => Some(self.linked(next)?),
                None => None,
            };
        }
        Ok(out)
    }

    fn substack(&mut self, substack: &Substack, depth: usize) -> Result<String> {
        let start = match &substack.link {
            Some(link) => Some(self.linked(link)?),
            None => None,
        };
        self.statements(start, depth)
    }

    fn statement(&mut self, index: BlockIndex, depth: usize) -> Result<String> {
        let block = self.enter(index, depth)?;
        self.statements += 1;
        let pad = INDENT.repeat(depth);
        let code = match &block.kind {
            BlockKind::WhenFlagClicked => format!("{}// when flag clicked\n", pad),
            BlockKind::Forever { body } => {
                if block.next.is_some() {
                    return Err(ConvertError::structural(
                        &block.id,
                        "nothing can be after a forever block",
                    ));
                }
                let inner = self.substack(body, depth + 1)?;
                format!("{pad}while (1) {{\n{inner}{pad}}}\n")
            }
            BlockKind::Repeat { times, body } => {
                let times = times.emit(self, depth + 1)?;
                let inner = self.substack(body, depth + 1)?;
                let counter = format!("r{}", depth);
                format!(
                    "{pad}for (long {c} = s_repeat_count(({times})); {c} > 0; {c}--) {{\n{inner}{pad}}}\n",
                    c = counter
                )
            }
            BlockKind::RepeatUntil { condition, body } => {
                let condition = condition.emit(self, depth + 1)?;
                let inner = self.substack(body, depth + 1)?;
                format!("{pad}while (!s_to_bool(({condition}))) {{\n{inner}{pad}}}\n")
            }
            BlockKind::If {
                condition,
                then_body,
            } => {
                let condition = condition.emit(self, depth + 1)?;
                let inner = self.substack(then_body, depth + 1)?;
                format!("{pad}if (s_to_bool(({condition}))) {{\n{inner}{pad}}}\n")
            }
            BlockKind::IfElse {
                condition,
                then_body,
                else_body,
            } => {
                let condition = condition.emit(self, depth + 1)?;
                let then_code = self.substack(then_body, depth + 1)?;
                let else_code = self.substack(else_body, depth + 1)?;
                format!(
                    "{pad}if (s_to_bool(({condition}))) {{\n{then_code}{pad}}} else {{\n{else_code}{pad}}}\n"
                )
            }
            BlockKind::Wait { duration } => {
                format!("{}s_wait(({}));\n", pad, duration.emit(self, depth + 1)?)
            }
            BlockKind::WaitUntil { condition } => {
                let condition = condition.emit(self, depth + 1)?;
                format!("{pad}while (!s_to_bool(({condition}))) {{\n{pad}{INDENT}s_yield();\n{pad}}}\n")
            }
            BlockKind::Stop { option } => match option {
                StopOption::All => format!("{}s_stop_all();\n", pad),
                StopOption::ThisScript => format!("{}return;\n", pad),
                StopOption::OtherScripts => format!("{}s_stop_other_scripts();\n", pad),
            },
            BlockKind::SetVariable { variable, value } => {
                let ident = self.storage_ident(variable)?;
                format!("{}{} = ({});\n", pad, ident, value.emit(self, depth + 1)?)
            }
            BlockKind::ChangeVariable { variable, delta } => {
                let ident = self.storage_ident(variable)?;
                let delta = delta.emit(self, depth + 1)?;
                format!("{pad}{ident} = s_add(({ident}), ({delta}));\n")
            }
            BlockKind::AddToList { list, item } => {
                let ident = self.storage_ident(list)?;
                format!("{}s_list_add({}, ({}));\n", pad, ident, item.emit(self, depth + 1)?)
            }
            BlockKind::DeleteOfList { list, index } => {
                let ident = self.storage_ident(list)?;
                format!("{}s_list_delete({}, ({}));\n", pad, ident, index.emit(self, depth + 1)?)
            }
            BlockKind::DeleteAllOfList { list } => {
                format!("{}s_list_clear({});\n", pad, self.storage_ident(list)?)
            }
            BlockKind::MotorSet { motor, speed } => {
                let motor = motor.emit(self, depth + 1)?;
                let speed = speed.emit(self, depth + 1)?;
                format!("{pad}s_motor_set(({motor}), ({speed}));\n")
            }
            BlockKind::MotorStop { motor } => {
                format!("{}s_motor_stop(({}));\n", pad, motor.emit(self, depth + 1)?)
            }
            BlockKind::Binary { .. }
            | BlockKind::Unary { .. }
            | BlockKind::ItemOfList { .. }
            | BlockKind::LengthOfList { .. }
            | BlockKind::MotorMenu { .. } => {
                format!("{}{};\n", pad, self.value_code(block, depth)?)
            }
        };
        Ok(code)
    }

    /// Emits a value-producing block inline.
    pub fn expression(&mut self, index: BlockIndex, depth: usize) -> Result<String> {
        let block = self.enter(index, depth)?;
        self.value_code(block, depth)
    }

    fn value_code(&mut self, block: &'a Block, depth: usize) -> Result<String> {
        match &block.kind {
            BlockKind::Binary { op, left, right } => {
                let left = left.emit(self, depth + 1)?;
                let right = right.emit(self, depth + 1)?;
                Ok(format!("{}(({}), ({}))", op.function(), left, right))
            }
            BlockKind::Unary { op, operand } => Ok(format!(
                "{}(({}))",
                op.function(),
                operand.emit(self, depth + 1)?
            )),
            BlockKind::ItemOfList { list, index } => {
                let ident = self.storage_ident(list)?;
                Ok(format!("s_list_item({}, ({}))", ident, index.emit(self, depth + 1)?))
            }
            BlockKind::LengthOfList { list } => {
                Ok(format!("s_list_length({})", self.storage_ident(list)?))
            }
            BlockKind::MotorMenu { motor } => Ok(motor.token().to_string()),
            BlockKind::WhenFlagClicked
            | BlockKind::Forever { .. }
            | BlockKind::Repeat { .. }
            | BlockKind::RepeatUntil { .. }
            | BlockKind::If { .. }
            | BlockKind::IfElse { .. }
            | BlockKind::Wait { .. }
            | BlockKind::WaitUntil { .. }
            | BlockKind::Stop { .. }
            | BlockKind::SetVariable { .. }
            | BlockKind::ChangeVariable { .. }
            | BlockKind::AddToList { .. }
            | BlockKind::DeleteOfList { .. }
            | BlockKind::DeleteAllOfList { .. }
            | BlockKind::MotorSet { .. }
            | BlockKind::MotorStop { .. } => Err(ConvertError::structural(
                &block.id,
                format!("'{}' does not produce a value but is used as one", block.opcode),
            )),
        }
    }

    fn enter(&mut self, index: BlockIndex, depth: usize) -> Result<&'a Block> {
        let registry = self.registry;
        let block = registry.get(index);
        if depth > self.max_depth {
            return Err(ConvertError::LimitExceeded {
                what: format!("Nesting depth at block '{}'", block.id),
                limit: self.max_depth,
            });
        }
        self.current = Some(index);
        Ok(block)
    }

    fn current_id(&self) -> String {
        self.current
            .map(|index| self.registry.get(index).id.clone())
            .unwrap_or_default()
    }

    pub(crate) fn linked(&self, link: &Link) -> Result<BlockIndex> {
        match link {
            Link::Resolved(index) => Ok(*index),
            Link::Unresolved(id) => Err(ConvertError::ReferentialIntegrity {
                block: self.current_id(),
                relation: Relation::Link,
                id: id.clone(),
            }),
        }
    }

    pub(crate) fn storage_ident(&self, reference: &StorageRef) -> Result<String> {
        reference
            .ident
            .clone()
            .ok_or_else(|| ConvertError::ReferentialIntegrity {
                block: self.current_id(),
                relation: Relation::Variable,
                id: reference.id.clone().unwrap_or_else(|| reference.name.clone()),
            })
    }
}

/// Renders the complete program unit with `entry` as the body of `setup()`.
pub fn emit_program(
    registry: &BlockRegistry,
    storage: &Storage,
    entry: BlockIndex,
    options: &ConvertOptions,
) -> Result<EmittedProgram> {
    let mut emitter = CodeEmitter::new(registry, options.max_depth);
    let body = emitter.statements(Some(entry), 1)?;

    let mut source = String::new();
    source.push_str(&format!(
        "// generated by sb3toc from target '{}'\n",
        registry.target().replace(['\n', '\r'], " ")
    ));
    source.push_str(&format!("#include \"{}\"\n\n", options.runtime_header));
    if options.emit_declarations {
        let declarations = declarations(storage);
        if !declarations.is_empty() {
            source.push_str(&declarations);
            source.push('\n');
        }
    }
    source.push_str("void setup() {\n");
    source.push_str(&body);
    source.push_str("}\n\nvoid loop() {\n}\n");

    debug!(
        target_name = %registry.target(),
        statements = emitter.statement_count(),
        "emitted program"
    );
    Ok(EmittedProgram {
        source,
        statement_count: emitter.statement_count(),
    })
}

fn declarations(storage: &Storage) -> String {
    let mut variables = storage.variables().collect::<Vec<_>>();
    variables.sort_by(|a, b| a.ident.cmp(&b.ident));
    let mut lists = storage.lists().collect::<Vec<_>>();
    lists.sort_by(|a, b| a.ident.cmp(&b.ident));

    let mut out = String::new();
    for StorageSlot { ident, initial, .. } in variables {
        let initial = initial
            .first()
            .map(Literal::to_code)
            .unwrap_or_else(|| "0.0f".to_string());
        out.push_str(&format!("s_value {} = {};\n", ident, initial));
    }
    for StorageSlot { ident, initial, .. } in lists {
        if initial.is_empty() {
            out.push_str(&format!("s_list {};\n", ident));
        } else {
            let items = initial
                .iter()
                .map(Literal::to_code)
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!("s_list {} = {{ {} }};\n", ident, items));
        }
    }
    out
}
