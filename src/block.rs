use crate::error::{ConvertError, Result};
use crate::field::{MathOp, Motor, ScratchField, StopOption};
use crate::project::{Primitive, RawBlock, RawValue};
use crate::storage::StorageKind;
use crate::value::{
    Input, Link, Literal, ScratchValue, StorageRef, Substack, SCRATCH_EMPTY, SCRATCH_FALSE,
    SCRATCH_ZERO,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Mod,
    Lt,
    Gt,
    Equals,
    And,
    Or,
    Random,
    Join,
    LetterOf,
    Contains,
}

impl BinaryOp {
    pub fn function(self) -> &'static str {
        match self {
            BinaryOp::Add => "s_add",
            BinaryOp::Subtract => "s_subtract",
            BinaryOp::Multiply => "s_multiply",
            BinaryOp::Divide => "s_divide",
            BinaryOp::Mod => "s_mod",
            BinaryOp::Lt => "s_lt",
            BinaryOp::Gt => "s_gt",
            BinaryOp::Equals => "s_equals",
            BinaryOp::And => "s_and",
            BinaryOp::Or => "s_or",
            BinaryOp::Random => "s_random",
            BinaryOp::Join => "s_join",
            BinaryOp::LetterOf => "s_letter_of",
            BinaryOp::Contains => "s_contains",
        }
    }

    /// Input names and their neutral literals, left operand first.
    fn slots(self) -> [(&'static str, Literal); 2] {
        match self {
            BinaryOp::Add
            | BinaryOp::Subtract
            | BinaryOp::Multiply
            | BinaryOp::Divide
            | BinaryOp::Mod => [("NUM1", SCRATCH_ZERO), ("NUM2", SCRATCH_ZERO)],
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Equals => {
                [("OPERAND1", SCRATCH_EMPTY), ("OPERAND2", SCRATCH_EMPTY)]
            }
            BinaryOp::And | BinaryOp::Or => [("OPERAND1", SCRATCH_FALSE), ("OPERAND2", SCRATCH_FALSE)],
            BinaryOp::Random => [("FROM", SCRATCH_ZERO), ("TO", SCRATCH_ZERO)],
            BinaryOp::Join | BinaryOp::Contains => {
                [("STRING1", SCRATCH_EMPTY), ("STRING2", SCRATCH_EMPTY)]
            }
            BinaryOp::LetterOf => [("LETTER", SCRATCH_ZERO), ("STRING", SCRATCH_EMPTY)],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Round,
    Length,
    Math(MathOp),
}

impl UnaryOp {
    pub fn function(self) -> &'static str {
        match self {
            UnaryOp::Not => "s_not",
            UnaryOp::Round => "s_round",
            UnaryOp::Length => "s_length",
            UnaryOp::Math(op) => op.function(),
        }
    }

    fn slot(self) -> (&'static str, Literal) {
        match self {
            UnaryOp::Not => ("OPERAND", SCRATCH_FALSE),
            UnaryOp::Round | UnaryOp::Math(_) => ("NUM", SCRATCH_ZERO),
            UnaryOp::Length => ("STRING", SCRATCH_EMPTY),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    WhenFlagClicked,
    Forever {
        body: Substack,
    },
    Repeat {
        times: Input,
        body: Substack,
    },
    RepeatUntil {
        condition: Input,
        body: Substack,
    },
    If {
        condition: Input,
        then_body: Substack,
    },
    IfElse {
        condition: Input,
        then_body: Substack,
        else_body: Substack,
    },
    Wait {
        duration: Input,
    },
    WaitUntil {
        condition: Input,
    },
    Stop {
        option: StopOption,
    },
    Binary {
        op: BinaryOp,
        left: Input,
        right: Input,
    },
    Unary {
        op: UnaryOp,
        operand: Input,
    },
    SetVariable {
        variable: StorageRef,
        value: Input,
    },
    ChangeVariable {
        variable: StorageRef,
        delta: Input,
    },
    AddToList {
        list: StorageRef,
        item: Input,
    },
    DeleteOfList {
        list: StorageRef,
        index: Input,
    },
    DeleteAllOfList {
        list: StorageRef,
    },
    ItemOfList {
        list: StorageRef,
        index: Input,
    },
    LengthOfList {
        list: StorageRef,
    },
    MotorMenu {
        motor: Motor,
    },
    MotorSet {
        motor: Input,
        speed: Input,
    },
    MotorStop {
        motor: Input,
    },
}

impl BlockKind {
    #[cfg(test)]
    pub fn inputs(&self) -> Vec<&Input> {
        match self {
            BlockKind::WhenFlagClicked
            | BlockKind::Forever { .. }
            | BlockKind::Stop { .. }
            | BlockKind::DeleteAllOfList { .. }
            | BlockKind::LengthOfList { .. }
            | BlockKind::MotorMenu { .. } => Vec::new(),
            BlockKind::Repeat { times: input, .. }
            | BlockKind::RepeatUntil { condition: input, .. }
            | BlockKind::If { condition: input, .. }
            | BlockKind::IfElse { condition: input, .. }
            | BlockKind::Wait { duration: input }
            | BlockKind::WaitUntil { condition: input }
            | BlockKind::Unary { operand: input, .. }
            | BlockKind::SetVariable { value: input, .. }
            | BlockKind::ChangeVariable { delta: input, .. }
            | BlockKind::AddToList { item: input, .. }
            | BlockKind::DeleteOfList { index: input, .. }
            | BlockKind::ItemOfList { index: input, .. }
            | BlockKind::MotorStop { motor: input } => vec![input],
            BlockKind::Binary { left, right, .. } => vec![left, right],
            BlockKind::MotorSet { motor, speed } => vec![motor, speed],
        }
    }

    pub fn inputs_mut(&mut self) -> Vec<&mut Input> {
        match self {
            BlockKind::WhenFlagClicked
            | BlockKind::Forever { .. }
            | BlockKind::Stop { .. }
            | BlockKind::DeleteAllOfList { .. }
            | BlockKind::LengthOfList { .. }
            | BlockKind::MotorMenu { .. } => Vec::new(),
            BlockKind::Repeat { times: input, .. }
            | BlockKind::RepeatUntil { condition: input, .. }
            | BlockKind::If { condition: input, .. }
            | BlockKind::IfElse { condition: input, .. }
            | BlockKind::Wait { duration: input }
            | BlockKind::WaitUntil { condition: input }
            | BlockKind::Unary { operand: input, .. }
            | BlockKind::SetVariable { value: input, .. }
            | BlockKind::ChangeVariable { delta: input, .. }
            | BlockKind::AddToList { item: input, .. }
            | BlockKind::DeleteOfList { index: input, .. }
            | BlockKind::ItemOfList { index: input, .. }
            | BlockKind::MotorStop { motor: input } => vec![input],
            BlockKind::Binary { left, right, .. } => vec![left, right],
            BlockKind::MotorSet { motor, speed } => vec![motor, speed],
        }
    }

    pub fn substacks_mut(&mut self) -> Vec<&mut Substack> {
        match self {
            BlockKind::Forever { body }
            | BlockKind::Repeat { body, .. }
            | BlockKind::RepeatUntil { body, .. }
            | BlockKind::If {
                then_body: body, ..
            } => vec![body],
            BlockKind::IfElse {
                then_body,
                else_body,
                ..
            } => vec![then_body, else_body],
            _ => Vec::new(),
        }
    }

    /// Variable and list references held in fields.
    pub fn storage_mut(&mut self) -> Option<(StorageKind, &mut StorageRef)> {
        match self {
            BlockKind::SetVariable { variable, .. } | BlockKind::ChangeVariable { variable, .. } => {
                Some((StorageKind::Variable, variable))
            }
            BlockKind::AddToList { list, .. }
            | BlockKind::DeleteOfList { list, .. }
            | BlockKind::DeleteAllOfList { list }
            | BlockKind::ItemOfList { list, .. }
            | BlockKind::LengthOfList { list } => Some((StorageKind::List, list)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: String,
    pub opcode: String,
    pub kind: BlockKind,
    pub next: Option<Link>,
    pub parent: Option<Link>,
    pub top_level: bool,
    pub shadow: bool,
}

impl Block {
    /// Builds the typed block for `raw`; relations stay unresolved ids.
    pub fn from_raw(id: &str, raw: &RawBlock) -> Result<Block> {
        let reader = RawReader { id, raw };
        Ok(Block {
            id: id.to_string(),
            opcode: raw.opcode.clone(),
            kind: reader.construct()?,
            next: raw.next.clone().map(Link::Unresolved),
            parent: raw.parent.clone().map(Link::Unresolved),
            top_level: raw.top_level,
            shadow: raw.shadow,
        })
    }
}

struct RawReader<'a> {
    id: &'a str,
    raw: &'a RawBlock,
}

impl RawReader<'_> {
    fn construct(&self) -> Result<BlockKind> {
        let kind = match self.raw.opcode.as_str() {
            "event_whenflagclicked" => BlockKind::WhenFlagClicked,
            "control_forever" => BlockKind::Forever {
                body: self.substack("SUBSTACK")?,
            },
            "control_repeat" => BlockKind::Repeat {
                times: self.input("TIMES", SCRATCH_ZERO),
                body: self.substack("SUBSTACK")?,
            },
            "control_repeat_until" => BlockKind::RepeatUntil {
                condition: self.input("CONDITION", SCRATCH_FALSE),
                body: self.substack("SUBSTACK")?,
            },
            "control_if" => BlockKind::If {
                condition: self.input("CONDITION", SCRATCH_FALSE),
                then_body: self.substack("SUBSTACK")?,
            },
            "control_if_else" => BlockKind::IfElse {
                condition: self.input("CONDITION", SCRATCH_FALSE),
                then_body: self.substack("SUBSTACK")?,
                else_body: self.substack("SUBSTACK2")?,
            },
            "control_wait" => BlockKind::Wait {
                duration: self.input("DURATION", SCRATCH_ZERO),
            },
            "control_wait_until" => BlockKind::WaitUntil {
                condition: self.input("CONDITION", SCRATCH_FALSE),
            },
            "control_stop" => BlockKind::Stop {
                option: self.field("STOP_OPTION")?,
            },
            "operator_add" => self.binary(BinaryOp::Add),
            "operator_subtract" => self.binary(BinaryOp::Subtract),
            "operator_multiply" => self.binary(BinaryOp::Multiply),
            "operator_divide" => self.binary(BinaryOp::Divide),
            "operator_mod" => self.binary(BinaryOp::Mod),
            "operator_lt" => self.binary(BinaryOp::Lt),
            "operator_gt" => self.binary(BinaryOp::Gt),
            "operator_equals" => self.binary(BinaryOp::Equals),
            "operator_and" => self.binary(BinaryOp::And),
            "operator_or" => self.binary(BinaryOp::Or),
            "operator_random" => self.binary(BinaryOp::Random),
            "operator_join" => self.binary(BinaryOp::Join),
            "operator_letter_of" => self.binary(BinaryOp::LetterOf),
            "operator_contains" => self.binary(BinaryOp::Contains),
            "operator_not" => self.unary(UnaryOp::Not),
            "operator_round" => self.unary(UnaryOp::Round),
            "operator_length" => self.unary(UnaryOp::Length),
            "operator_mathop" => self.unary(UnaryOp::Math(self.field("OPERATOR")?)),
            "data_setvariableto" => BlockKind::SetVariable {
                variable: self.storage("VARIABLE")?,
                value: self.input("VALUE", SCRATCH_EMPTY),
            },
            "data_changevariableby" => BlockKind::ChangeVariable {
                variable: self.storage("VARIABLE")?,
                delta: self.input("VALUE", SCRATCH_ZERO),
            },
            "data_addtolist" => BlockKind::AddToList {
                list: self.storage("LIST")?,
                item: self.input("ITEM", SCRATCH_EMPTY),
            },
            "data_deleteoflist" => BlockKind::DeleteOfList {
                list: self.storage("LIST")?,
                index: self.input("INDEX", SCRATCH_ZERO),
            },
            "data_deletealloflist" => BlockKind::DeleteAllOfList {
                list: self.storage("LIST")?,
            },
            "data_itemoflist" => BlockKind::ItemOfList {
                list: self.storage("LIST")?,
                index: self.input("INDEX", SCRATCH_ZERO),
            },
            "data_lengthoflist" => BlockKind::LengthOfList {
                list: self.storage("LIST")?,
            },
            "ftduino_menu_motor" => BlockKind::MotorMenu {
                motor: self.field("MOTOR")?,
            },
            "ftduino_motor_set" => BlockKind::MotorSet {
                motor: self.input("MOTOR", SCRATCH_EMPTY),
                speed: self.input("SPEED", SCRATCH_ZERO),
            },
            "ftduino_motor_stop" => BlockKind::MotorStop {
                motor: self.input("MOTOR", SCRATCH_EMPTY),
            },
            other => {
                return Err(ConvertError::UnimplementedOpcode {
                    opcode: other.to_string(),
                    block: self.id.to_string(),
                })
            }
        };
        Ok(kind)
    }

    fn binary(&self, op: BinaryOp) -> BlockKind {
        let [(left_name, left_neutral), (right_name, right_neutral)] = op.slots();
        BlockKind::Binary {
            op,
            left: self.input(left_name, left_neutral),
            right: self.input(right_name, right_neutral),
        }
    }

    fn unary(&self, op: UnaryOp) -> BlockKind {
        let (name, neutral) = op.slot();
        BlockKind::Unary {
            op,
            operand: self.input(name, neutral),
        }
    }

    fn input(&self, name: &'static str, neutral: Literal) -> Input {
        let mut input = Input::new(name, neutral);
        let Some(raw) = self.raw.inputs.get(name) else {
            return input;
        };
        input.value = raw.value.as_ref().map(input_value);
        if let Some(RawValue::Block(shadow_id)) = &raw.shadow {
            input.shadow = Some(Link::Unresolved(shadow_id.clone()));
        }
        input
    }

    fn substack(&self, name: &'static str) -> Result<Substack> {
        let mut substack = Substack::new(name);
        match self.raw.inputs.get(name).and_then(|raw| raw.value.as_ref()) {
            None => {}
            Some(RawValue::Block(id)) => substack.link = Some(Link::Unresolved(id.clone())),
            Some(RawValue::Primitive(_)) => {
                return Err(ConvertError::malformed(format!(
                    "Substack '{}' of block '{}' holds a literal instead of a block.",
                    name, self.id
                )))
            }
        }
        Ok(substack)
    }

    fn field<F: ScratchField>(&self, name: &str) -> Result<F> {
        let value = self
            .raw
            .fields
            .get(name)
            .and_then(|field| field.value.as_deref());
        let invalid = |value: &str| ConvertError::InvalidField {
            block: self.id.to_string(),
            field: name.to_string(),
            value: value.to_string(),
        };
        let value = value.ok_or_else(|| invalid("null"))?;
        F::from_token(value).ok_or_else(|| invalid(value))
    }

    fn storage(&self, name: &str) -> Result<StorageRef> {
        let field = self.raw.fields.get(name).ok_or_else(|| {
            ConvertError::malformed(format!("Block '{}' is missing field '{}'.", self.id, name))
        })?;
        let display = field.value.clone().unwrap_or_default();
        Ok(StorageRef::new(display, field.id.clone()))
    }
}

fn input_value(raw: &RawValue) -> ScratchValue {
    match raw {
        RawValue::Block(id) => ScratchValue::Block(Link::Unresolved(id.clone())),
        RawValue::Primitive(Primitive::Number(text)) => {
            ScratchValue::Literal(Literal::from_number_text(text))
        }
        RawValue::Primitive(
            Primitive::Color(text) | Primitive::Text(text) | Primitive::Broadcast(text),
        ) => ScratchValue::Literal(Literal::Text(text.clone())),
        RawValue::Primitive(Primitive::Variable { name, id }) => {
            ScratchValue::Variable(StorageRef::new(name.clone(), id.clone()))
        }
        RawValue::Primitive(Primitive::List { name, id }) => {
            ScratchValue::List(StorageRef::new(name.clone(), id.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::project::{RawField, RawInput};
    use std::collections::BTreeMap;

    fn raw(opcode: &str) -> RawBlock {
        RawBlock {
            opcode: opcode.to_string(),
            ..RawBlock::default()
        }
    }

    #[test]
    fn unknown_opcode_is_rejected_with_its_name() {
        let err = Block::from_raw("b1", &raw("looks_say")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnimplementedOpcode);
        assert!(err.to_string().contains("looks_say"));
        assert!(err.to_string().contains("b1"));
    }

    #[test]
    fn absent_inputs_keep_their_neutral_literal() {
        let block = Block::from_raw("s", &raw("operator_subtract")).unwrap();
        let BlockKind::Binary { op, left, right } = block.kind else {
            panic!("expected a binary operator");
        };
        assert_eq!(op, BinaryOp::Subtract);
        assert_eq!((left.name, right.name), ("NUM1", "NUM2"));
        assert_eq!(left.neutral, Literal::Number(0.0));
        assert!(right.value.is_none());
    }

    #[test]
    fn literal_and_block_inputs_are_read() {
        let mut block = raw("operator_add");
        block.inputs.insert(
            "NUM1".to_string(),
            RawInput {
                value: Some(RawValue::Primitive(Primitive::Number("2.5".to_string()))),
                shadow: None,
            },
        );
        block.inputs.insert(
            "NUM2".to_string(),
            RawInput {
                value: Some(RawValue::Block("r".to_string())),
                shadow: Some(RawValue::Block("sh".to_string())),
            },
        );
        let block = Block::from_raw("a", &block).unwrap();
        let inputs = block.kind.inputs();
        assert_eq!(
            inputs[0].value,
            Some(ScratchValue::Literal(Literal::Number(2.5)))
        );
        assert_eq!(
            inputs[1].value,
            Some(ScratchValue::Block(Link::Unresolved("r".to_string())))
        );
        assert_eq!(inputs[1].shadow, Some(Link::Unresolved("sh".to_string())));
    }

    #[test]
    fn menu_fields_are_validated_eagerly() {
        let mut block = raw("ftduino_menu_motor");
        block.fields = BTreeMap::from([(
            "MOTOR".to_string(),
            RawField {
                value: Some("m3".to_string()),
                id: None,
            },
        )]);
        let parsed = Block::from_raw("m", &block).unwrap();
        assert_eq!(parsed.kind, BlockKind::MotorMenu { motor: Motor::M3 });

        block.fields.get_mut("MOTOR").unwrap().value = Some("M9".to_string());
        let err = Block::from_raw("m", &block).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert!(err.to_string().contains("M9"));
    }

    #[test]
    fn literal_substack_is_malformed() {
        let mut block = raw("control_forever");
        block.inputs.insert(
            "SUBSTACK".to_string(),
            RawInput {
                value: Some(RawValue::Primitive(Primitive::Text("x".to_string()))),
                shadow: None,
            },
        );
        let err = Block::from_raw("f", &block).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }
}
