use crate::emit::CodeEmitter;
use crate::error::Result;

pub const SCRATCH_ZERO: Literal = Literal::Number(0.0);
pub const SCRATCH_FALSE: Literal = Literal::Bool(false);
pub const SCRATCH_EMPTY: Literal = Literal::Text(String::new());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockIndex(pub(crate) usize);

/// A reference to another block: an id until the resolve pass, an arena index after.
#[derive(Debug, Clone, PartialEq)]
pub enum Link {
    Unresolved(String),
    Resolved(BlockIndex),
}

impl Link {
    pub fn index(&self) -> Option<BlockIndex> {
        match self {
            Link::Resolved(index) => Some(*index),
            Link::Unresolved(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f32),
    Text(String),
    Bool(bool),
}

impl Literal {
    /// Number-typed slots hold text in the save file; non-numeric text stays text
    /// and is coerced by the runtime.
    pub fn from_number_text(text: &str) -> Literal {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Literal::Text(text.to_string());
        }
        match trimmed {
            "Infinity" | "+Infinity" => return Literal::Number(f32::INFINITY),
            "-Infinity" => return Literal::Number(f32::NEG_INFINITY),
            _ => {}
        }
        let unsigned = trimmed.trim_start_matches(['+', '-']);
        let spelled_infinity = unsigned
            .get(..3)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("inf"));
        if spelled_infinity || unsigned.eq_ignore_ascii_case("nan") {
            return Literal::Text(text.to_string());
        }
        match trimmed.parse::<f32>() {
            Ok(value) => Literal::Number(value),
            Err(_) => Literal::Text(text.to_string()),
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Literal {
        match value {
            serde_json::Value::Bool(b) => Literal::Bool(*b),
            serde_json::Value::Number(n) => Literal::Number(n.as_f64().unwrap_or_default() as f32),
            serde_json::Value::String(s) => Literal::Text(s.clone()),
            serde_json::Value::Null => SCRATCH_EMPTY,
            other => Literal::Text(other.to_string()),
        }
    }

    pub fn to_code(&self) -> String {
        match self {
            Literal::Number(value) => format_float(*value),
            Literal::Text(text) => quote_c_string(text),
            Literal::Bool(true) => "true".to_string(),
            Literal::Bool(false) => "false".to_string(),
        }
    }
}

pub fn format_float(value: f32) -> String {
    if value.is_nan() {
        return "NAN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "INFINITY" } else { "-INFINITY" }.to_string();
    }
    let text = format!("{}", value);
    if text.contains('.') {
        format!("{}f", text)
    } else {
        format!("{}.0f", text)
    }
}

pub fn quote_c_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\{:03o}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Variable or list reference; `ident` is filled in by the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageRef {
    pub name: String,
    pub id: Option<String>,
    pub ident: Option<String>,
}

impl StorageRef {
    pub fn new(name: impl Into<String>, id: Option<String>) -> Self {
        Self {
            name: name.into(),
            id,
            ident: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScratchValue {
    Literal(Literal),
    Block(Link),
    Variable(StorageRef),
    List(StorageRef),
}

impl ScratchValue {
    pub fn emit(&self, emitter: &mut CodeEmitter<'_>, depth: usize) -> Result<String> {
        match self {
            ScratchValue::Literal(literal) => Ok(literal.to_code()),
            ScratchValue::Block(link) => {
                let index = emitter.linked(link)?;
                emitter.expression(index, depth)
            }
            ScratchValue::Variable(storage) | ScratchValue::List(storage) => {
                emitter.storage_ident(storage)
            }
        }
    }
}

/// An input slot of a block with the neutral literal used when the slot is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Input {
    pub name: &'static str,
    pub value: Option<ScratchValue>,
    pub shadow: Option<Link>,
    pub neutral: Literal,
}

impl Input {
    pub fn new(name: &'static str, neutral: Literal) -> Self {
        Self {
            name,
            value: None,
            shadow: None,
            neutral,
        }
    }

    pub fn emit(&self, emitter: &mut CodeEmitter<'_>, depth: usize) -> Result<String> {
        match &self.value {
            Some(value) => value.emit(emitter, depth),
            None => Ok(self.neutral.to_code()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Substack {
    pub name: &'static str,
    pub link: Option<Link>,
}

impl Substack {
    pub fn new(name: &'static str) -> Self {
        Self { name, link: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0.0, "0.0f"; "zero")]
    #[test_case(10.0, "10.0f"; "integral")]
    #[test_case(-2.5, "-2.5f"; "negative fraction")]
    #[test_case(0.1, "0.1f"; "shortest representation")]
    #[test_case(f32::INFINITY, "INFINITY"; "infinity")]
    #[test_case(f32::NAN, "NAN"; "nan")]
    fn float_literals(value: f32, expected: &str) {
        assert_eq!(format_float(value), expected);
    }

    #[test]
    fn strings_are_escaped_for_c() {
        assert_eq!(quote_c_string("a\"b\\c\n"), "\"a\\\"b\\\\c\\n\"");
        assert_eq!(quote_c_string("\u{1}x"), "\"\\001x\"");
        assert_eq!(quote_c_string("grüße"), "\"grüße\"");
    }

    #[test_case("Infinity", Literal::Number(f32::INFINITY); "scratch infinity")]
    #[test_case("-Infinity", Literal::Number(f32::NEG_INFINITY); "negative scratch infinity")]
    #[test_case("inf", Literal::Text("inf".to_string()); "short inf")]
    #[test_case("infinity", Literal::Text("infinity".to_string()); "lowercase infinity")]
    #[test_case("-INF", Literal::Text("-INF".to_string()); "signed uppercase inf")]
    #[test_case("NaN", Literal::Text("NaN".to_string()); "nan word")]
    fn only_exact_infinity_spellings_are_numbers(text: &str, expected: Literal) {
        assert_eq!(Literal::from_number_text(text), expected);
    }

    #[test]
    fn number_text_falls_back_to_text() {
        assert_eq!(Literal::from_number_text("12"), Literal::Number(12.0));
        assert_eq!(Literal::from_number_text(" 1.5 "), Literal::Number(1.5));
        assert_eq!(
            Literal::from_number_text("hello"),
            Literal::Text("hello".to_string())
        );
        assert_eq!(Literal::from_number_text(""), Literal::Text(String::new()));
    }
}
