/// A closed menu enumeration stored in a block's `fields`.
///
/// Tokens match case-insensitively; anything outside the table is rejected by the
/// block factory rather than mapped to a default.
pub trait ScratchField: Sized + Copy + 'static {
    const TABLE: &'static [(&'static str, Self)];

    fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        Self::TABLE
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(token))
            .map(|(_, value)| *value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motor {
    M1,
    M2,
    M3,
    M4,
}

impl ScratchField for Motor {
    const TABLE: &'static [(&'static str, Self)] = &[
        ("M1", Motor::M1),
        ("M2", Motor::M2),
        ("M3", Motor::M3),
        ("M4", Motor::M4),
    ];
}

impl Motor {
    pub fn token(self) -> &'static str {
        match self {
            Motor::M1 => "M1",
            Motor::M2 => "M2",
            Motor::M3 => "M3",
            Motor::M4 => "M4",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    Abs,
    Floor,
    Ceiling,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Ln,
    Log,
    Exp,
    Pow10,
}

impl ScratchField for MathOp {
    const TABLE: &'static [(&'static str, Self)] = &[
        ("abs", MathOp::Abs),
        ("floor", MathOp::Floor),
        ("ceiling", MathOp::Ceiling),
        ("sqrt", MathOp::Sqrt),
        ("sin", MathOp::Sin),
        ("cos", MathOp::Cos),
        ("tan", MathOp::Tan),
        ("asin", MathOp::Asin),
        ("acos", MathOp::Acos),
        ("atan", MathOp::Atan),
        ("ln", MathOp::Ln),
        ("log", MathOp::Log),
        ("e ^", MathOp::Exp),
        ("10 ^", MathOp::Pow10),
    ];
}

impl MathOp {
    /// Runtime function implementing the operation.
    pub fn function(self) -> &'static str {
        match self {
            MathOp::Abs => "s_abs",
            MathOp::Floor => "s_floor",
            MathOp::Ceiling => "s_ceiling",
            MathOp::Sqrt => "s_sqrt",
            MathOp::Sin => "s_sin",
            MathOp::Cos => "s_cos",
            MathOp::Tan => "s_tan",
            MathOp::Asin => "s_asin",
            MathOp::Acos => "s_acos",
            MathOp::Atan => "s_atan",
            MathOp::Ln => "s_ln",
            MathOp::Log => "s_log",
            MathOp::Exp => "s_exp",
            MathOp::Pow10 => "s_pow10",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOption {
    All,
    ThisScript,
    OtherScripts,
}

impl ScratchField for StopOption {
    const TABLE: &'static [(&'static str, Self)] = &[
        ("all", StopOption::All),
        ("this script", StopOption::ThisScript),
        ("other scripts in sprite", StopOption::OtherScripts),
        ("other scripts in stage", StopOption::OtherScripts),
    ];
}
