use std::fmt;

/// One assembly-time failure. Carries the source line it was raised on; the
/// optional input path is attached later via [`AssemblerError::with_path`]
/// once the binary knows what file it read, mirroring how the library
/// never needs to know its own input's name while parsing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssemblerError {
    pub line: u32,
    pub kind: AssemblerErrorKind,
    pub path: Option<String>,
}

impl AssemblerError {
    pub fn new(line: u32, kind: AssemblerErrorKind) -> Self {
        AssemblerError {
            line,
            kind,
            path: None,
        }
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = Some(path.to_owned());
        self
    }
}

impl fmt::Display for AssemblerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}:{}: ERROR: {}",
            self.path.as_deref().unwrap_or("<input>"),
            self.line,
            self.kind
        )
    }
}

impl std::error::Error for AssemblerError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssemblerErrorKind {
    // Lexical
    BadEscape(char),
    BadCharLiteral,
    UnterminatedString,
    ConstantTooLarge(String),
    NumericValueExpected,
    HexAddressExpected(String),

    // Syntactic
    LabelExpected,
    BadlyFormedLabel(String),
    TrailingCharacters(String),
    RegisterExpected(String),
    SpecialRegisterExpected(String),
    ExpectedToken(char),

    // Semantic
    DuplicateLabel { name: String, first_line: u32 },
    UnknownMnemonic(String),
    UnknownDirective(String),
    InstructionOutsideText,
    StringInBss,
    BranchToExternal(String),
    LabelTooLong(String),
    LabelStartsWithDigit(String),
    UnresolvedGlobal(String),
    TrailingComma,
    SpaceCountNotDecimal(String),
    SpaceOutsideBss,
}

impl fmt::Display for AssemblerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use AssemblerErrorKind::*;
        match self {
            BadEscape(c) => write!(f, "bad character escape `\\{}`", c),
            BadCharLiteral => write!(f, "bad character constant"),
            UnterminatedString => write!(f, "unterminated string literal"),
            ConstantTooLarge(tok) => write!(f, "constant too large `{}`", tok),
            NumericValueExpected => write!(f, "numeric value expected"),
            HexAddressExpected(tok) => write!(f, "hexadecimal address expected `{}`", tok),
            LabelExpected => write!(f, "label expected"),
            BadlyFormedLabel(tok) => write!(f, "badly formed label `{}`", tok),
            TrailingCharacters(tok) => write!(f, "unexpected trailing characters `{}`", tok),
            RegisterExpected(tok) => write!(f, "register identifier expected `{}`", tok),
            SpecialRegisterExpected(tok) => {
                write!(f, "special-register identifier expected `{}`", tok)
            }
            ExpectedToken(c) => write!(f, "expected `{}`", c),
            DuplicateLabel { name, first_line } => write!(
                f,
                "duplicate label `{}` (first defined on line {})",
                name, first_line
            ),
            UnknownMnemonic(tok) => write!(f, "unknown mnemonic `{}`", tok),
            UnknownDirective(tok) => write!(f, "unknown directive `{}`", tok),
            InstructionOutsideText => write!(f, "instruction outside .text segment"),
            StringInBss => write!(f, "string literal not allowed in .bss segment"),
            BranchToExternal(name) => write!(f, "branch to external target `{}`", name),
            LabelTooLong(tok) => write!(f, "label `{}` exceeds maximum length", tok),
            LabelStartsWithDigit(tok) => write!(f, "label `{}` starts with a digit", tok),
            UnresolvedGlobal(name) => write!(f, "unresolved global `{}`", name),
            TrailingComma => write!(f, "trailing comma"),
            SpaceCountNotDecimal(tok) => write!(f, ".space count must be decimal `{}`", tok),
            SpaceOutsideBss => write!(f, ".space only allowed in .bss segment"),
        }
    }
}

/// A non-fatal condition reported to the caller rather than printed
/// directly: only `.bss`-initializer-ignored exists today.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Warning {
    pub line: u32,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: WARNING: {}", self.line, self.message)
    }
}

pub type Result<T> = std::result::Result<T, AssemblerError>;
