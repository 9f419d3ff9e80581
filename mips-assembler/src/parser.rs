//! # Line Parser
//!
//! Splits the token stream into lines, binds labels, runs directives and
//! collects instruction lines with parsed operands. Label operands are kept
//! symbolic; the encoder resolves them once every label is known, which is
//! what makes forward references work.
//!
//! Each line is handled independently: an error is reported as a diagnostic
//! and the rest of that line is dropped.

use crate::diagnostic::Diagnostic;
use crate::lexer::{Literal, Token, TokenKind};
use mips_spec::{segment_limit, FpuRegister, Register, HEAP_BASE};
use std::collections::HashMap;

/// Section receiving the output of the current line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Text,
    Data,
}

/// Parsed instruction operand
#[derive(Debug, Clone, PartialEq)]
pub enum OperandValue {
    Register(Register),
    FpuRegister(FpuRegister),
    Immediate(i64),
    /// Symbolic reference resolved by the encoder
    Label(String),
    /// `offset(base)`
    Memory { offset: i64, base: Register },
}

/// Operand with the token it starts at
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub value: OperandValue,
    pub token: Token,
}

/// One instruction line, placed at its text address
#[derive(Debug, Clone, PartialEq)]
pub struct InstructionValue {
    pub address: u32,
    pub mnemonic: Token,
    pub operands: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataItem {
    /// Serialized little-endian bytes
    Bytes(Vec<u8>),
    /// `.word label`, resolved after parsing
    LabelWord(Token),
}

/// Data emitted at a fixed address of the data segment
#[derive(Debug, Clone, PartialEq)]
pub struct DataValue {
    pub address: u32,
    pub item: DataItem,
}

impl DataValue {
    pub fn len(&self) -> usize {
        match &self.item {
            DataItem::Bytes(bytes) => bytes.len(),
            DataItem::LabelWord(_) => 4,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of parsing a translation unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    /// Write-once label bindings
    pub labels: HashMap<String, u32>,
    /// `.eqv` aliases, substituted for later identifiers
    pub eqv_aliases: HashMap<String, Vec<Token>>,
    pub data_values: Vec<DataValue>,
    pub instructions: Vec<InstructionValue>,
    /// Names declared with `.globl`
    pub globals: Vec<String>,
}

impl Program {
    pub fn label(&self, name: &str) -> Option<u32> {
        self.labels.get(name).copied()
    }
}

/// Line parser with one cursor per section
pub struct Parser {
    program: Program,
    diagnostics: Vec<Diagnostic>,
    section: Section,
    text_cursor: u32,
    data_cursor: u32,
    /// `[base, limit)` of each segment
    text_bounds: (u32, u64),
    data_bounds: (u32, u64),
}

impl Parser {
    /// Text may grow up to the data base, data up to the heap
    pub fn new(text_base: u32, data_base: u32) -> Self {
        Self {
            program: Program::default(),
            diagnostics: Vec::new(),
            section: Section::Text,
            text_cursor: text_base,
            data_cursor: data_base,
            text_bounds: (text_base, segment_limit(text_base, data_base)),
            data_bounds: (data_base, segment_limit(data_base, HEAP_BASE)),
        }
    }

    /// Parse a complete token stream
    pub fn parse(mut self, tokens: &[Token]) -> (Program, Vec<Diagnostic>) {
        for line in tokens.split(|t| t.is(TokenKind::Newline) || t.is(TokenKind::Eof)) {
            let line: Vec<Token> = line
                .iter()
                .filter(|t| !t.is(TokenKind::Comment))
                .cloned()
                .collect();
            self.parse_line(line);
        }
        (self.program, self.diagnostics)
    }

    fn cursor(&self) -> u32 {
        match self.section {
            Section::Text => self.text_cursor,
            Section::Data => self.data_cursor,
        }
    }

    fn cursor_mut(&mut self) -> &mut u32 {
        match self.section {
            Section::Text => &mut self.text_cursor,
            Section::Data => &mut self.data_cursor,
        }
    }

    fn bounds(&self) -> (u32, u64) {
        match self.section {
            Section::Text => self.text_bounds,
            Section::Data => self.data_bounds,
        }
    }

    fn align_cursor(&mut self, alignment: u32) {
        let cursor = self.cursor_mut();
        let mask = alignment as u64 - 1;
        let aligned = (*cursor as u64 + mask) & !mask;
        *cursor = u32::try_from(aligned).unwrap_or(u32::MAX);
    }

    /// Check that `len` bytes fit at the cursor of the active section
    fn reserve(&mut self, token: &Token, len: u64) -> bool {
        let (_, limit) = self.bounds();
        let end = self.cursor() as u64 + len;
        if end > limit {
            let name = match self.section {
                Section::Text => "text",
                Section::Data => "data",
            };
            self.error(
                token,
                format!("{} segment would end at {:#x}, past its limit {:#010x}", name, end, limit),
            );
            return false;
        }
        true
    }

    fn error(&mut self, token: &Token, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::error_at(token, message));
    }

    fn warning(&mut self, token: &Token, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::warning_at(token, message));
    }

    fn parse_line(&mut self, tokens: Vec<Token>) {
        // Leading `label:` pairs
        let mut labels = Vec::new();
        let mut rest = tokens.as_slice();
        while let [name, colon, tail @ ..] = rest {
            if !(name.is(TokenKind::Identifier) && colon.is(TokenKind::Colon)) {
                break;
            }
            labels.push(name.clone());
            rest = tail;
        }

        let Some((head, args)) = rest.split_first() else {
            self.bind_labels(&labels);
            return;
        };

        match head.kind {
            TokenKind::Directive => self.directive(head, args, &labels),
            TokenKind::Identifier => {
                self.bind_labels(&labels);
                self.instruction(head, args);
            }
            _ => {
                self.bind_labels(&labels);
                self.error(head, format!("expected an instruction or directive, found `{}`", head.lexeme));
            }
        }
    }

    fn bind_labels(&mut self, labels: &[Token]) {
        let address = self.cursor();
        for label in labels {
            if self.program.labels.contains_key(&label.lexeme) {
                self.error(label, format!("label `{}` is already defined", label.lexeme));
                continue;
            }
            self.program.labels.insert(label.lexeme.clone(), address);
        }
    }

    /// Replace identifiers bound by `.eqv` with their token text
    fn substitute(&self, tokens: &[Token]) -> Vec<Token> {
        let mut out = Vec::with_capacity(tokens.len());
        for token in tokens {
            match self.program.eqv_aliases.get(&token.lexeme) {
                Some(alias) if token.is(TokenKind::Identifier) => {
                    out.extend(alias.iter().map(|t| Token {
                        span: token.span.clone(),
                        line: token.line,
                        ..t.clone()
                    }));
                }
                _ => out.push(token.clone()),
            }
        }
        out
    }

    // ========================================================================
    // Directives
    // ========================================================================

    fn directive(&mut self, directive: &Token, args: &[Token], labels: &[Token]) {
        let args = self.substitute(args);
        let name = directive.lexeme.to_ascii_lowercase();
        match name.as_str() {
            ".text" | ".data" => {
                self.section = if name == ".text" {
                    Section::Text
                } else {
                    Section::Data
                };
                match args.as_slice() {
                    [] => {}
                    [address] => {
                        let (base, limit) = self.bounds();
                        match address.int().and_then(|a| u32::try_from(a).ok()) {
                            Some(a) if a >= base && (a as u64) < limit => *self.cursor_mut() = a,
                            Some(a) => self.error(
                                address,
                                format!(
                                    "address {:#010x} is outside the {} segment [{:#010x}, {:#010x})",
                                    a, &name[1..], base, limit
                                ),
                            ),
                            None => self.error(address, "expected a section address"),
                        }
                    }
                    [_, extra, ..] => self.error(extra, format!("unexpected operand after `{}`", name)),
                }
                self.bind_labels(labels);
            }
            ".globl" => {
                self.bind_labels(labels);
                for arg in &args {
                    match arg.kind {
                        TokenKind::Identifier => self.program.globals.push(arg.lexeme.clone()),
                        TokenKind::Comma => {}
                        _ => self.error(arg, "expected a symbol name"),
                    }
                }
            }
            ".eqv" => {
                self.bind_labels(labels);
                self.eqv(directive, &args);
            }
            ".align" => {
                match args.as_slice() {
                    [n] => match n.int().filter(|n| (0..=16).contains(n)) {
                        Some(n) => self.align_cursor(1 << n),
                        None => self.error(n, "alignment must be between 0 and 16"),
                    },
                    _ => self.error(directive, "`.align` expects one operand"),
                }
                self.bind_labels(labels);
            }
            ".byte" | ".half" | ".word" | ".float" | ".double" | ".ascii" | ".asciiz"
            | ".space" => {
                if self.section != Section::Data {
                    self.bind_labels(labels);
                    self.error(directive, format!("`{}` is only allowed in the .data section", name));
                    return;
                }
                let alignment = match name.as_str() {
                    ".half" => 2,
                    ".word" | ".float" => 4,
                    ".double" => 8,
                    _ => 1,
                };
                self.align_cursor(alignment);
                self.bind_labels(labels);
                self.data(directive, &name, &args);
            }
            _ => {
                self.bind_labels(labels);
                self.error(directive, format!("unknown directive `{}`", directive.lexeme));
            }
        }
    }

    fn eqv(&mut self, directive: &Token, args: &[Token]) {
        match args {
            [name, body @ ..] if name.is(TokenKind::Identifier) && !body.is_empty() => {
                if self.program.eqv_aliases.contains_key(&name.lexeme) {
                    self.error(name, format!("`{}` is already defined by .eqv", name.lexeme));
                    return;
                }
                self.program
                    .eqv_aliases
                    .insert(name.lexeme.clone(), body.to_vec());
            }
            _ => self.error(directive, "`.eqv` expects a name followed by replacement text"),
        }
    }

    fn data(&mut self, directive: &Token, name: &str, args: &[Token]) {
        let values: Vec<&Token> = args.iter().filter(|t| !t.is(TokenKind::Comma)).collect();

        if name == ".space" {
            match values.as_slice() {
                [size] => match size.int().and_then(|n| u32::try_from(n).ok()) {
                    Some(n) => {
                        if self.reserve(size, n as u64) {
                            self.emit(size, DataItem::Bytes(vec![0; n as usize]));
                        }
                    }
                    None => self.error(size, "`.space` expects a non-negative byte count"),
                },
                _ => self.error(directive, "`.space` expects exactly one operand"),
            }
            return;
        }

        if values.is_empty() {
            self.warning(directive, format!("`{}` has no values", name));
            return;
        }

        for value in values {
            match name {
                ".byte" => self.integer(value, 1),
                ".half" => self.integer(value, 2),
                ".word" if value.is(TokenKind::Identifier) => {
                    self.emit(value, DataItem::LabelWord(value.clone()))
                }
                ".word" => self.integer(value, 4),
                ".float" => match value.float() {
                    Some(f) if value.is(TokenKind::Number) => {
                        let single = f as f32;
                        if single.is_infinite() && f.is_finite() {
                            self.warning(value, "value overflows single precision");
                        }
                        self.emit(value, DataItem::Bytes(single.to_le_bytes().to_vec()));
                    }
                    _ => self.error(value, "expected a floating point value"),
                },
                ".double" => match value.float() {
                    Some(f) if value.is(TokenKind::Number) => {
                        self.emit(value, DataItem::Bytes(f.to_le_bytes().to_vec()))
                    }
                    _ => self.error(value, "expected a floating point value"),
                },
                _ => match &value.literal {
                    Literal::Str(bytes) => {
                        let mut bytes = bytes.clone();
                        if name == ".asciiz" {
                            bytes.push(0);
                        }
                        self.emit(value, DataItem::Bytes(bytes));
                    }
                    _ => self.error(value, "expected a string literal"),
                },
            }
        }
    }

    /// Emit `value` as a `size`-byte little-endian integer
    fn integer(&mut self, token: &Token, size: u32) {
        let Some(value) = token.int() else {
            self.error(token, "expected an integer value");
            return;
        };
        let bits = size * 8;
        let min = -(1i64 << (bits - 1));
        let max = (1i64 << bits) - 1;
        if value < min || value > max {
            self.warning(token, format!("value {} truncated to {} bits", value, bits));
        }
        let bytes = value.to_le_bytes()[..size as usize].to_vec();
        self.emit(token, DataItem::Bytes(bytes));
    }

    fn emit(&mut self, token: &Token, item: DataItem) {
        let value = DataValue {
            address: self.data_cursor,
            item,
        };
        if !self.reserve(token, value.len() as u64) {
            return;
        }
        self.data_cursor += value.len() as u32;
        self.program.data_values.push(value);
    }

    // ========================================================================
    // Instructions
    // ========================================================================

    fn instruction(&mut self, mnemonic: &Token, args: &[Token]) {
        if self.section != Section::Text {
            self.error(mnemonic, "instructions are only allowed in the .text section");
            return;
        }
        if !self.reserve(mnemonic, 4) {
            return;
        }
        let address = self.text_cursor;
        // The line occupies its slot even when it fails to parse.
        self.text_cursor += 4;

        let args = self.substitute(args);
        let mut operands = Vec::new();
        if !args.is_empty() {
            for group in args.split(|t| t.is(TokenKind::Comma)) {
                match parse_operand(group, mnemonic) {
                    Ok(operand) => operands.push(operand),
                    Err(diagnostic) => {
                        self.diagnostics.push(diagnostic);
                        return;
                    }
                }
            }
        }

        self.program.instructions.push(InstructionValue {
            address,
            mnemonic: mnemonic.clone(),
            operands,
        });
    }
}

fn register(token: &Token) -> Result<OperandValue, Diagnostic> {
    if let Some(reg) = Register::parse(&token.lexeme) {
        return Ok(OperandValue::Register(reg));
    }
    if let Some(reg) = FpuRegister::parse(&token.lexeme) {
        return Ok(OperandValue::FpuRegister(reg));
    }
    Err(Diagnostic::error_at(token, format!("unknown register `{}`", token.lexeme)))
}

fn base_register(token: &Token) -> Result<Register, Diagnostic> {
    match register(token)? {
        OperandValue::Register(reg) => Ok(reg),
        _ => Err(Diagnostic::error_at(token, "base must be a general purpose register")),
    }
}

fn immediate(token: &Token) -> Result<i64, Diagnostic> {
    match token.literal {
        Literal::Int(value) => Ok(value),
        Literal::Float(_) => Err(Diagnostic::error_at(
            token,
            "floating point literals are not instruction operands",
        )),
        _ => Err(Diagnostic::error_at(token, "expected an integer")),
    }
}

/// Parse the tokens between two commas
fn parse_operand(group: &[Token], mnemonic: &Token) -> Result<Operand, Diagnostic> {
    use TokenKind as T;

    let Some(first) = group.first() else {
        return Err(Diagnostic::error_at(mnemonic, "missing operand"));
    };
    let operand = |value| Operand {
        value,
        token: first.clone(),
    };

    match group {
        [reg] if reg.is(T::Register) => register(reg).map(operand),
        [num] if num.is(T::Number) || num.is(T::Char) => immediate(num).map(|v| operand(OperandValue::Immediate(v))),
        [name] if name.is(T::Identifier) => Ok(operand(OperandValue::Label(name.lexeme.clone()))),
        [open, base, close] if open.is(T::LeftParen) && close.is(T::RightParen) => {
            let base = base_register(base)?;
            Ok(operand(OperandValue::Memory { offset: 0, base }))
        }
        [num, open, base, close]
            if (num.is(T::Number) || num.is(T::Char))
                && open.is(T::LeftParen)
                && close.is(T::RightParen) =>
        {
            let offset = immediate(num)?;
            let base = base_register(base)?;
            Ok(operand(OperandValue::Memory { offset, base }))
        }
        _ => Err(Diagnostic::error_at(
            first,
            format!("malformed operand starting at `{}`", first.lexeme),
        )),
    }
}
