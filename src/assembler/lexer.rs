//! Statement tokenizing and operand classification
//!
//! A line may hold several statements separated by ` : `. Each statement
//! carries an optional label, an optional mnemonic, and comma-separated
//! operands. Operands are classified just enough to dispatch through the
//! encoder: plain tokens (registers, conditions, numbers, labels, one-level
//! `label+n` arithmetic), `(expr)` indirection, and `(IX+d)`/`(IY+d)`
//! indexed addressing.

use std::collections::HashMap;

use super::AssembleError;

/// One parsed statement: `LABEL: MNEMONIC OP1, OP2 ; comment`.
#[derive(Debug, Clone)]
pub struct Statement {
    pub label: Option<String>,
    pub mnemonic: Option<String>,
    pub operands: Vec<Operand>,
    pub line: u32,
}

/// A classified operand. Resolution of bare identifiers into registers,
/// conditions, or expressions happens lazily through the accessor methods
/// below, since the same text ("C") means different things in different
/// operand positions.
#[derive(Debug, Clone)]
pub enum Operand {
    /// A register, condition, number, label, or `label+n` expression text.
    Bare(String),
    /// `(expr)` — memory indirection, or `(C)` for port-indexed IN/OUT.
    Indirect(String),
    /// `(IX+d)` / `(IX-d)` — the displacement expression text.
    IndexedIx(String),
    /// `(IY+d)` / `(IY-d)`.
    IndexedIy(String),
}

const REG8_NAMES: [&str; 8] = ["B", "C", "D", "E", "H", "L", "", "A"];
const REG16_NAMES: [&str; 4] = ["BC", "DE", "HL", "SP"];
const REG16_2_NAMES: [&str; 4] = ["BC", "DE", "HL", "AF"];
const CONDITIONS: [&str; 8] = ["NZ", "Z", "NC", "C", "PO", "PE", "P", "M"];

impl Operand {
    /// Register index 0..=7 (B C D E H L (HL)=6 A), honoring `(HL)`.
    pub fn as_reg8(&self) -> Option<u8> {
        match self {
            Operand::Bare(s) => {
                let up = s.to_ascii_uppercase();
                REG8_NAMES
                    .iter()
                    .position(|&n| !n.is_empty() && n == up)
                    .map(|i| i as u8)
            }
            Operand::Indirect(inner) if inner.trim().eq_ignore_ascii_case("hl") => Some(6),
            _ => None,
        }
    }

    /// BC/DE/HL/SP register-pair index 0..=3, used by LD rp,nn / INC rp /
    /// DEC rp / ADD HL,rp. `IX`/`IY` also match, returning 2 (the HL slot);
    /// callers distinguish via [`Operand::index_prefix`].
    pub fn as_reg16(&self) -> Option<u8> {
        match self {
            Operand::Bare(s) => {
                let up = s.to_ascii_uppercase();
                if up == "IX" || up == "IY" {
                    return Some(2);
                }
                REG16_NAMES.iter().position(|&n| n == up).map(|i| i as u8)
            }
            _ => None,
        }
    }

    /// BC/DE/HL/AF register-pair index 0..=3 for PUSH/POP; IX/IY also
    /// match, returning 2.
    pub fn as_reg16_2(&self) -> Option<u8> {
        match self {
            Operand::Bare(s) => {
                let up = s.to_ascii_uppercase();
                if up == "IX" || up == "IY" {
                    return Some(2);
                }
                REG16_2_NAMES.iter().position(|&n| n == up).map(|i| i as u8)
            }
            _ => None,
        }
    }

    /// `Some(0xDD)` / `Some(0xFD)` if this operand names IX/IY directly
    /// (not through an indexed `(IX+d)` form); `None` otherwise.
    pub fn index_prefix(&self) -> Option<u8> {
        match self {
            Operand::Bare(s) => match s.to_ascii_uppercase().as_str() {
                "IX" => Some(0xDD),
                "IY" => Some(0xFD),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_sp(&self) -> bool {
        matches!(self, Operand::Bare(s) if s.eq_ignore_ascii_case("sp"))
    }

    pub fn is_a(&self) -> bool {
        matches!(self, Operand::Bare(s) if s.eq_ignore_ascii_case("a"))
    }

    pub fn is_indirect_hl(&self) -> bool {
        matches!(self, Operand::Indirect(s) if s.trim().eq_ignore_ascii_case("hl"))
    }

    pub fn is_indirect_bc(&self) -> bool {
        matches!(self, Operand::Indirect(s) if s.trim().eq_ignore_ascii_case("bc"))
    }

    pub fn is_indirect_de(&self) -> bool {
        matches!(self, Operand::Indirect(s) if s.trim().eq_ignore_ascii_case("de"))
    }

    pub fn is_indirect_sp(&self) -> bool {
        matches!(self, Operand::Indirect(s) if s.trim().eq_ignore_ascii_case("sp"))
    }

    pub fn is_indirect_c(&self) -> bool {
        matches!(self, Operand::Indirect(s) if s.trim().eq_ignore_ascii_case("c"))
    }

    /// Condition code 0..=7 (NZ Z NC C PO PE P M).
    pub fn as_condition(&self) -> Option<u8> {
        match self {
            Operand::Bare(s) => {
                let up = s.to_ascii_uppercase();
                CONDITIONS.iter().position(|&n| n == up).map(|i| i as u8)
            }
            _ => None,
        }
    }

    /// The raw expression text for a `(nn)` indirect operand that is not
    /// one of the special register forms.
    pub fn indirect_expr(&self) -> Option<&str> {
        match self {
            Operand::Indirect(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// The raw immediate/label expression text for a plain operand.
    pub fn bare_expr(&self) -> Option<&str> {
        match self {
            Operand::Bare(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn indexed_expr(&self) -> Option<(&str, &str)> {
        match self {
            Operand::IndexedIx(d) => Some(("IX", d.as_str())),
            Operand::IndexedIy(d) => Some(("IY", d.as_str())),
            _ => None,
        }
    }
}

/// Split `source` into statements, one per `;`-terminated, ` : `-separated
/// chunk across every line.
pub fn parse_statements(source: &str) -> Result<Vec<Statement>, AssembleError> {
    let mut statements = Vec::new();
    for (idx, raw_line) in source.lines().enumerate() {
        let line_no = (idx + 1) as u32;
        let without_comment = strip_comment(raw_line);
        if without_comment.trim().is_empty() {
            continue;
        }
        for chunk in split_statements(without_comment) {
            let chunk = chunk.trim();
            if chunk.is_empty() {
                continue;
            }
            statements.push(parse_one(chunk, line_no)?);
        }
    }
    Ok(statements)
}

fn strip_comment(line: &str) -> &str {
    match line.find(';') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Split on ` : ` (space-colon-space), not on a label-terminating `:`.
fn split_statements(line: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = line;
    while let Some(idx) = rest.find(" : ") {
        parts.push(&rest[..idx]);
        rest = &rest[idx + 3..];
    }
    parts.push(rest);
    parts
}

fn parse_one(chunk: &str, line: u32) -> Result<Statement, AssembleError> {
    let mut rest = chunk.trim();
    let mut label = None;

    if let Some(colon) = find_label_colon(rest) {
        label = Some(rest[..colon].trim().to_string());
        rest = rest[colon + 1..].trim();
    }

    if rest.is_empty() {
        return Ok(Statement {
            label,
            mnemonic: None,
            operands: Vec::new(),
            line,
        });
    }

    let (mnemonic, operand_text) = match rest.find(char::is_whitespace) {
        Some(idx) => (&rest[..idx], rest[idx..].trim()),
        None => (rest, ""),
    };

    let operands = split_operands(operand_text)
        .into_iter()
        .map(|tok| classify_operand(tok.trim(), line))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Statement {
        label,
        mnemonic: Some(mnemonic.to_string()),
        operands,
        line,
    })
}

/// A label is a leading identifier immediately followed by `:`, with no
/// intervening whitespace (so `LD A,1` isn't mistaken for a label).
fn find_label_colon(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = 0;
    if i >= bytes.len() || !(bytes[i].is_ascii_alphabetic() || bytes[i] == b'_') {
        return None;
    }
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b':' {
        Some(i)
    } else {
        None
    }
}

/// Split on top-level commas (not inside parens).
fn split_operands(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn classify_operand(tok: &str, line: u32) -> Result<Operand, AssembleError> {
    if tok.starts_with('(') && tok.ends_with(')') && tok.len() >= 2 {
        let inner = &tok[1..tok.len() - 1];
        let inner_up = inner.trim().to_ascii_uppercase();
        if let Some(d) = inner_up.strip_prefix("IX") {
            if d.starts_with('+') || d.starts_with('-') {
                return Ok(Operand::IndexedIx(d.to_string()));
            }
        }
        if let Some(d) = inner_up.strip_prefix("IY") {
            if d.starts_with('+') || d.starts_with('-') {
                return Ok(Operand::IndexedIy(d.to_string()));
            }
        }
        return Ok(Operand::Indirect(inner.trim().to_string()));
    }
    if tok.is_empty() {
        return Err(AssembleError::InvalidOperands(
            "<empty>".to_string(),
            "empty operand".to_string(),
            line,
        ));
    }
    Ok(Operand::Bare(tok.to_string()))
}

/// Parse a numeric literal: decimal, or `0x`-prefixed hex (case-insensitive).
pub fn parse_number(text: &str, line: u32) -> Result<i64, AssembleError> {
    let t = text.trim();
    let (neg, t) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t),
    };
    let value = if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).map_err(|_| AssembleError::BadNumber(text.to_string(), line))?
    } else if t.chars().all(|c| c.is_ascii_digit()) && !t.is_empty() {
        t.parse::<i64>()
            .map_err(|_| AssembleError::BadNumber(text.to_string(), line))?
    } else {
        return Err(AssembleError::BadNumber(text.to_string(), line));
    };
    Ok(if neg { -value } else { value })
}

/// Evaluate an expression: a number, a label, or one-level `label±n`
/// arithmetic. In tolerant mode, an unresolved label evaluates to 0
/// (Pass 1 only needs lengths, which never depend on label values).
pub fn eval_expr(
    text: &str,
    labels: &HashMap<String, i32>,
    tolerant: bool,
    line: u32,
) -> Result<i32, AssembleError> {
    let t = text.trim();
    if t.is_empty() {
        return Err(AssembleError::BadNumber(text.to_string(), line));
    }

    // Find a top-level '+' or '-' that isn't the leading sign of a number.
    let bytes = t.as_bytes();
    let mut split_at = None;
    for (i, &b) in bytes.iter().enumerate().skip(1) {
        if b == b'+' || b == b'-' {
            split_at = Some(i);
            break;
        }
    }

    if let Some(i) = split_at {
        let (left, op_and_right) = t.split_at(i);
        let op = op_and_right.as_bytes()[0];
        let right = &op_and_right[1..];
        let left_val = eval_atom(left, labels, tolerant, line)?;
        let right_val = eval_atom(right, labels, tolerant, line)?;
        return Ok(if op == b'+' {
            left_val + right_val
        } else {
            left_val - right_val
        });
    }

    eval_atom(t, labels, tolerant, line)
}

fn eval_atom(
    text: &str,
    labels: &HashMap<String, i32>,
    tolerant: bool,
    line: u32,
) -> Result<i32, AssembleError> {
    let t = text.trim();
    if t.is_empty() {
        return Err(AssembleError::BadNumber(text.to_string(), line));
    }
    let first = t.as_bytes()[0];
    if first.is_ascii_digit() || (first == b'-' && t.len() > 1) {
        return Ok(parse_number(t, line)? as i32);
    }
    let key = t.to_ascii_uppercase();
    match labels.get(&key) {
        Some(&val) => Ok(val),
        None if tolerant => Ok(0),
        None => Err(AssembleError::UndefinedLabel(t.to_string(), line)),
    }
}
