//! Two-pass assembler: source text to a flat byte image.
//!
//! Pass 1 walks the parsed statements, builds the label table, and tracks
//! the current address using "tolerant" resolution (an unresolved label
//! evaluates to 0, which never changes an instruction's encoded length).
//! Pass 2 walks the same statements again with the now-complete label
//! table, this time resolving "strictly" — an undefined label is a hard
//! error — and writes the final bytes into the image.

pub mod encoder;
pub mod lexer;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use encoder::encode;
use lexer::{eval_expr, parse_statements, Statement};

/// Size of the flat image produced by [`assemble`].
const IMAGE_SIZE: usize = 0x10000;

/// Everything produced by assembling a source string.
#[derive(Debug, Clone)]
pub struct AssembledProgram {
    /// The byte image, truncated to the high-water mark (the highest
    /// address written to plus one).
    pub image: Vec<u8>,
    /// Source line number for the first byte of each encoded statement,
    /// keyed by address. Used to highlight the current line while stepping.
    pub line_map: BTreeMap<u16, u32>,
    /// Every label and `EQU` symbol, resolved to its final value.
    pub labels: HashMap<String, i32>,
    /// A human-readable "addr | bytes | line | source" listing, one row
    /// per statement.
    pub listing: String,
}

/// Everything that can go wrong while assembling, each carrying the
/// 1-based source line it was raised from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembleError {
    /// A label referenced in strict mode has no entry in the symbol table.
    UndefinedLabel(String, u32),
    /// A mnemonic was given operands it doesn't accept.
    InvalidOperands(String, String, u32),
    /// A numeric literal couldn't be parsed.
    BadNumber(String, u32),
    /// A `JR`/`DJNZ` target is further than 127 bytes behind or 128 ahead.
    OutOfRangeRelative(i32, u32),
}

impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssembleError::UndefinedLabel(name, line) => {
                write!(f, "line {line}: undefined label `{name}`")
            }
            AssembleError::InvalidOperands(mnemonic, ops, line) => {
                write!(f, "line {line}: invalid operands for {mnemonic}: {ops}")
            }
            AssembleError::BadNumber(text, line) => {
                write!(f, "line {line}: invalid number `{text}`")
            }
            AssembleError::OutOfRangeRelative(offset, line) => {
                write!(
                    f,
                    "line {line}: relative jump offset {offset} out of range (-128..=127)"
                )
            }
        }
    }
}

impl std::error::Error for AssembleError {}

/// Assemble `source` into a flat byte image.
pub fn assemble(source: &str) -> Result<AssembledProgram, AssembleError> {
    let statements = parse_statements(source)?;
    let source_lines: Vec<&str> = source.lines().collect();

    let labels = pass_one(&statements)?;
    pass_two(&statements, &labels, &source_lines)
}

fn operand0_expr<'a>(
    stmt: &'a Statement,
    directive: &str,
) -> Result<&'a str, AssembleError> {
    stmt.operands
        .first()
        .and_then(|op| op.bare_expr())
        .ok_or_else(|| {
            AssembleError::InvalidOperands(
                directive.to_string(),
                "expected one expression".to_string(),
                stmt.line,
            )
        })
}

/// Pass 1: build the label/symbol table, tolerating forward references.
fn pass_one(statements: &[Statement]) -> Result<HashMap<String, i32>, AssembleError> {
    let mut labels: HashMap<String, i32> = HashMap::new();
    let mut addr: usize = 0;

    for stmt in statements {
        let stmt_addr = addr;
        let mnemonic = stmt.mnemonic.as_deref().map(|m| m.to_ascii_uppercase());

        let len = match mnemonic.as_deref() {
            None => 0,
            Some("EQU") => {
                let expr = operand0_expr(stmt, "EQU")?;
                let val = eval_expr(expr, &labels, true, stmt.line)?;
                if let Some(label) = &stmt.label {
                    labels.insert(label.to_ascii_uppercase(), val);
                }
                0
            }
            Some("ORG") => {
                let expr = operand0_expr(stmt, "ORG")?;
                let val = eval_expr(expr, &labels, true, stmt.line)?;
                addr = (val as i64).rem_euclid(IMAGE_SIZE as i64) as usize;
                0
            }
            Some("DB") => stmt.operands.len().max(1),
            Some("DW") => stmt.operands.len().max(1) * 2,
            Some("DS") => {
                let expr = operand0_expr(stmt, "DS")?;
                eval_expr(expr, &labels, true, stmt.line)?.max(0) as usize
            }
            Some(m) => encode(m, &stmt.operands, addr as u16, &labels, true, stmt.line)?.len(),
        };

        if mnemonic.as_deref() != Some("EQU") {
            if let Some(label) = &stmt.label {
                labels.insert(label.to_ascii_uppercase(), stmt_addr as i32);
            }
        }

        addr += len;
    }

    Ok(labels)
}

/// Pass 2: re-encode with the final label table and write the image.
fn pass_two(
    statements: &[Statement],
    labels: &HashMap<String, i32>,
    source_lines: &[&str],
) -> Result<AssembledProgram, AssembleError> {
    let mut image = vec![0u8; IMAGE_SIZE];
    let mut line_map = BTreeMap::new();
    let mut listing = String::new();
    let mut addr: usize = 0;
    let mut highwater: usize = 0;

    for stmt in statements {
        let stmt_addr = addr;
        let mnemonic = stmt.mnemonic.as_deref().map(|m| m.to_ascii_uppercase());
        let mut bytes: Vec<u8> = Vec::new();

        match mnemonic.as_deref() {
            None => {}
            Some("EQU") => {}
            Some("ORG") => {
                let expr = operand0_expr(stmt, "ORG")?;
                let val = eval_expr(expr, labels, false, stmt.line)?;
                addr = (val as i64).rem_euclid(IMAGE_SIZE as i64) as usize;
            }
            Some("DB") => {
                for op in &stmt.operands {
                    let expr = op.bare_expr().ok_or_else(|| {
                        AssembleError::InvalidOperands(
                            "DB".to_string(),
                            "expected a byte expression".to_string(),
                            stmt.line,
                        )
                    })?;
                    let val = eval_expr(expr, labels, false, stmt.line)?;
                    bytes.push(val as u8);
                }
            }
            Some("DW") => {
                for op in &stmt.operands {
                    let expr = op.bare_expr().ok_or_else(|| {
                        AssembleError::InvalidOperands(
                            "DW".to_string(),
                            "expected a word expression".to_string(),
                            stmt.line,
                        )
                    })?;
                    let val = eval_expr(expr, labels, false, stmt.line)? as u16;
                    bytes.push(val as u8);
                    bytes.push((val >> 8) as u8);
                }
            }
            Some("DS") => {
                let expr = operand0_expr(stmt, "DS")?;
                let n = eval_expr(expr, labels, false, stmt.line)?.max(0) as usize;
                bytes = vec![0u8; n];
            }
            Some(m) => {
                bytes = encode(m, &stmt.operands, addr as u16, labels, false, stmt.line)?;
            }
        }

        if !bytes.is_empty() {
            for (i, b) in bytes.iter().enumerate() {
                image[(addr + i) % IMAGE_SIZE] = *b;
            }
            addr += bytes.len();
            highwater = highwater.max(addr);
        }

        if stmt.mnemonic.is_some() {
            line_map.insert(stmt_addr as u16, stmt.line);
        }

        let source_text = source_lines
            .get((stmt.line as usize).saturating_sub(1))
            .map(|s| s.trim())
            .unwrap_or("");
        let byte_text = bytes
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(" ");
        listing.push_str(&format!(
            "{stmt_addr:04X} | {byte_text:<11} | {:>5} | {source_text}\n",
            stmt.line
        ));
    }

    image.truncate(highwater);

    Ok(AssembledProgram {
        image,
        line_map,
        labels: labels.clone(),
        listing,
    })
}
