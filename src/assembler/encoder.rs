//! Mnemonic + operands -> bytes
//!
//! Mirrors the CPU's `x/y/z/p/q` opcode decomposition in reverse: given a
//! mnemonic and its classified operands, compute the primary opcode (and
//! any CB/ED/DD/FD prefix, displacement, or immediate bytes) the same way
//! [`crate::cpu::execute`] would decode it back.
//!
//! Called twice per instruction: once in "tolerant" mode during Pass 1
//! (unresolved labels evaluate to 0 — their value never changes an
//! instruction's length) and once in "strict" mode during Pass 2 (every
//! label must resolve, and a JR/DJNZ range violation is an error).

use std::collections::HashMap;

use super::lexer::{eval_expr, Operand};
use super::AssembleError;

/// Encode one instruction. `addr` is the address the instruction starts
/// at (needed for JR/DJNZ relative offsets).
pub fn encode(
    mnemonic: &str,
    operands: &[Operand],
    addr: u16,
    labels: &HashMap<String, i32>,
    tolerant: bool,
    line: u32,
) -> Result<Vec<u8>, AssembleError> {
    let m = mnemonic.to_ascii_uppercase();
    let ops = operands;

    let eval = |text: &str| eval_expr(text, labels, tolerant, line);
    let invalid = || -> AssembleError {
        AssembleError::InvalidOperands(
            m.clone(),
            ops.iter().map(describe).collect::<Vec<_>>().join(", "),
            line,
        )
    };

    match m.as_str() {
        "NOP" => Ok(vec![0x00]),
        "HALT" => Ok(vec![0x76]),
        "DI" => Ok(vec![0xF3]),
        "EI" => Ok(vec![0xFB]),
        "EXX" => Ok(vec![0xD9]),
        "RLCA" => Ok(vec![0x07]),
        "RRCA" => Ok(vec![0x0F]),
        "RLA" => Ok(vec![0x17]),
        "RRA" => Ok(vec![0x1F]),
        "DAA" => Ok(vec![0x27]),
        "CPL" => Ok(vec![0x2F]),
        "SCF" => Ok(vec![0x37]),
        "CCF" => Ok(vec![0x3F]),

        "EX" => encode_ex(ops, invalid),

        "LD" => encode_ld(ops, addr, &eval, invalid, line),

        "ADD" | "ADC" | "SUB" | "SBC" | "AND" | "XOR" | "OR" | "CP" => {
            encode_alu(&m, ops, &eval, invalid)
        }

        "INC" | "DEC" => encode_inc_dec(&m, ops, &eval, invalid),

        "PUSH" => encode_push_pop(0xC5, ops, invalid),
        "POP" => encode_push_pop(0xC1, ops, invalid),

        "JP" => encode_jp(ops, &eval, invalid),
        "JR" => encode_jr(ops, addr, &eval, invalid, line),
        "DJNZ" => encode_djnz(ops, addr, &eval, invalid, line),
        "CALL" => encode_call(ops, &eval, invalid),
        "RET" => encode_ret(ops, invalid),
        "RST" => encode_rst(ops, &eval, invalid, line),

        "IN" => encode_in(ops, &eval, invalid),
        "OUT" => encode_out(ops, &eval, invalid),

        "RLC" | "RRC" | "RL" | "RR" | "SLA" | "SRA" | "SRL" => {
            encode_cb_rotate(&m, ops, &eval, invalid)
        }
        "BIT" | "SET" | "RES" => encode_cb_bit(&m, ops, &eval, invalid),

        "NEG" => Ok(vec![0xED, 0x44]),
        "RETN" => Ok(vec![0xED, 0x45]),
        "RETI" => Ok(vec![0xED, 0x4D]),
        "RRD" => Ok(vec![0xED, 0x67]),
        "RLD" => Ok(vec![0xED, 0x6F]),
        "IM" => encode_im(ops, &eval, invalid),

        "LDI" => Ok(vec![0xED, 0xA0]),
        "LDD" => Ok(vec![0xED, 0xA8]),
        "LDIR" => Ok(vec![0xED, 0xB0]),
        "LDDR" => Ok(vec![0xED, 0xB8]),
        "CPI" => Ok(vec![0xED, 0xA1]),
        "CPD" => Ok(vec![0xED, 0xA9]),
        "CPIR" => Ok(vec![0xED, 0xB1]),
        "CPDR" => Ok(vec![0xED, 0xB9]),
        "INI" => Ok(vec![0xED, 0xA2]),
        "IND" => Ok(vec![0xED, 0xAA]),
        "INIR" => Ok(vec![0xED, 0xB2]),
        "INDR" => Ok(vec![0xED, 0xBA]),
        "OUTI" => Ok(vec![0xED, 0xA3]),
        "OUTD" => Ok(vec![0xED, 0xAB]),
        "OTIR" => Ok(vec![0xED, 0xB3]),
        "OTDR" => Ok(vec![0xED, 0xBB]),

        _ => Err(invalid()),
    }
}

fn describe(op: &Operand) -> String {
    match op {
        Operand::Bare(s) => s.clone(),
        Operand::Indirect(s) => format!("({})", s),
        Operand::IndexedIx(d) => format!("(IX{})", d),
        Operand::IndexedIy(d) => format!("(IY{})", d),
    }
}

fn encode_ex(
    ops: &[Operand],
    invalid: impl Fn() -> AssembleError,
) -> Result<Vec<u8>, AssembleError> {
    if ops.len() != 2 {
        return Err(invalid());
    }
    let a = ops[0].bare_expr().map(|s| s.to_ascii_uppercase());
    match (a.as_deref(), &ops[1]) {
        (Some("AF"), b) if matches!(b, Operand::Bare(s) if s.eq_ignore_ascii_case("af'")) => {
            Ok(vec![0x08])
        }
        (Some("DE"), b)
            if b.bare_expr().map(|s| s.eq_ignore_ascii_case("hl")).unwrap_or(false) =>
        {
            Ok(vec![0xEB])
        }
        _ => {
            if ops[0].is_indirect_sp() {
                match ops[1].index_prefix() {
                    Some(prefix) => Ok(vec![prefix, 0xE3]),
                    None if ops[1].bare_expr().map(|s| s.eq_ignore_ascii_case("hl")).unwrap_or(false) => {
                        Ok(vec![0xE3])
                    }
                    _ => Err(invalid()),
                }
            } else {
                Err(invalid())
            }
        }
    }
}

fn encode_ld(
    ops: &[Operand],
    addr: u16,
    eval: &impl Fn(&str) -> Result<i32, AssembleError>,
    invalid: impl Fn() -> AssembleError,
    line: u32,
) -> Result<Vec<u8>, AssembleError> {
    let _ = addr;
    if ops.len() != 2 {
        return Err(invalid());
    }
    let (dst, src) = (&ops[0], &ops[1]);

    // LD SP,HL / LD SP,IX / LD SP,IY
    if dst.is_sp() && src.bare_expr().map(|s| s.eq_ignore_ascii_case("hl")).unwrap_or(false) {
        return Ok(vec![0xF9]);
    }
    if dst.is_sp() {
        if let Some(prefix) = src.index_prefix() {
            return Ok(vec![prefix, 0xF9]);
        }
    }

    // LD rp,nn (BC/DE/HL/SP/IX/IY)
    if let Some(p) = dst.as_reg16() {
        if let Some(expr) = src.bare_expr() {
            let nn = eval(expr)? as u16;
            let mut bytes = match dst.index_prefix() {
                Some(prefix) => vec![prefix],
                None => vec![],
            };
            bytes.push(0x01 + p * 16);
            bytes.extend_from_slice(&nn.to_le_bytes());
            return Ok(bytes);
        }
    }

    // LD (nn),rp / LD rp,(nn) — BC/DE/SP via ED, HL/IX/IY direct.
    if let Some(nn_expr) = dst.indirect_expr() {
        if let Some(p) = src.as_reg16() {
            let nn = eval(nn_expr)? as u16;
            let up = src.bare_expr().unwrap_or("").to_ascii_uppercase();
            return Ok(match (p, up.as_str()) {
                (2, "HL") => {
                    let mut b = vec![0x22];
                    b.extend_from_slice(&nn.to_le_bytes());
                    b
                }
                (2, "IX") | (2, "IY") => {
                    let prefix = src.index_prefix().unwrap();
                    let mut b = vec![prefix, 0x22];
                    b.extend_from_slice(&nn.to_le_bytes());
                    b
                }
                _ => {
                    let mut b = vec![0xED, 0x43 + p * 16];
                    b.extend_from_slice(&nn.to_le_bytes());
                    b
                }
            });
        }
        if src.is_a() {
            let nn = eval(nn_expr)? as u16;
            let mut b = vec![0x32];
            b.extend_from_slice(&nn.to_le_bytes());
            return Ok(b);
        }
    }
    if let Some(nn_expr) = src.indirect_expr() {
        if let Some(p) = dst.as_reg16() {
            let nn = eval(nn_expr)? as u16;
            let up = dst.bare_expr().unwrap_or("").to_ascii_uppercase();
            return Ok(match (p, up.as_str()) {
                (2, "HL") => {
                    let mut b = vec![0x2A];
                    b.extend_from_slice(&nn.to_le_bytes());
                    b
                }
                (2, "IX") | (2, "IY") => {
                    let prefix = dst.index_prefix().unwrap();
                    let mut b = vec![prefix, 0x2A];
                    b.extend_from_slice(&nn.to_le_bytes());
                    b
                }
                _ => {
                    let mut b = vec![0xED, 0x4B + p * 16];
                    b.extend_from_slice(&nn.to_le_bytes());
                    b
                }
            });
        }
        if dst.is_a() {
            let nn = eval(nn_expr)? as u16;
            let mut b = vec![0x3A];
            b.extend_from_slice(&nn.to_le_bytes());
            return Ok(b);
        }
    }

    // LD (BC),A / LD (DE),A / LD A,(BC) / LD A,(DE)
    if dst.is_indirect_bc() && src.is_a() {
        return Ok(vec![0x02]);
    }
    if dst.is_indirect_de() && src.is_a() {
        return Ok(vec![0x12]);
    }
    if src.is_indirect_bc() && dst.is_a() {
        return Ok(vec![0x0A]);
    }
    if src.is_indirect_de() && dst.is_a() {
        return Ok(vec![0x1A]);
    }

    // LD I,A / LD R,A / LD A,I / LD A,R
    if dst.bare_expr().map(|s| s.eq_ignore_ascii_case("i")).unwrap_or(false) && src.is_a() {
        return Ok(vec![0xED, 0x47]);
    }
    if dst.bare_expr().map(|s| s.eq_ignore_ascii_case("r")).unwrap_or(false) && src.is_a() {
        return Ok(vec![0xED, 0x4F]);
    }
    if src.bare_expr().map(|s| s.eq_ignore_ascii_case("i")).unwrap_or(false) && dst.is_a() {
        return Ok(vec![0xED, 0x57]);
    }
    if src.bare_expr().map(|s| s.eq_ignore_ascii_case("r")).unwrap_or(false) && dst.is_a() {
        return Ok(vec![0xED, 0x5F]);
    }

    // LD r,n (8-bit immediate), LD r,r', LD r,(HL)/(IX+d)/(IY+d)
    encode_ld_8bit(dst, src, eval, invalid, line)
}

/// Resolve an 8-bit register-or-memory operand to its opcode-field index,
/// plus the index prefix and displacement byte when it's `(IX+d)`/`(IY+d)`.
/// Callers must place the displacement *after* the opcode byte
/// (`[prefix, opcode, disp]`), matching the CPU's fetch order.
fn resolve8(
    op: &Operand,
    eval: &impl Fn(&str) -> Result<i32, AssembleError>,
) -> Result<(u8, Option<(u8, u8)>), AssembleError> {
    if let Some((ix, d)) = op.indexed_expr() {
        let prefix = if ix == "IX" { 0xDD } else { 0xFD };
        let disp = eval(d)? as u8;
        Ok((6, Some((prefix, disp))))
    } else if let Some(idx) = op.as_reg8() {
        Ok((idx, None))
    } else {
        Err(AssembleError::InvalidOperands(
            "LD".to_string(),
            describe(op),
            0,
        ))
    }
}

fn encode_ld_8bit(
    dst: &Operand,
    src: &Operand,
    eval: &impl Fn(&str) -> Result<i32, AssembleError>,
    invalid: impl Fn() -> AssembleError,
    line: u32,
) -> Result<Vec<u8>, AssembleError> {
    let dst_indexed = dst.indexed_expr().is_some();
    let src_indexed = src.indexed_expr().is_some();

    if dst_indexed && src_indexed {
        return Err(AssembleError::InvalidOperands(
            "LD".to_string(),
            format!("{}, {}", describe(dst), describe(src)),
            line,
        ));
    }

    // Immediate source (LD r,n / LD (HL),n / LD (IX+d),n): a bare operand
    // that isn't itself a register name.
    if src.as_reg8().is_none() && src.as_condition().is_none() {
        if let Some(n_text) = src.bare_expr() {
            let n = eval(n_text)? as u8;
            if dst_indexed {
                let (ix, d) = dst.indexed_expr().unwrap();
                let prefix = if ix == "IX" { 0xDD } else { 0xFD };
                let disp = eval(d)? as u8;
                return Ok(vec![prefix, 0x36, disp, n]);
            }
            let y = dst.as_reg8().ok_or_else(&invalid)?;
            return Ok(vec![0x06 + y * 8, n]);
        }
    }

    // Register/memory-to-register/memory forms.
    let (y, dst_extra) = resolve8(dst, eval).map_err(|_| invalid())?;
    let (z, src_extra) = resolve8(src, eval).map_err(|_| invalid())?;

    if let Some((prefix, disp)) = dst_extra {
        return Ok(vec![prefix, 0x40 + 6 * 8 + z, disp]);
    }
    if let Some((prefix, disp)) = src_extra {
        return Ok(vec![prefix, 0x40 + y * 8 + 6, disp]);
    }

    Ok(vec![0x40 + y * 8 + z])
}

fn encode_alu(
    m: &str,
    ops: &[Operand],
    eval: &impl Fn(&str) -> Result<i32, AssembleError>,
    invalid: impl Fn() -> AssembleError,
) -> Result<Vec<u8>, AssembleError> {
    let y = match m {
        "ADD" => 0,
        "ADC" => 1,
        "SUB" => 2,
        "SBC" => 3,
        "AND" => 4,
        "XOR" => 5,
        "OR" => 6,
        "CP" => 7,
        _ => unreachable!(),
    };

    // 16-bit forms: ADD HL,rp / ADD IX,rp / ADD IY,rp / ADC HL,rp / SBC HL,rp
    if ops.len() == 2 {
        if let Some(dst16) = ops[0].as_reg16() {
            if dst16 == 2 && (ops[1].as_reg16().is_some()) {
                let dst_prefix = ops[0].index_prefix();
                let src_up = ops[1].bare_expr().unwrap_or("").to_ascii_uppercase();
                let p = match (dst_prefix, src_up.as_str()) {
                    (None, "BC") => 0,
                    (None, "DE") => 1,
                    (None, "HL") => 2,
                    (None, "SP") => 3,
                    (Some(pfx), "BC") => return alu16(m, y, pfx, 0),
                    (Some(pfx), "DE") => return alu16(m, y, pfx, 1),
                    (Some(pfx), "IX") if pfx == 0xDD => return alu16(m, y, pfx, 2),
                    (Some(pfx), "IY") if pfx == 0xFD => return alu16(m, y, pfx, 2),
                    (Some(pfx), "SP") => return alu16(m, y, pfx, 3),
                    _ => return Err(invalid()),
                };
                return alu16(m, y, 0, p);
            }
        }
    }

    // 8-bit: ALU A,r / A,n / A,(HL) / A,(IX+d)
    let (val_op, explicit_a) = if ops.len() == 2 {
        if !ops[0].is_a() {
            return Err(invalid());
        }
        (&ops[1], true)
    } else if ops.len() == 1 {
        (&ops[0], false)
    } else {
        return Err(invalid());
    };
    let _ = explicit_a;

    if let Some(n_text) = val_op.bare_expr() {
        if val_op.as_reg8().is_none() {
            let n = eval(n_text)? as u8;
            return Ok(vec![0xC6 + y * 8, n]);
        }
    }
    let (z, extra) = resolve8(val_op, eval).map_err(|_| invalid())?;
    if let Some((prefix, disp)) = extra {
        return Ok(vec![prefix, 0x80 + y * 8 + 6, disp]);
    }
    Ok(vec![0x80 + y * 8 + z])
}

fn alu16(m: &str, y: u8, prefix: u8, p: u8) -> Result<Vec<u8>, AssembleError> {
    let opcode = match (m, y) {
        ("ADD", _) => 0x09 + p * 16,
        ("ADC", _) => return with_prefix(vec![0xED, 0x4A + p * 16], prefix),
        ("SBC", _) => return with_prefix(vec![0xED, 0x42 + p * 16], prefix),
        _ => {
            return Err(AssembleError::InvalidOperands(
                m.to_string(),
                "HL,ss".to_string(),
                0,
            ))
        }
    };
    with_prefix(vec![opcode], prefix)
}

fn with_prefix(bytes: Vec<u8>, prefix: u8) -> Result<Vec<u8>, AssembleError> {
    if prefix == 0 {
        Ok(bytes)
    } else {
        let mut out = vec![prefix];
        out.extend(bytes);
        Ok(out)
    }
}

fn encode_inc_dec(
    m: &str,
    ops: &[Operand],
    eval: &impl Fn(&str) -> Result<i32, AssembleError>,
    invalid: impl Fn() -> AssembleError,
) -> Result<Vec<u8>, AssembleError> {
    if ops.len() != 1 {
        return Err(invalid());
    }
    let op = &ops[0];
    let base16 = if m == "INC" { 0x03 } else { 0x0B };
    if let Some(p) = op.as_reg16() {
        if let Some(prefix) = op.index_prefix() {
            return Ok(vec![prefix, base16 + p * 16]);
        }
        return Ok(vec![base16 + p * 16]);
    }
    let (idx, extra) = resolve8(op, eval).map_err(|_| invalid())?;
    let base8 = if m == "INC" { 0x04 } else { 0x05 };
    let opcode = base8 + idx * 8;
    match extra {
        Some((prefix, disp)) => Ok(vec![prefix, opcode, disp]),
        None => Ok(vec![opcode]),
    }
}

fn encode_push_pop(
    base: u8,
    ops: &[Operand],
    invalid: impl Fn() -> AssembleError,
) -> Result<Vec<u8>, AssembleError> {
    if ops.len() != 1 {
        return Err(invalid());
    }
    let op = &ops[0];
    let p = op.as_reg16_2().ok_or_else(&invalid)?;
    match op.index_prefix() {
        Some(prefix) => Ok(vec![prefix, base]),
        None => Ok(vec![base + p * 16]),
    }
}

fn split_cc_and_target(ops: &[Operand]) -> (Option<u8>, Option<&Operand>) {
    match ops.len() {
        1 => (None, Some(&ops[0])),
        2 => (ops[0].as_condition(), Some(&ops[1])),
        _ => (None, None),
    }
}

fn encode_jp(
    ops: &[Operand],
    eval: &impl Fn(&str) -> Result<i32, AssembleError>,
    invalid: impl Fn() -> AssembleError,
) -> Result<Vec<u8>, AssembleError> {
    if ops.len() == 1 {
        if let Some(inner) = ops[0].indirect_expr() {
            if inner.eq_ignore_ascii_case("hl") {
                return Ok(vec![0xE9]);
            }
        }
        if let Some(prefix) = ops[0].index_prefix() {
            return Ok(vec![prefix, 0xE9]);
        }
        let nn = eval(ops[0].bare_expr().ok_or_else(&invalid)?)? as u16;
        let mut b = vec![0xC3];
        b.extend_from_slice(&nn.to_le_bytes());
        return Ok(b);
    }
    if ops.len() == 2 {
        let cc = ops[0].as_condition().ok_or_else(&invalid)?;
        let nn = eval(ops[1].bare_expr().ok_or_else(&invalid)?)? as u16;
        let mut b = vec![0xC2 + cc * 8];
        b.extend_from_slice(&nn.to_le_bytes());
        return Ok(b);
    }
    Err(invalid())
}

fn jr_offset(addr: u16, target: i32, len: u16, line: u32) -> Result<u8, AssembleError> {
    let offset = target - (addr as i32 + len as i32);
    if !(-128..=127).contains(&offset) {
        return Err(AssembleError::OutOfRangeRelative(offset, line));
    }
    Ok(offset as i8 as u8)
}

fn encode_jr(
    ops: &[Operand],
    addr: u16,
    eval: &impl Fn(&str) -> Result<i32, AssembleError>,
    invalid: impl Fn() -> AssembleError,
    line: u32,
) -> Result<Vec<u8>, AssembleError> {
    let (cc, target_op) = split_cc_and_target(ops);
    let target_op = target_op.ok_or_else(&invalid)?;
    let target = eval(target_op.bare_expr().ok_or_else(&invalid)?)?;
    match cc {
        None => {
            let d = jr_offset(addr, target, 2, line)?;
            Ok(vec![0x18, d])
        }
        Some(cc) if cc <= 3 => {
            let d = jr_offset(addr, target, 2, line)?;
            Ok(vec![0x20 + cc * 8, d])
        }
        Some(_) => Err(invalid()),
    }
}

fn encode_djnz(
    ops: &[Operand],
    addr: u16,
    eval: &impl Fn(&str) -> Result<i32, AssembleError>,
    invalid: impl Fn() -> AssembleError,
    line: u32,
) -> Result<Vec<u8>, AssembleError> {
    if ops.len() != 1 {
        return Err(invalid());
    }
    let target = eval(ops[0].bare_expr().ok_or_else(&invalid)?)?;
    let d = jr_offset(addr, target, 2, line)?;
    Ok(vec![0x10, d])
}

fn encode_call(
    ops: &[Operand],
    eval: &impl Fn(&str) -> Result<i32, AssembleError>,
    invalid: impl Fn() -> AssembleError,
) -> Result<Vec<u8>, AssembleError> {
    let (cc, target_op) = split_cc_and_target(ops);
    let target_op = target_op.ok_or_else(&invalid)?;
    let nn = eval(target_op.bare_expr().ok_or_else(&invalid)?)? as u16;
    let mut b = match cc {
        None => vec![0xCD],
        Some(cc) => vec![0xC4 + cc * 8],
    };
    b.extend_from_slice(&nn.to_le_bytes());
    Ok(b)
}

fn encode_ret(ops: &[Operand], invalid: impl Fn() -> AssembleError) -> Result<Vec<u8>, AssembleError> {
    match ops.len() {
        0 => Ok(vec![0xC9]),
        1 => {
            let cc = ops[0].as_condition().ok_or_else(&invalid)?;
            Ok(vec![0xC0 + cc * 8])
        }
        _ => Err(invalid()),
    }
}

fn encode_rst(
    ops: &[Operand],
    eval: &impl Fn(&str) -> Result<i32, AssembleError>,
    invalid: impl Fn() -> AssembleError,
    line: u32,
) -> Result<Vec<u8>, AssembleError> {
    if ops.len() != 1 {
        return Err(invalid());
    }
    let t = eval(ops[0].bare_expr().ok_or_else(&invalid)?)?;
    let valid = [0x00, 0x08, 0x10, 0x18, 0x20, 0x28, 0x30, 0x38];
    if !valid.contains(&t) {
        return Err(AssembleError::InvalidOperands(
            "RST".to_string(),
            format!("{:#04x}", t),
            line,
        ));
    }
    Ok(vec![0xC7 + (t as u8 / 8) * 8])
}

fn encode_in(
    ops: &[Operand],
    eval: &impl Fn(&str) -> Result<i32, AssembleError>,
    invalid: impl Fn() -> AssembleError,
) -> Result<Vec<u8>, AssembleError> {
    if ops.len() != 2 {
        return Err(invalid());
    }
    let (dst, src) = (&ops[0], &ops[1]);
    if src.is_indirect_c() {
        let idx = dst.as_reg8().ok_or_else(&invalid)?;
        return Ok(vec![0xED, 0x40 + idx * 8]);
    }
    if dst.is_a() {
        if let Some(n_text) = src.indirect_expr() {
            let n = eval(n_text)? as u8;
            return Ok(vec![0xDB, n]);
        }
    }
    Err(invalid())
}

fn encode_out(
    ops: &[Operand],
    eval: &impl Fn(&str) -> Result<i32, AssembleError>,
    invalid: impl Fn() -> AssembleError,
) -> Result<Vec<u8>, AssembleError> {
    if ops.len() != 2 {
        return Err(invalid());
    }
    let (dst, src) = (&ops[0], &ops[1]);
    if dst.is_indirect_c() {
        let idx = src.as_reg8().ok_or_else(&invalid)?;
        return Ok(vec![0xED, 0x41 + idx * 8]);
    }
    if let Some(n_text) = dst.indirect_expr() {
        if src.is_a() {
            let n = eval(n_text)? as u8;
            return Ok(vec![0xD3, n]);
        }
    }
    Err(invalid())
}

fn encode_cb_rotate(
    m: &str,
    ops: &[Operand],
    eval: &impl Fn(&str) -> Result<i32, AssembleError>,
    invalid: impl Fn() -> AssembleError,
) -> Result<Vec<u8>, AssembleError> {
    if ops.len() != 1 {
        return Err(invalid());
    }
    let y = match m {
        "RLC" => 0,
        "RRC" => 1,
        "RL" => 2,
        "RR" => 3,
        "SLA" => 4,
        "SRA" => 5,
        "SRL" => 7,
        _ => unreachable!(),
    };
    encode_cb_explicit(0, y, &ops[0], eval, invalid)
}

fn encode_cb_bit(
    m: &str,
    ops: &[Operand],
    eval: &impl Fn(&str) -> Result<i32, AssembleError>,
    invalid: impl Fn() -> AssembleError,
) -> Result<Vec<u8>, AssembleError> {
    if ops.len() != 2 {
        return Err(invalid());
    }
    let bit = eval(ops[0].bare_expr().ok_or_else(&invalid)?)? as u8;
    if bit > 7 {
        return Err(invalid());
    }
    let x = match m {
        "BIT" => 1,
        "RES" => 2,
        "SET" => 3,
        _ => unreachable!(),
    };
    encode_cb_explicit(x, bit, &ops[1], eval, invalid)
}

/// Build the CB/CB-indexed byte sequence. `x` selects rotate(0)/BIT(1)/
/// RES(2)/SET(3); `y_field` is the rotate-op selector or the bit number.
/// For `(IX+d)`/`(IY+d)` the displacement precedes the sub-opcode byte,
/// matching `step`'s DDCB/FDCB byte ordering: prefix, 0xCB, displacement,
/// sub-opcode.
fn encode_cb_explicit(
    x: u8,
    y_field: u8,
    op: &Operand,
    eval: &impl Fn(&str) -> Result<i32, AssembleError>,
    invalid: impl Fn() -> AssembleError,
) -> Result<Vec<u8>, AssembleError> {
    if let Some((ix, d)) = op.indexed_expr() {
        let prefix = if ix == "IX" { 0xDD } else { 0xFD };
        let disp = eval(d)? as u8;
        let sub_opcode = (x << 6) | (y_field << 3) | 6;
        return Ok(vec![prefix, 0xCB, disp, sub_opcode]);
    }
    let z = op.as_reg8().ok_or_else(&invalid)?;
    Ok(vec![0xCB, (x << 6) | (y_field << 3) | z])
}

fn encode_im(
    ops: &[Operand],
    eval: &impl Fn(&str) -> Result<i32, AssembleError>,
    invalid: impl Fn() -> AssembleError,
) -> Result<Vec<u8>, AssembleError> {
    if ops.len() != 1 {
        return Err(invalid());
    }
    let n = eval(ops[0].bare_expr().ok_or_else(&invalid)?)?;
    match n {
        0 => Ok(vec![0xED, 0x46]),
        1 => Ok(vec![0xED, 0x56]),
        2 => Ok(vec![0xED, 0x5E]),
        _ => Err(invalid()),
    }
}
