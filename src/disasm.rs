//! A disassembler for plain Z80 machine code.
//!
//! Decodes one instruction — including the CB/ED/DD/FD prefix families
//! and `(IX+d)`/`(IY+d)` displacement text — into a mnemonic string and
//! its length in bytes. Grounded on the same `x/y/z/p/q` opcode
//! decomposition [`crate::cpu::execute`] and [`crate::assembler::encoder`]
//! use, just run in reverse and free of side effects.
//!
//! This is a read-only diagnostic tool, not the CPU: an opcode byte this
//! function doesn't recognize disassembles to a `DB 0xNN` fallback rather
//! than erroring, the same forward-compatibility stance the CPU takes
//! toward unknown CB/ED sub-opcodes.

const R8: [&str; 8] = ["B", "C", "D", "E", "H", "L", "(HL)", "A"];
const RP: [&str; 4] = ["BC", "DE", "HL", "SP"];
const RP2: [&str; 4] = ["BC", "DE", "HL", "AF"];
const CC: [&str; 8] = ["NZ", "Z", "NC", "C", "PO", "PE", "P", "M"];
const ALU: [&str; 8] = ["ADD A,", "ADC A,", "SUB ", "SBC A,", "AND ", "XOR ", "OR ", "CP "];
const ROT: [&str; 8] = ["RLC", "RRC", "RL", "RR", "SLA", "SRA", "SLL", "SRL"];

/// Decode the instruction starting at `bytes[0]`. Returns its mnemonic
/// text and length; `bytes` must have at least one element.
pub fn disassemble(bytes: &[u8]) -> (String, usize) {
    if bytes.is_empty() {
        return (String::new(), 0);
    }

    match bytes[0] {
        0xCB => disassemble_cb(bytes, 1, None),
        0xED => disassemble_ed(bytes),
        0xDD => disassemble_indexed(bytes, "IX"),
        0xFD => disassemble_indexed(bytes, "IY"),
        _ => disassemble_main(bytes, 0, None),
    }
}

fn db(byte: u8) -> (String, usize) {
    (format!("DB {byte:#04X}"), 1)
}

fn signed(d: u8) -> i8 {
    d as i8
}

/// `r[idx]`'s display text. For idx 4/5/6 under an index prefix this is
/// IXH/IXL/IYH/IYL or `(IX+d)`/`(IY+d)`; the displacement byte for the
/// memory form is read from `bytes[pos]`, advancing `pos`.
fn reg8_text(idx: u8, prefix: Option<&str>, bytes: &[u8], pos: &mut usize) -> String {
    match (idx, prefix) {
        (6, Some(which)) => {
            let d = bytes.get(*pos).copied().unwrap_or(0);
            *pos += 1;
            format!("({which}{:+})", signed(d))
        }
        (4, Some(which)) => format!("{which}H"),
        (5, Some(which)) => format!("{which}L"),
        _ => R8[idx as usize].to_string(),
    }
}

fn rp_text(p: u8, prefix: Option<&str>) -> String {
    if p == 2 {
        prefix.unwrap_or("HL").to_string()
    } else {
        RP[p as usize].to_string()
    }
}

fn word_at(bytes: &[u8], pos: usize) -> u16 {
    let lo = bytes.get(pos).copied().unwrap_or(0) as u16;
    let hi = bytes.get(pos + 1).copied().unwrap_or(0) as u16;
    lo | (hi << 8)
}

/// Decode the primary opcode table starting at `bytes[start]`, with `H`,
/// `L`, and `(HL)` substituted for the given index prefix (if any).
fn disassemble_main(bytes: &[u8], start: usize, prefix: Option<&str>) -> (String, usize) {
    let opcode = match bytes.get(start) {
        Some(&b) => b,
        None => return db(0),
    };
    let mut pos = start + 1;

    let x = opcode >> 6;
    let y = (opcode >> 3) & 0x07;
    let z = opcode & 0x07;
    let p = y >> 1;
    let q = y & 0x01;

    let text = match x {
        0 => match z {
            0 => match y {
                0 => "NOP".to_string(),
                1 => "EX AF,AF'".to_string(),
                2 => {
                    let d = bytes.get(pos).copied().unwrap_or(0);
                    pos += 1;
                    format!("DJNZ {:+}", signed(d))
                }
                3 => {
                    let d = bytes.get(pos).copied().unwrap_or(0);
                    pos += 1;
                    format!("JR {:+}", signed(d))
                }
                _ => {
                    let d = bytes.get(pos).copied().unwrap_or(0);
                    pos += 1;
                    format!("JR {},{:+}", CC[(y - 4) as usize], signed(d))
                }
            },
            1 => {
                if q == 0 {
                    let nn = word_at(bytes, pos);
                    pos += 2;
                    format!("LD {},{:#06X}", rp_text(p, prefix), nn)
                } else {
                    format!("ADD {},{}", rp_text(2, prefix), rp_text(p, prefix))
                }
            }
            2 => match (p, q) {
                (0, 0) => "LD (BC),A".to_string(),
                (1, 0) => "LD (DE),A".to_string(),
                (2, 0) => {
                    let nn = word_at(bytes, pos);
                    pos += 2;
                    format!("LD ({nn:#06X}),{}", rp_text(2, prefix))
                }
                (3, 0) => {
                    let nn = word_at(bytes, pos);
                    pos += 2;
                    format!("LD ({nn:#06X}),A")
                }
                (0, 1) => "LD A,(BC)".to_string(),
                (1, 1) => "LD A,(DE)".to_string(),
                (2, 1) => {
                    let nn = word_at(bytes, pos);
                    pos += 2;
                    format!("LD {},({nn:#06X})", rp_text(2, prefix))
                }
                _ => {
                    let nn = word_at(bytes, pos);
                    pos += 2;
                    format!("LD A,({nn:#06X})")
                }
            },
            3 => {
                if q == 0 {
                    format!("INC {}", rp_text(p, prefix))
                } else {
                    format!("DEC {}", rp_text(p, prefix))
                }
            }
            4 => format!("INC {}", reg8_text(y, prefix, bytes, &mut pos)),
            5 => format!("DEC {}", reg8_text(y, prefix, bytes, &mut pos)),
            6 => {
                let dst = reg8_text(y, prefix, bytes, &mut pos);
                let n = bytes.get(pos).copied().unwrap_or(0);
                pos += 1;
                format!("LD {dst},{n:#04X}")
            }
            _ => match y {
                0 => "RLCA".to_string(),
                1 => "RRCA".to_string(),
                2 => "RLA".to_string(),
                3 => "RRA".to_string(),
                4 => "DAA".to_string(),
                5 => "CPL".to_string(),
                6 => "SCF".to_string(),
                _ => "CCF".to_string(),
            },
        },
        1 => {
            if y == 6 && z == 6 {
                "HALT".to_string()
            } else {
                let src = reg8_text(z, prefix, bytes, &mut pos);
                let dst = reg8_text(y, prefix, bytes, &mut pos);
                format!("LD {dst},{src}")
            }
        }
        2 => {
            let operand = reg8_text(z, prefix, bytes, &mut pos);
            format!("{}{}", ALU[y as usize], operand)
        }
        _ => match z {
            0 => format!("RET {}", CC[y as usize]),
            1 => match (p, q) {
                (_, 0) => format!("POP {}", RP2[p as usize]),
                (0, 1) => "RET".to_string(),
                (1, 1) => "EXX".to_string(),
                (2, 1) => format!("JP ({})", prefix.unwrap_or("HL")),
                _ => format!("LD SP,{}", prefix.unwrap_or("HL")),
            },
            2 => {
                let nn = word_at(bytes, pos);
                pos += 2;
                format!("JP {},{nn:#06X}", CC[y as usize])
            }
            3 => match y {
                0 => {
                    let nn = word_at(bytes, pos);
                    pos += 2;
                    format!("JP {nn:#06X}")
                }
                1 => return disassemble_cb(bytes, pos, prefix),
                2 => {
                    let n = bytes.get(pos).copied().unwrap_or(0);
                    pos += 1;
                    format!("OUT ({n:#04X}),A")
                }
                3 => {
                    let n = bytes.get(pos).copied().unwrap_or(0);
                    pos += 1;
                    format!("IN A,({n:#04X})")
                }
                4 => format!("EX (SP),{}", prefix.unwrap_or("HL")),
                5 => "EX DE,HL".to_string(),
                6 => "DI".to_string(),
                _ => "EI".to_string(),
            },
            4 => {
                let nn = word_at(bytes, pos);
                pos += 2;
                format!("CALL {},{nn:#06X}", CC[y as usize])
            }
            5 => {
                if q == 0 {
                    format!("PUSH {}", RP2[p as usize])
                } else if p == 0 {
                    let nn = word_at(bytes, pos);
                    pos += 2;
                    format!("CALL {nn:#06X}")
                } else {
                    return db(opcode);
                }
            }
            6 => {
                let n = bytes.get(pos).copied().unwrap_or(0);
                pos += 1;
                format!("{}{n:#04X}", ALU[y as usize])
            }
            _ => format!("RST {:#04X}", y * 8),
        },
    };

    (text, pos)
}

fn disassemble_cb(bytes: &[u8], start: usize, prefix: Option<&str>) -> (String, usize) {
    let opcode = match bytes.get(start) {
        Some(&b) => b,
        None => return db(0xCB),
    };
    let mut pos = start + 1;

    let x = opcode >> 6;
    let y = (opcode >> 3) & 0x07;
    let z = opcode & 0x07;

    let operand = if let Some(which) = prefix {
        // The displacement precedes the sub-opcode for DDCB/FDCB, so by
        // the time we're decoding `opcode` it has already been consumed
        // by `disassemble_indexed`; `start` points past it.
        let _ = which;
        format!("({}{:+})", prefix.unwrap(), signed(bytes.get(start - 1).copied().unwrap_or(0)))
    } else {
        R8[z as usize].to_string()
    };

    let text = match x {
        0 => format!("{} {}", ROT[y as usize], operand),
        1 => format!("BIT {y},{}", operand),
        2 => format!("RES {y},{}", operand),
        _ => format!("SET {y},{}", operand),
    };

    (text, pos)
}

fn disassemble_indexed(bytes: &[u8], which: &'static str) -> (String, usize) {
    match bytes.get(1) {
        Some(&0xCB) => disassemble_cb(bytes, 3, Some(which)),
        Some(_) => disassemble_main(bytes, 1, Some(which)),
        None => db(bytes[0]),
    }
}

fn disassemble_ed(bytes: &[u8]) -> (String, usize) {
    let opcode = match bytes.get(1) {
        Some(&b) => b,
        None => return db(0xED),
    };
    let mut pos = 2usize;

    let x = opcode >> 6;
    let y = (opcode >> 3) & 0x07;
    let z = opcode & 0x07;
    let p = y >> 1;
    let q = y & 0x01;

    let text = if x == 1 {
        match z {
            0 => {
                if y == 6 {
                    "IN (C)".to_string()
                } else {
                    format!("IN {},(C)", R8[y as usize])
                }
            }
            1 => {
                if y == 6 {
                    "OUT (C),0".to_string()
                } else {
                    format!("OUT (C),{}", R8[y as usize])
                }
            }
            2 => {
                if q == 0 {
                    format!("SBC HL,{}", RP[p as usize])
                } else {
                    format!("ADC HL,{}", RP[p as usize])
                }
            }
            3 => {
                let nn = word_at(bytes, pos);
                pos += 2;
                if q == 0 {
                    format!("LD ({nn:#06X}),{}", RP[p as usize])
                } else {
                    format!("LD {},({nn:#06X})", RP[p as usize])
                }
            }
            4 => "NEG".to_string(),
            5 => {
                if y == 1 {
                    "RETI".to_string()
                } else {
                    "RETN".to_string()
                }
            }
            6 => match y {
                0 | 1 | 4 | 5 => "IM 0".to_string(),
                2 | 6 => "IM 1".to_string(),
                _ => "IM 2".to_string(),
            },
            _ => match y {
                0 => "LD I,A".to_string(),
                1 => "LD R,A".to_string(),
                2 => "LD A,I".to_string(),
                3 => "LD A,R".to_string(),
                4 => "RRD".to_string(),
                5 => "RLD".to_string(),
                _ => "NOP".to_string(),
            },
        }
    } else if x == 2 && (0..=3).contains(&z) && (4..=7).contains(&y) {
        match opcode {
            0xA0 => "LDI".to_string(),
            0xA1 => "CPI".to_string(),
            0xA2 => "INI".to_string(),
            0xA3 => "OUTI".to_string(),
            0xA8 => "LDD".to_string(),
            0xA9 => "CPD".to_string(),
            0xAA => "IND".to_string(),
            0xAB => "OUTD".to_string(),
            0xB0 => "LDIR".to_string(),
            0xB1 => "CPIR".to_string(),
            0xB2 => "INIR".to_string(),
            0xB3 => "OTIR".to_string(),
            0xB8 => "LDDR".to_string(),
            0xB9 => "CPDR".to_string(),
            0xBA => "INDR".to_string(),
            0xBB => "OTDR".to_string(),
            _ => "NOP".to_string(),
        }
    } else {
        "NOP".to_string()
    };

    (text, pos)
}

/// Disassemble a whole image starting at `base`, returning `(address, text)`
/// pairs in order. Unlike [`disassemble`], which shows `JR`/`DJNZ` targets as
/// the raw relative displacement encoded in the byte stream, this walks the
/// image with address tracking and rewrites those targets as absolute
/// addresses — the form the assembler's `JR`/`DJNZ` mnemonics actually
/// accept. That makes the output of this function, unlike single-instruction
/// [`disassemble`], suitable for feeding back through [`crate::assembler::assemble`]
/// and reproducing the same byte image.
pub fn disassemble_program(bytes: &[u8], base: u16) -> Vec<(u16, String)> {
    let mut out = Vec::new();
    let mut pos = 0usize;
    while pos < bytes.len() {
        let addr = base.wrapping_add(pos as u16);
        let slice = &bytes[pos..];
        let (text, len) = match slice[0] {
            0x10 => relative_branch_text("DJNZ", None, addr, slice),
            0x18 => relative_branch_text("JR", None, addr, slice),
            op @ (0x20 | 0x28 | 0x30 | 0x38) => {
                let y = (op >> 3) & 0x07;
                relative_branch_text("JR", Some(CC[(y - 4) as usize]), addr, slice)
            }
            _ => disassemble(slice),
        };
        out.push((addr, text));
        pos += len.max(1);
    }
    out
}

/// Render `DJNZ e` / `JR e` / `JR cc,e` with `e` resolved to the absolute
/// target address `addr + 2 + e` instead of the raw signed displacement.
fn relative_branch_text(mnemonic: &str, cc: Option<&str>, addr: u16, slice: &[u8]) -> (String, usize) {
    let d = slice.get(1).copied().unwrap_or(0);
    let target = addr.wrapping_add(2).wrapping_add(signed(d) as i16 as u16);
    let text = match cc {
        Some(cc) => format!("{mnemonic} {cc},{target:#06X}"),
        None => format!("{mnemonic} {target:#06X}"),
    };
    (text, 2)
}
