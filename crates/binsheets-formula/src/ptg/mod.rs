//! BIFF8 formula tokens (Ptgs)
//!
//! A BIFF8 formula is stored as a reverse-Polish token stream (`rgce`)
//! followed by an optional block of extra data (`rgcb`) that carries the
//! values of array constants and the area lists of memory tokens.
//!
//! ```text
//! Formula: =A1+B1*2
//! Tokens:  [Ref(A1), Ref(B1), Int(2), Mul, Add]
//! ```

mod compile;
mod function_table;
mod render;

pub use compile::{compile, FormulaParsingWorkbook};
pub use function_table::{function_by_index, function_by_name, FunctionMetadata, FUNCTION_ADDIN};
pub use render::{render, to_expr, FormulaRenderingWorkbook};

use crate::error::{FormulaError, FormulaResult};
use binsheets_core::CellError;

/// Class of value an operand token produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandClass {
    Reference,
    Value,
    Array,
}

impl OperandClass {
    fn bits(self) -> u8 {
        match self {
            OperandClass::Reference => 0x20,
            OperandClass::Value => 0x40,
            OperandClass::Array => 0x60,
        }
    }

    fn from_id(id: u8) -> Self {
        match id & 0x60 {
            0x20 => OperandClass::Reference,
            0x40 => OperandClass::Value,
            _ => OperandClass::Array,
        }
    }
}

/// A row/column pair as stored in reference tokens
///
/// For `RefN` and `AreaN` tokens the relative parts are offsets from the
/// cell the formula is used in: the row as a signed 16-bit value and the
/// column as a signed 8-bit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefAddress {
    pub row: u16,
    pub col: u16,
    pub row_relative: bool,
    pub col_relative: bool,
}

impl RefAddress {
    pub fn new(row: u16, col: u16, row_relative: bool, col_relative: bool) -> Self {
        Self {
            row,
            col,
            row_relative,
            col_relative,
        }
    }

    fn from_fields(row: u16, col_field: u16) -> Self {
        Self {
            row,
            col: col_field & 0x3FFF,
            row_relative: col_field & 0x8000 != 0,
            col_relative: col_field & 0x4000 != 0,
        }
    }

    fn col_field(&self) -> u16 {
        let mut field = self.col & 0x3FFF;
        if self.col_relative {
            field |= 0x4000;
        }
        if self.row_relative {
            field |= 0x8000;
        }
        field
    }

    /// Resolve an offset address against the cell it is used in
    pub fn resolve_offset(&self, base_row: u32, base_col: u16) -> (u32, u16) {
        let row = if self.row_relative {
            (base_row as i64 + self.row as i16 as i64).rem_euclid(0x1_0000) as u32
        } else {
            self.row as u32
        };
        let col = if self.col_relative {
            (base_col as i64 + (self.col as u8) as i8 as i64).rem_euclid(0x100) as u16
        } else {
            self.col & 0xFF
        };
        (row, col)
    }
}

/// A rectangular area as stored in area tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AreaAddress {
    pub first: RefAddress,
    pub last: RefAddress,
}

/// `tAttr` variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrPtg {
    /// The formula contains a volatile function
    Volatile,
    /// Jump over the true branch of IF when the condition is false
    If { skip: u16 },
    /// Jump table for CHOOSE; one offset per choice plus one past the end
    Choose { offsets: Vec<u16> },
    /// Unconditional jump
    Goto { skip: u16 },
    /// SUM of a single argument
    Sum,
    /// BASIC-style assignment, kept for round trips
    Semi,
    /// Whitespace before the next token
    Space { kind: u8, count: u8 },
}

impl AttrPtg {
    const VOLATILE: u8 = 0x01;
    const IF: u8 = 0x02;
    const CHOOSE: u8 = 0x04;
    const GOTO: u8 = 0x08;
    const SUM: u8 = 0x10;
    const SEMI: u8 = 0x20;
    const SPACE: u8 = 0x40;
}

/// A value inside an array constant
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayConstant {
    Empty,
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),
}

/// A BIFF8 formula token
#[derive(Debug, Clone, PartialEq)]
pub enum Ptg {
    /// Shared or array formula: the formula is stored at (row, col)
    Exp { row: u16, col: u16 },
    /// Data table anchored at (row, col)
    Tbl { row: u16, col: u16 },

    // === Binary operators ===
    Add,
    Sub,
    Mul,
    Div,
    Power,
    Concat,
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
    Ne,
    Isect,
    Union,
    Range,

    // === Unary operators ===
    Uplus,
    Uminus,
    Percent,
    Paren,

    // === Constants ===
    MissArg,
    Str(String),
    Attr(AttrPtg),
    Err(CellError),
    Bool(bool),
    Int(u16),
    Num(f64),
    Array {
        class: OperandClass,
        values: Vec<Vec<ArrayConstant>>,
    },

    // === Functions ===
    Func {
        class: OperandClass,
        index: u16,
    },
    FuncVar {
        class: OperandClass,
        arg_count: u8,
        index: u16,
    },

    // === Names ===
    /// 1-based index into the NAME records
    Name { class: OperandClass, index: u16 },
    /// External name: EXTERNSHEET entry and 1-based EXTERNNAME index
    NameX {
        class: OperandClass,
        extern_sheet: u16,
        index: u16,
    },

    // === References ===
    Ref {
        class: OperandClass,
        address: RefAddress,
    },
    Area {
        class: OperandClass,
        area: AreaAddress,
    },
    RefErr { class: OperandClass },
    AreaErr { class: OperandClass },
    RefN {
        class: OperandClass,
        address: RefAddress,
    },
    AreaN {
        class: OperandClass,
        area: AreaAddress,
    },
    Ref3d {
        class: OperandClass,
        extern_sheet: u16,
        address: RefAddress,
    },
    Area3d {
        class: OperandClass,
        extern_sheet: u16,
        area: AreaAddress,
    },
    RefErr3d {
        class: OperandClass,
        extern_sheet: u16,
    },
    AreaErr3d {
        class: OperandClass,
        extern_sheet: u16,
    },

    // === Memory tokens ===
    /// Precomputed areas; `areas` lives in the extra data
    MemArea {
        class: OperandClass,
        areas: Vec<AreaAddress>,
        size: u16,
    },
    MemErr { class: OperandClass, size: u16 },
    MemNoMem { class: OperandClass, size: u16 },
    MemFunc { class: OperandClass, size: u16 },
}

// Token ids without the operand class bits
const ID_EXP: u8 = 0x01;
const ID_TBL: u8 = 0x02;
const ID_STR: u8 = 0x17;
const ID_ATTR: u8 = 0x19;
const ID_ERR: u8 = 0x1C;
const ID_BOOL: u8 = 0x1D;
const ID_INT: u8 = 0x1E;
const ID_NUM: u8 = 0x1F;
const ID_ARRAY: u8 = 0x00;
const ID_FUNC: u8 = 0x01;
const ID_FUNC_VAR: u8 = 0x02;
const ID_NAME: u8 = 0x03;
const ID_REF: u8 = 0x04;
const ID_AREA: u8 = 0x05;
const ID_MEM_AREA: u8 = 0x06;
const ID_MEM_ERR: u8 = 0x07;
const ID_MEM_NO_MEM: u8 = 0x08;
const ID_MEM_FUNC: u8 = 0x09;
const ID_REF_ERR: u8 = 0x0A;
const ID_AREA_ERR: u8 = 0x0B;
const ID_REF_N: u8 = 0x0C;
const ID_AREA_N: u8 = 0x0D;
const ID_NAME_X: u8 = 0x19;
const ID_REF_3D: u8 = 0x1A;
const ID_AREA_3D: u8 = 0x1B;
const ID_REF_ERR_3D: u8 = 0x1C;
const ID_AREA_ERR_3D: u8 = 0x1D;

/// Simple (class-less) token ids in order from 0x03
const OPERATORS: [Ptg; 20] = [
    Ptg::Add,
    Ptg::Sub,
    Ptg::Mul,
    Ptg::Div,
    Ptg::Power,
    Ptg::Concat,
    Ptg::Lt,
    Ptg::Le,
    Ptg::Eq,
    Ptg::Ge,
    Ptg::Gt,
    Ptg::Ne,
    Ptg::Isect,
    Ptg::Union,
    Ptg::Range,
    Ptg::Uplus,
    Ptg::Uminus,
    Ptg::Percent,
    Ptg::Paren,
    Ptg::MissArg,
];

impl Ptg {
    /// Token id as written to the stream, including the operand class
    pub fn id(&self) -> u8 {
        if let Some(pos) = OPERATORS.iter().position(|op| op == self) {
            return 0x03 + pos as u8;
        }
        match self {
            Ptg::Exp { .. } => ID_EXP,
            Ptg::Tbl { .. } => ID_TBL,
            Ptg::Str(_) => ID_STR,
            Ptg::Attr(_) => ID_ATTR,
            Ptg::Err(_) => ID_ERR,
            Ptg::Bool(_) => ID_BOOL,
            Ptg::Int(_) => ID_INT,
            Ptg::Num(_) => ID_NUM,
            Ptg::Array { class, .. } => ID_ARRAY | class.bits(),
            Ptg::Func { class, .. } => ID_FUNC | class.bits(),
            Ptg::FuncVar { class, .. } => ID_FUNC_VAR | class.bits(),
            Ptg::Name { class, .. } => ID_NAME | class.bits(),
            Ptg::Ref { class, .. } => ID_REF | class.bits(),
            Ptg::Area { class, .. } => ID_AREA | class.bits(),
            Ptg::MemArea { class, .. } => ID_MEM_AREA | class.bits(),
            Ptg::MemErr { class, .. } => ID_MEM_ERR | class.bits(),
            Ptg::MemNoMem { class, .. } => ID_MEM_NO_MEM | class.bits(),
            Ptg::MemFunc { class, .. } => ID_MEM_FUNC | class.bits(),
            Ptg::RefErr { class } => ID_REF_ERR | class.bits(),
            Ptg::AreaErr { class } => ID_AREA_ERR | class.bits(),
            Ptg::RefN { class, .. } => ID_REF_N | class.bits(),
            Ptg::AreaN { class, .. } => ID_AREA_N | class.bits(),
            Ptg::NameX { class, .. } => ID_NAME_X | class.bits(),
            Ptg::Ref3d { class, .. } => ID_REF_3D | class.bits(),
            Ptg::Area3d { class, .. } => ID_AREA_3D | class.bits(),
            Ptg::RefErr3d { class, .. } => ID_REF_ERR_3D | class.bits(),
            Ptg::AreaErr3d { class, .. } => ID_AREA_ERR_3D | class.bits(),
            _ => 0,
        }
    }

    /// Encoded size in the token stream, excluding any extra data
    pub fn size(&self) -> usize {
        match self {
            Ptg::Exp { .. } | Ptg::Tbl { .. } => 5,
            Ptg::Str(s) => {
                let units = s.encode_utf16().count();
                3 + if is_compressible(s) { units } else { units * 2 }
            }
            Ptg::Attr(AttrPtg::Choose { offsets }) => 4 + offsets.len() * 2,
            Ptg::Attr(_) => 4,
            Ptg::Err(_) | Ptg::Bool(_) => 2,
            Ptg::Int(_) => 3,
            Ptg::Num(_) => 9,
            Ptg::Array { .. } => 8,
            Ptg::Func { .. } => 3,
            Ptg::FuncVar { .. } => 4,
            Ptg::Name { .. } => 5,
            Ptg::NameX { .. } => 7,
            Ptg::Ref { .. } | Ptg::RefN { .. } | Ptg::RefErr { .. } => 5,
            Ptg::Area { .. } | Ptg::AreaN { .. } | Ptg::AreaErr { .. } => 9,
            Ptg::Ref3d { .. } | Ptg::RefErr3d { .. } => 7,
            Ptg::Area3d { .. } | Ptg::AreaErr3d { .. } => 11,
            Ptg::MemArea { .. }
            | Ptg::MemErr { .. }
            | Ptg::MemNoMem { .. } => 7,
            Ptg::MemFunc { .. } => 3,
            _ => 1,
        }
    }

    /// Whether the token is a binary operator
    pub fn is_binary_operator(&self) -> bool {
        OPERATORS[..15].contains(self)
    }
}

/// Whether every UTF-16 unit fits in one byte
fn is_compressible(s: &str) -> bool {
    s.chars().all(|c| (c as u32) <= 0xFF)
}

/// A token stream and the extra data that follows it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedFormula {
    /// Token bytes (`rgce`); its length is the record's `cce`
    pub tokens: Vec<u8>,
    /// Array constants and memory areas (`rgcb`)
    pub extra: Vec<u8>,
}

impl EncodedFormula {
    /// Tokens followed by the extra data, as stored in FORMULA and NAME records
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.tokens.clone();
        out.extend_from_slice(&self.extra);
        out
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn take(&mut self, n: usize) -> FormulaResult<&'a [u8]> {
        let end = self.pos + n;
        let bytes = self.data.get(self.pos..end).ok_or_else(|| {
            FormulaError::Token(format!(
                "token data truncated at offset {} (need {} bytes, have {})",
                self.pos,
                n,
                self.data.len().saturating_sub(self.pos)
            ))
        })?;
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> FormulaResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> FormulaResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn f64(&mut self) -> FormulaResult<f64> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(f64::from_le_bytes(raw))
    }

    fn chars(&mut self, count: usize, wide: bool) -> FormulaResult<String> {
        if wide {
            let bytes = self.take(count * 2)?;
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            Ok(String::from_utf16_lossy(&units))
        } else {
            Ok(self.take(count)?.iter().map(|&b| b as char).collect())
        }
    }

    fn ref_address(&mut self) -> FormulaResult<RefAddress> {
        let row = self.u16()?;
        let col = self.u16()?;
        Ok(RefAddress::from_fields(row, col))
    }

    fn area_address(&mut self) -> FormulaResult<AreaAddress> {
        let first_row = self.u16()?;
        let last_row = self.u16()?;
        let first_col = self.u16()?;
        let last_col = self.u16()?;
        Ok(AreaAddress {
            first: RefAddress::from_fields(first_row, first_col),
            last: RefAddress::from_fields(last_row, last_col),
        })
    }
}

fn cell_error(code: u8) -> FormulaResult<CellError> {
    CellError::from_code(code)
        .ok_or_else(|| FormulaError::Token(format!("unknown error code 0x{:02X}", code)))
}

/// Decode a token stream
///
/// `extra` is the data following the tokens in the record; array constants
/// and memory areas are read from it in token order.
pub fn decode_rgce(tokens: &[u8], extra: &[u8]) -> FormulaResult<Vec<Ptg>> {
    let mut input = Cursor::new(tokens);
    let mut extra = Cursor::new(extra);
    let mut out = Vec::new();

    while !input.is_empty() {
        let offset = input.pos;
        let id = input.u8()?;
        let ptg = match id {
            ID_EXP => Ptg::Exp {
                row: input.u16()?,
                col: input.u16()?,
            },
            ID_TBL => Ptg::Tbl {
                row: input.u16()?,
                col: input.u16()?,
            },
            0x03..=0x16 => OPERATORS[(id - 0x03) as usize].clone(),
            ID_STR => {
                let count = input.u8()? as usize;
                let flags = input.u8()?;
                Ptg::Str(input.chars(count, flags & 0x01 != 0)?)
            }
            ID_ATTR => Ptg::Attr(decode_attr(&mut input)?),
            ID_ERR => Ptg::Err(cell_error(input.u8()?)?),
            ID_BOOL => Ptg::Bool(input.u8()? != 0),
            ID_INT => Ptg::Int(input.u16()?),
            ID_NUM => Ptg::Num(input.f64()?),
            0x20..=0x7F => decode_classed(id, &mut input, &mut extra)?,
            _ => {
                return Err(FormulaError::Token(format!(
                    "unsupported token 0x{:02X} at offset {}",
                    id, offset
                )))
            }
        };
        out.push(ptg);
    }
    Ok(out)
}

fn decode_attr(input: &mut Cursor) -> FormulaResult<AttrPtg> {
    let flags = input.u8()?;
    let data = input.u16()?;
    Ok(if flags & AttrPtg::SPACE != 0 {
        AttrPtg::Space {
            kind: (data & 0xFF) as u8,
            count: (data >> 8) as u8,
        }
    } else if flags & AttrPtg::CHOOSE != 0 {
        let mut offsets = Vec::with_capacity(data as usize + 1);
        for _ in 0..=data {
            offsets.push(input.u16()?);
        }
        AttrPtg::Choose { offsets }
    } else if flags & AttrPtg::IF != 0 {
        AttrPtg::If { skip: data }
    } else if flags & AttrPtg::GOTO != 0 {
        AttrPtg::Goto { skip: data }
    } else if flags & AttrPtg::SUM != 0 {
        AttrPtg::Sum
    } else if flags & AttrPtg::SEMI != 0 {
        AttrPtg::Semi
    } else if flags & AttrPtg::VOLATILE != 0 {
        AttrPtg::Volatile
    } else {
        return Err(FormulaError::Token(format!(
            "unknown tAttr flags 0x{:02X}",
            flags
        )));
    })
}

fn decode_classed(id: u8, input: &mut Cursor, extra: &mut Cursor) -> FormulaResult<Ptg> {
    let class = OperandClass::from_id(id);
    Ok(match id & 0x1F {
        ID_ARRAY => {
            input.take(7)?;
            Ptg::Array {
                class,
                values: decode_array_values(extra)?,
            }
        }
        ID_FUNC => Ptg::Func {
            class,
            index: input.u16()?,
        },
        ID_FUNC_VAR => {
            let arg_count = input.u8()? & 0x7F;
            let index = input.u16()? & 0x7FFF;
            Ptg::FuncVar {
                class,
                arg_count,
                index,
            }
        }
        ID_NAME => {
            let index = input.u16()?;
            input.take(2)?;
            Ptg::Name { class, index }
        }
        ID_REF => Ptg::Ref {
            class,
            address: input.ref_address()?,
        },
        ID_AREA => Ptg::Area {
            class,
            area: input.area_address()?,
        },
        ID_MEM_AREA => {
            input.take(4)?;
            let size = input.u16()?;
            let count = extra.u16()?;
            let mut areas = Vec::with_capacity(count as usize);
            for _ in 0..count {
                areas.push(extra.area_address()?);
            }
            Ptg::MemArea { class, areas, size }
        }
        ID_MEM_ERR | ID_MEM_NO_MEM => {
            input.take(4)?;
            let size = input.u16()?;
            if id & 0x1F == ID_MEM_ERR {
                Ptg::MemErr { class, size }
            } else {
                Ptg::MemNoMem { class, size }
            }
        }
        ID_MEM_FUNC => Ptg::MemFunc {
            class,
            size: input.u16()?,
        },
        ID_REF_ERR => {
            input.take(4)?;
            Ptg::RefErr { class }
        }
        ID_AREA_ERR => {
            input.take(8)?;
            Ptg::AreaErr { class }
        }
        ID_REF_N => Ptg::RefN {
            class,
            address: input.ref_address()?,
        },
        ID_AREA_N => Ptg::AreaN {
            class,
            area: input.area_address()?,
        },
        ID_NAME_X => {
            let extern_sheet = input.u16()?;
            let index = input.u16()?;
            input.take(2)?;
            Ptg::NameX {
                class,
                extern_sheet,
                index,
            }
        }
        ID_REF_3D => Ptg::Ref3d {
            class,
            extern_sheet: input.u16()?,
            address: input.ref_address()?,
        },
        ID_AREA_3D => Ptg::Area3d {
            class,
            extern_sheet: input.u16()?,
            area: input.area_address()?,
        },
        ID_REF_ERR_3D => {
            let extern_sheet = input.u16()?;
            input.take(4)?;
            Ptg::RefErr3d {
                class,
                extern_sheet,
            }
        }
        ID_AREA_ERR_3D => {
            let extern_sheet = input.u16()?;
            input.take(8)?;
            Ptg::AreaErr3d {
                class,
                extern_sheet,
            }
        }
        _ => {
            return Err(FormulaError::Token(format!(
                "unsupported token 0x{:02X} at offset {}",
                id,
                input.pos - 1
            )))
        }
    })
}

const ARRAY_EMPTY: u8 = 0x00;
const ARRAY_NUMBER: u8 = 0x01;
const ARRAY_STRING: u8 = 0x02;
const ARRAY_BOOLEAN: u8 = 0x04;
const ARRAY_ERROR: u8 = 0x10;

fn decode_array_values(extra: &mut Cursor) -> FormulaResult<Vec<Vec<ArrayConstant>>> {
    let cols = extra.u8()? as usize + 1;
    let rows = extra.u16()? as usize + 1;
    let mut values = Vec::with_capacity(rows);
    for _ in 0..rows {
        let mut row = Vec::with_capacity(cols);
        for _ in 0..cols {
            let kind = extra.u8()?;
            row.push(match kind {
                ARRAY_EMPTY => {
                    extra.take(8)?;
                    ArrayConstant::Empty
                }
                ARRAY_NUMBER => ArrayConstant::Number(extra.f64()?),
                ARRAY_STRING => {
                    let count = extra.u16()? as usize;
                    let flags = extra.u8()?;
                    ArrayConstant::String(extra.chars(count, flags & 0x01 != 0)?)
                }
                ARRAY_BOOLEAN => {
                    let b = extra.take(8)?;
                    ArrayConstant::Boolean(b[0] != 0)
                }
                ARRAY_ERROR => {
                    let b = extra.take(8)?;
                    ArrayConstant::Error(cell_error(b[0])?)
                }
                other => {
                    return Err(FormulaError::Token(format!(
                        "unknown array constant type 0x{:02X}",
                        other
                    )))
                }
            });
        }
        values.push(row);
    }
    Ok(values)
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_ref(out: &mut Vec<u8>, address: &RefAddress) {
    put_u16(out, address.row);
    put_u16(out, address.col_field());
}

fn put_area(out: &mut Vec<u8>, area: &AreaAddress) {
    put_u16(out, area.first.row);
    put_u16(out, area.last.row);
    put_u16(out, area.first.col_field());
    put_u16(out, area.last.col_field());
}

fn put_chars(out: &mut Vec<u8>, s: &str) {
    if is_compressible(s) {
        out.push(0x00);
        out.extend(s.chars().map(|c| c as u8));
    } else {
        out.push(0x01);
        for unit in s.encode_utf16() {
            put_u16(out, unit);
        }
    }
}

/// Encode a token stream and its extra data
pub fn encode_rgce(ptgs: &[Ptg]) -> EncodedFormula {
    let mut out = EncodedFormula::default();
    for ptg in ptgs {
        encode_ptg(ptg, &mut out);
    }
    out
}

fn encode_ptg(ptg: &Ptg, out: &mut EncodedFormula) {
    let buf = &mut out.tokens;
    buf.push(ptg.id());
    match ptg {
        Ptg::Exp { row, col } | Ptg::Tbl { row, col } => {
            put_u16(buf, *row);
            put_u16(buf, *col);
        }
        Ptg::Str(s) => {
            buf.push(s.encode_utf16().count().min(255) as u8);
            put_chars(buf, s);
        }
        Ptg::Attr(attr) => encode_attr(attr, buf),
        Ptg::Err(e) => buf.push(e.code()),
        Ptg::Bool(b) => buf.push(*b as u8),
        Ptg::Int(n) => put_u16(buf, *n),
        Ptg::Num(n) => buf.extend_from_slice(&n.to_le_bytes()),
        Ptg::Array { values, .. } => {
            buf.extend_from_slice(&[0; 7]);
            encode_array_values(values, &mut out.extra);
        }
        Ptg::Func { index, .. } => put_u16(buf, *index),
        Ptg::FuncVar {
            arg_count, index, ..
        } => {
            buf.push(*arg_count);
            put_u16(buf, *index);
        }
        Ptg::Name { index, .. } => {
            put_u16(buf, *index);
            put_u16(buf, 0);
        }
        Ptg::NameX {
            extern_sheet,
            index,
            ..
        } => {
            put_u16(buf, *extern_sheet);
            put_u16(buf, *index);
            put_u16(buf, 0);
        }
        Ptg::Ref { address, .. } | Ptg::RefN { address, .. } => put_ref(buf, address),
        Ptg::Area { area, .. } | Ptg::AreaN { area, .. } => put_area(buf, area),
        Ptg::RefErr { .. } => buf.extend_from_slice(&[0; 4]),
        Ptg::AreaErr { .. } => buf.extend_from_slice(&[0; 8]),
        Ptg::Ref3d {
            extern_sheet,
            address,
            ..
        } => {
            put_u16(buf, *extern_sheet);
            put_ref(buf, address);
        }
        Ptg::Area3d {
            extern_sheet, area, ..
        } => {
            put_u16(buf, *extern_sheet);
            put_area(buf, area);
        }
        Ptg::RefErr3d { extern_sheet, .. } => {
            put_u16(buf, *extern_sheet);
            buf.extend_from_slice(&[0; 4]);
        }
        Ptg::AreaErr3d { extern_sheet, .. } => {
            put_u16(buf, *extern_sheet);
            buf.extend_from_slice(&[0; 8]);
        }
        Ptg::MemArea { areas, size, .. } => {
            buf.extend_from_slice(&[0; 4]);
            put_u16(buf, *size);
            put_u16(&mut out.extra, areas.len() as u16);
            for area in areas {
                put_area(&mut out.extra, area);
            }
        }
        Ptg::MemErr { size, .. } | Ptg::MemNoMem { size, .. } => {
            buf.extend_from_slice(&[0; 4]);
            put_u16(buf, *size);
        }
        Ptg::MemFunc { size, .. } => put_u16(buf, *size),
        _ => {}
    }
}

fn encode_attr(attr: &AttrPtg, buf: &mut Vec<u8>) {
    let (flags, data) = match attr {
        AttrPtg::Volatile => (AttrPtg::VOLATILE, 0),
        AttrPtg::If { skip } => (AttrPtg::IF, *skip),
        AttrPtg::Choose { offsets } => (AttrPtg::CHOOSE, offsets.len().saturating_sub(1) as u16),
        AttrPtg::Goto { skip } => (AttrPtg::GOTO, *skip),
        AttrPtg::Sum => (AttrPtg::SUM, 0),
        AttrPtg::Semi => (AttrPtg::SEMI, 0),
        AttrPtg::Space { kind, count } => (AttrPtg::SPACE, (*count as u16) << 8 | *kind as u16),
    };
    buf.push(flags);
    put_u16(buf, data);
    if let AttrPtg::Choose { offsets } = attr {
        for offset in offsets {
            put_u16(buf, *offset);
        }
    }
}

fn encode_array_values(values: &[Vec<ArrayConstant>], extra: &mut Vec<u8>) {
    let cols = values.first().map_or(1, Vec::len).max(1);
    extra.push((cols - 1) as u8);
    put_u16(extra, (values.len().max(1) - 1) as u16);
    for value in values.iter().flatten() {
        match value {
            ArrayConstant::Empty => {
                extra.push(ARRAY_EMPTY);
                extra.extend_from_slice(&[0; 8]);
            }
            ArrayConstant::Number(n) => {
                extra.push(ARRAY_NUMBER);
                extra.extend_from_slice(&n.to_le_bytes());
            }
            ArrayConstant::String(s) => {
                extra.push(ARRAY_STRING);
                put_u16(extra, s.encode_utf16().count() as u16);
                put_chars(extra, s);
            }
            ArrayConstant::Boolean(b) => {
                extra.push(ARRAY_BOOLEAN);
                extra.push(*b as u8);
                extra.extend_from_slice(&[0; 7]);
            }
            ArrayConstant::Error(e) => {
                extra.push(ARRAY_ERROR);
                extra.push(e.code());
                extra.extend_from_slice(&[0; 7]);
            }
        }
    }
}

/// Total encoded size of a token stream (the `cce` field)
pub fn rgce_size(ptgs: &[Ptg]) -> usize {
    ptgs.iter().map(Ptg::size).sum()
}
