//! Formula AST → BIFF8 tokens

use super::function_table::{function_by_name, FUNCTION_ADDIN, VOLATILE};
use super::{rgce_size, AreaAddress, ArrayConstant, AttrPtg, OperandClass, Ptg, RefAddress};
use crate::ast::{BinaryOperator, FormulaExpr, NameReference, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use binsheets_core::{CellAddress, CellRange};

/// Workbook lookups needed to tokenize a formula
pub trait FormulaParsingWorkbook {
    /// EXTERNSHEET index for a sheet name
    fn extern_sheet_index(&self, sheet: &str) -> Option<u16>;

    /// 1-based NAME record index of a defined name
    fn name_index(&self, name: &NameReference) -> Option<u16>;

    /// EXTERNSHEET index and 1-based EXTERNNAME index of an add-in function
    fn addin_function(&self, name: &str) -> Option<(u16, u16)>;
}

const MAX_STRING_LEN: usize = 255;

/// Size of the FuncVar token ending IF and CHOOSE
const FUNC_VAR_SIZE: usize = 4;
const GOTO_SIZE: usize = 4;

/// Tokenize a formula
///
/// References that are function arguments get the reference class, other
/// operands the value class, array constants the array class.
pub fn compile(expr: &FormulaExpr, workbook: &dyn FormulaParsingWorkbook) -> FormulaResult<Vec<Ptg>> {
    let mut out = Vec::new();
    if is_volatile(expr) {
        out.push(Ptg::Attr(AttrPtg::Volatile));
    }
    Compiler { workbook }.emit(expr, OperandClass::Value, &mut out)?;
    Ok(out)
}

fn is_volatile(expr: &FormulaExpr) -> bool {
    let mut volatile = false;
    expr.walk(&mut |node| {
        if let FormulaExpr::Function { name, .. } = node {
            volatile |= VOLATILE.contains(&name.as_str());
        }
    });
    volatile
}

struct Compiler<'a> {
    workbook: &'a dyn FormulaParsingWorkbook,
}

impl Compiler<'_> {
    fn emit(&self, expr: &FormulaExpr, class: OperandClass, out: &mut Vec<Ptg>) -> FormulaResult<()> {
        match expr {
            FormulaExpr::Number(n) => out.push(number(*n)),
            FormulaExpr::String(s) => {
                if s.encode_utf16().count() > MAX_STRING_LEN {
                    return Err(FormulaError::Argument(format!(
                        "string constant longer than {} characters",
                        MAX_STRING_LEN
                    )));
                }
                out.push(Ptg::Str(s.clone()));
            }
            FormulaExpr::Boolean(b) => out.push(Ptg::Bool(*b)),
            FormulaExpr::Error(e) => out.push(Ptg::Err(*e)),
            FormulaExpr::Missing => out.push(Ptg::MissArg),
            FormulaExpr::Array(rows) => {
                let mut values = Vec::with_capacity(rows.len());
                for row in rows {
                    values.push(row.iter().map(array_constant).collect::<FormulaResult<Vec<_>>>()?);
                }
                out.push(Ptg::Array {
                    class: OperandClass::Array,
                    values,
                });
            }

            FormulaExpr::CellRef(r) => {
                let address = ref_address(&r.address);
                out.push(match &r.sheet {
                    Some(sheet) => Ptg::Ref3d {
                        class,
                        extern_sheet: self.extern_sheet(sheet)?,
                        address,
                    },
                    None => Ptg::Ref { class, address },
                });
            }
            FormulaExpr::RangeRef(r) => {
                let area = area_address(&r.range);
                out.push(match &r.sheet {
                    Some(sheet) => Ptg::Area3d {
                        class,
                        extern_sheet: self.extern_sheet(sheet)?,
                        area,
                    },
                    None => Ptg::Area { class, area },
                });
            }
            FormulaExpr::NameRef(name) => {
                let index = self.workbook.name_index(name).ok_or_else(|| {
                    FormulaError::InvalidReference(format!("undefined name '{}'", name.name))
                })?;
                out.push(Ptg::Name { class, index });
            }

            FormulaExpr::BinaryOp { op, left, right } => {
                let operand_class = match op {
                    BinaryOperator::Range | BinaryOperator::Union | BinaryOperator::Intersect => {
                        OperandClass::Reference
                    }
                    _ => OperandClass::Value,
                };
                self.emit(left, operand_class, out)?;
                self.emit(right, operand_class, out)?;
                out.push(binary_token(*op));
            }
            FormulaExpr::UnaryOp { op, operand } => {
                self.emit(operand, OperandClass::Value, out)?;
                out.push(match op {
                    UnaryOperator::Plus => Ptg::Uplus,
                    UnaryOperator::Negate => Ptg::Uminus,
                    UnaryOperator::Percent => Ptg::Percent,
                });
            }
            FormulaExpr::Function { name, args } => self.emit_function(name, args, out)?,
        }
        Ok(())
    }

    fn extern_sheet(&self, sheet: &str) -> FormulaResult<u16> {
        self.workbook
            .extern_sheet_index(sheet)
            .ok_or_else(|| FormulaError::InvalidReference(format!("unknown sheet '{}'", sheet)))
    }

    fn emit_args(&self, args: &[FormulaExpr]) -> FormulaResult<Vec<Vec<Ptg>>> {
        args.iter()
            .map(|arg| {
                let mut tokens = Vec::new();
                self.emit(arg, OperandClass::Reference, &mut tokens)?;
                Ok(tokens)
            })
            .collect()
    }

    fn emit_function(&self, name: &str, args: &[FormulaExpr], out: &mut Vec<Ptg>) -> FormulaResult<()> {
        let Some(meta) = function_by_name(name) else {
            return self.emit_addin(name, args, out);
        };
        if args.len() < meta.min_args as usize || args.len() > meta.max_args as usize {
            return Err(FormulaError::ArgumentCount {
                function: meta.name.to_string(),
                expected: if meta.is_fixed_arity() {
                    meta.min_args.to_string()
                } else {
                    format!("{} to {}", meta.min_args, meta.max_args)
                },
                actual: args.len(),
            });
        }

        let compiled = self.emit_args(args)?;
        let call = if meta.is_fixed_arity() {
            Ptg::Func {
                class: OperandClass::Value,
                index: meta.index,
            }
        } else {
            Ptg::FuncVar {
                class: OperandClass::Value,
                arg_count: args.len() as u8,
                index: meta.index,
            }
        };

        match meta.name {
            "IF" => emit_if(compiled, call, out),
            "CHOOSE" => emit_choose(compiled, call, out),
            "SUM" if compiled.len() == 1 => {
                out.extend(compiled.into_iter().flatten());
                out.push(Ptg::Attr(AttrPtg::Sum));
            }
            _ => {
                out.extend(compiled.into_iter().flatten());
                out.push(call);
            }
        }
        Ok(())
    }

    fn emit_addin(&self, name: &str, args: &[FormulaExpr], out: &mut Vec<Ptg>) -> FormulaResult<()> {
        let (extern_sheet, index) = self
            .workbook
            .addin_function(name)
            .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;
        if args.len() >= 30 {
            return Err(FormulaError::ArgumentCount {
                function: name.to_string(),
                expected: "at most 29".into(),
                actual: args.len(),
            });
        }
        out.push(Ptg::NameX {
            class: OperandClass::Reference,
            extern_sheet,
            index,
        });
        out.extend(self.emit_args(args)?.into_iter().flatten());
        out.push(Ptg::FuncVar {
            class: OperandClass::Value,
            arg_count: args.len() as u8 + 1,
            index: FUNCTION_ADDIN,
        });
        Ok(())
    }
}

/// `cond tAttrIf true tAttrGoto [false tAttrGoto] FuncVar`
///
/// Skips count the bytes after the jump token, landing on the last byte of
/// the closing FuncVar.
fn emit_if(args: Vec<Vec<Ptg>>, call: Ptg, out: &mut Vec<Ptg>) {
    let mut args = args.into_iter();
    let condition = args.next().unwrap_or_default();
    let when_true = args.next().unwrap_or_default();
    let when_false = args.next();

    out.extend(condition);
    out.push(Ptg::Attr(AttrPtg::If {
        skip: (rgce_size(&when_true) + GOTO_SIZE) as u16,
    }));
    let false_len = when_false
        .as_ref()
        .map_or(0, |tokens| rgce_size(tokens) + GOTO_SIZE);
    out.extend(when_true);
    out.push(Ptg::Attr(AttrPtg::Goto {
        skip: (false_len + FUNC_VAR_SIZE - 1) as u16,
    }));
    if let Some(tokens) = when_false {
        out.extend(tokens);
        out.push(Ptg::Attr(AttrPtg::Goto {
            skip: (FUNC_VAR_SIZE - 1) as u16,
        }));
    }
    out.push(call);
}

/// `index tAttrChoose (choice tAttrGoto)* FuncVar`
///
/// Jump table offsets count from the start of the table; the last one
/// points at the FuncVar.
fn emit_choose(args: Vec<Vec<Ptg>>, call: Ptg, out: &mut Vec<Ptg>) {
    let mut args = args.into_iter();
    out.extend(args.next().unwrap_or_default());
    let choices: Vec<Vec<Ptg>> = args.collect();

    let table_len = (choices.len() + 1) * 2;
    let mut offsets = Vec::with_capacity(choices.len() + 1);
    let mut offset = table_len;
    for choice in &choices {
        offsets.push(offset as u16);
        offset += rgce_size(choice) + GOTO_SIZE;
    }
    offsets.push(offset as u16);
    out.push(Ptg::Attr(AttrPtg::Choose { offsets }));

    let mut remaining: usize = choices.iter().map(|c| rgce_size(c) + GOTO_SIZE).sum();
    for choice in choices {
        remaining -= rgce_size(&choice) + GOTO_SIZE;
        out.extend(choice);
        out.push(Ptg::Attr(AttrPtg::Goto {
            skip: (remaining + FUNC_VAR_SIZE - 1) as u16,
        }));
    }
    out.push(call);
}

fn number(n: f64) -> Ptg {
    if n.fract() == 0.0 && (0.0..=u16::MAX as f64).contains(&n) && !(n == 0.0 && n.is_sign_negative()) {
        Ptg::Int(n as u16)
    } else {
        Ptg::Num(n)
    }
}

fn array_constant(expr: &FormulaExpr) -> FormulaResult<ArrayConstant> {
    Ok(match expr {
        FormulaExpr::Number(n) => ArrayConstant::Number(*n),
        FormulaExpr::String(s) => ArrayConstant::String(s.clone()),
        FormulaExpr::Boolean(b) => ArrayConstant::Boolean(*b),
        FormulaExpr::Error(e) => ArrayConstant::Error(*e),
        FormulaExpr::Missing => ArrayConstant::Empty,
        other => {
            return Err(FormulaError::Argument(format!(
                "array constants must be literals, got {}",
                other
            )))
        }
    })
}

fn ref_address(addr: &CellAddress) -> RefAddress {
    RefAddress::new(addr.row as u16, addr.col, !addr.row_absolute, !addr.col_absolute)
}

fn area_address(range: &CellRange) -> AreaAddress {
    AreaAddress {
        first: ref_address(&range.start),
        last: ref_address(&range.end),
    }
}

fn binary_token(op: BinaryOperator) -> Ptg {
    match op {
        BinaryOperator::Add => Ptg::Add,
        BinaryOperator::Subtract => Ptg::Sub,
        BinaryOperator::Multiply => Ptg::Mul,
        BinaryOperator::Divide => Ptg::Div,
        BinaryOperator::Power => Ptg::Power,
        BinaryOperator::Equal => Ptg::Eq,
        BinaryOperator::NotEqual => Ptg::Ne,
        BinaryOperator::LessThan => Ptg::Lt,
        BinaryOperator::LessEqual => Ptg::Le,
        BinaryOperator::GreaterThan => Ptg::Gt,
        BinaryOperator::GreaterEqual => Ptg::Ge,
        BinaryOperator::Concat => Ptg::Concat,
        BinaryOperator::Range => Ptg::Range,
        BinaryOperator::Union => Ptg::Union,
        BinaryOperator::Intersect => Ptg::Isect,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::parser::parse_formula;
    use crate::ptg::encode_rgce;
    use pretty_assertions::assert_eq;

    /// Sheets "Sheet1" and "Data" are EXTERNSHEET 0 and 1; "Rate" is name 1;
    /// IFERROR is the first add-in function
    pub(crate) struct TestBook;

    impl FormulaParsingWorkbook for TestBook {
        fn extern_sheet_index(&self, sheet: &str) -> Option<u16> {
            ["Sheet1", "Data"]
                .iter()
                .position(|s| s.eq_ignore_ascii_case(sheet))
                .map(|i| i as u16)
        }

        fn name_index(&self, name: &NameReference) -> Option<u16> {
            name.name.eq_ignore_ascii_case("Rate").then_some(1)
        }

        fn addin_function(&self, name: &str) -> Option<(u16, u16)> {
            (name == "IFERROR").then_some((2, 1))
        }
    }

    fn tokens(formula: &str) -> Vec<Ptg> {
        compile(&parse_formula(formula).unwrap(), &TestBook).unwrap()
    }

    #[test]
    fn test_operators_in_rpn_order() {
        let ptgs = tokens("=A1+B1*2");
        assert_eq!(ptgs.len(), 5);
        assert!(matches!(ptgs[0], Ptg::Ref { class: OperandClass::Value, .. }));
        assert_eq!(ptgs[2..], [Ptg::Int(2), Ptg::Mul, Ptg::Add]);
        assert_eq!(tokens("=-1.5")[..], [Ptg::Num(1.5), Ptg::Uminus]);
    }

    #[test]
    fn test_function_encodings() {
        assert_eq!(
            tokens("=ROUND(1,2)")[2],
            Ptg::Func {
                class: OperandClass::Value,
                index: 27
            }
        );
        assert_eq!(
            tokens("=MAX(1,2,3)")[3],
            Ptg::FuncVar {
                class: OperandClass::Value,
                arg_count: 3,
                index: 7
            }
        );
        let sum = tokens("=SUM(A1:B2)");
        assert!(matches!(sum[0], Ptg::Area { class: OperandClass::Reference, .. }));
        assert_eq!(sum[1], Ptg::Attr(AttrPtg::Sum));
        assert_eq!(tokens("=NOW()")[0], Ptg::Attr(AttrPtg::Volatile));
    }

    #[test]
    fn test_addin_function_uses_name_x() {
        let ptgs = tokens("=IFERROR(1/0,0)");
        assert_eq!(
            ptgs.first(),
            Some(&Ptg::NameX {
                class: OperandClass::Reference,
                extern_sheet: 2,
                index: 1
            })
        );
        assert_eq!(
            ptgs.last(),
            Some(&Ptg::FuncVar {
                class: OperandClass::Value,
                arg_count: 3,
                index: FUNCTION_ADDIN
            })
        );
        assert!(matches!(
            compile(&parse_formula("=NOSUCH(1)").unwrap(), &TestBook),
            Err(FormulaError::UnknownFunction(_))
        ));
    }

    #[test]
    fn test_if_skip_offsets() {
        // 1 tAttrIf "a" tAttrGoto "b" tAttrGoto tFuncVar
        let ptgs = tokens("=IF(1,\"a\",\"b\")");
        assert_eq!(ptgs[1], Ptg::Attr(AttrPtg::If { skip: 4 + 4 }));
        assert_eq!(ptgs[3], Ptg::Attr(AttrPtg::Goto { skip: 4 + 4 + 3 }));
        assert_eq!(ptgs[5], Ptg::Attr(AttrPtg::Goto { skip: 3 }));

        // the jump lands on the last byte of the FuncVar
        let bytes = encode_rgce(&ptgs).tokens;
        let after_first_goto = 3 + 4 + 4 + 4;
        assert_eq!(after_first_goto + 11, bytes.len() - 1);
    }

    #[test]
    fn test_choose_jump_table() {
        let ptgs = tokens("=CHOOSE(2,10,20)");
        assert_eq!(
            ptgs[1],
            Ptg::Attr(AttrPtg::Choose {
                offsets: vec![6, 6 + 3 + 4, 6 + 2 * (3 + 4)]
            })
        );
        assert_eq!(ptgs[3], Ptg::Attr(AttrPtg::Goto { skip: 3 + 4 + 3 }));
        assert_eq!(ptgs[5], Ptg::Attr(AttrPtg::Goto { skip: 3 }));
    }

    #[test]
    fn test_three_d_references_and_names() {
        let ptgs = tokens("='Data'!B2+Rate");
        assert!(matches!(ptgs[0], Ptg::Ref3d { extern_sheet: 1, .. }));
        assert!(matches!(ptgs[1], Ptg::Name { index: 1, .. }));
        assert!(matches!(
            compile(&parse_formula("=Missing!A1").unwrap(), &TestBook),
            Err(FormulaError::InvalidReference(_))
        ));
        assert!(matches!(
            compile(&parse_formula("=Undefined*2").unwrap(), &TestBook),
            Err(FormulaError::InvalidReference(_))
        ));
    }

    #[test]
    fn test_arity_is_checked() {
        assert!(matches!(
            compile(&parse_formula("=ROUND(1)").unwrap(), &TestBook),
            Err(FormulaError::ArgumentCount { .. })
        ));
    }
}
