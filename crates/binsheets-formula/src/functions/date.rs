//! Date and time functions
//!
//! Serials follow the workbook's date system. In the 1900 system serial 60 is
//! Excel's phantom 1900-02-29 and serial 0 reads as 1900-01-00.

use super::number_or;
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use binsheets_core::date::{date_to_excel, datetime_to_excel, excel_to_datetime, DAYS_1900_TO_1904};
use binsheets_core::CellError;
use chrono::{Datelike, Local, NaiveDate};

type Ret = FormulaResult<FormulaValue>;

/// Serial of 9999-12-31, the last date Excel accepts
const MAX_SERIAL_1900: f64 = 2_958_465.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Date formats accepted where a serial is expected
const DATE_TEXT_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d-%b-%Y"];

/// A date serial argument; text is parsed as a number or a date
fn serial_arg(value: &FormulaValue, date_1904: bool) -> Result<f64, CellError> {
    let serial = match value.scalar() {
        FormulaValue::String(s) => {
            let s = s.trim();
            match s.parse::<f64>() {
                Ok(n) => n,
                Err(_) => DATE_TEXT_FORMATS
                    .iter()
                    .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                    .and_then(|date| date_to_excel(date, date_1904))
                    .ok_or(CellError::Value)?,
            }
        }
        other => other.to_number()?,
    };
    let max = if date_1904 {
        MAX_SERIAL_1900 - DAYS_1900_TO_1904
    } else {
        MAX_SERIAL_1900
    };
    if serial < 0.0 || serial >= max + 1.0 {
        return Err(CellError::Num);
    }
    Ok(serial)
}

/// Calendar parts of a serial, honoring 1900-01-00 and 1900-02-29
fn year_month_day(serial: f64, date_1904: bool) -> Result<(i32, u32, u32), CellError> {
    let day = serial.floor();
    if !date_1904 {
        if day == 0.0 {
            return Ok((1900, 1, 0));
        }
        if day == 60.0 {
            return Ok((1900, 2, 29));
        }
    }
    let dt = excel_to_datetime(day, date_1904).ok_or(CellError::Num)?;
    Ok((dt.year(), dt.month(), dt.day()))
}

/// DATE(year, month, day)
///
/// Years below 1900 are offsets from 1900; months and days roll over.
pub fn fn_date(args: &[FormulaValue], ctx: &EvaluationContext) -> Ret {
    let date_1904 = ctx.date_1904();
    let mut year = try_value!(args[0].to_number()).trunc();
    let month = try_value!(args[1].to_number()).trunc();
    let day = try_value!(args[2].to_number()).trunc();

    if year < 1900.0 {
        year += 1900.0;
    }
    if !(1900.0..10000.0).contains(&year) {
        return Ok(FormulaValue::Error(CellError::Num));
    }

    let months = year * 12.0 + month - 1.0;
    let (year, month) = (months.div_euclid(12.0) as i32, months.rem_euclid(12.0) as u32 + 1);
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Ok(FormulaValue::Error(CellError::Num));
    };
    let Some(first_serial) = date_to_excel(first, date_1904) else {
        return Ok(FormulaValue::Error(CellError::Num));
    };

    let serial = first_serial + day - 1.0;
    if serial < 0.0 {
        return Ok(FormulaValue::Error(CellError::Num));
    }
    Ok(FormulaValue::Number(serial))
}

/// TIME(hour, minute, second) as a fraction of a day
pub fn fn_time(args: &[FormulaValue], _ctx: &EvaluationContext) -> Ret {
    let hour = try_value!(args[0].to_number()).trunc();
    let minute = try_value!(args[1].to_number()).trunc();
    let second = try_value!(args[2].to_number()).trunc();
    let total = hour * 3600.0 + minute * 60.0 + second;
    if total < 0.0 {
        return Ok(FormulaValue::Error(CellError::Num));
    }
    Ok(FormulaValue::Number(
        total.rem_euclid(SECONDS_PER_DAY) / SECONDS_PER_DAY,
    ))
}

fn date_part(args: &[FormulaValue], ctx: &EvaluationContext, part: fn((i32, u32, u32)) -> f64) -> Ret {
    let date_1904 = ctx.date_1904();
    let serial = try_value!(serial_arg(&args[0], date_1904));
    let ymd = try_value!(year_month_day(serial, date_1904));
    Ok(FormulaValue::Number(part(ymd)))
}

/// YEAR(serial_number)
pub fn fn_year(args: &[FormulaValue], ctx: &EvaluationContext) -> Ret {
    date_part(args, ctx, |(y, _, _)| y as f64)
}

/// MONTH(serial_number)
pub fn fn_month(args: &[FormulaValue], ctx: &EvaluationContext) -> Ret {
    date_part(args, ctx, |(_, m, _)| m as f64)
}

/// DAY(serial_number)
pub fn fn_day(args: &[FormulaValue], ctx: &EvaluationContext) -> Ret {
    date_part(args, ctx, |(_, _, d)| d as f64)
}

/// Seconds since midnight, rounded to the nearest second
fn seconds_of_day(args: &[FormulaValue], ctx: &EvaluationContext) -> Result<u32, CellError> {
    let serial = serial_arg(&args[0], ctx.date_1904())?;
    let seconds = (serial.fract() * SECONDS_PER_DAY).round() as u32;
    Ok(seconds % SECONDS_PER_DAY as u32)
}

/// HOUR(serial_number)
pub fn fn_hour(args: &[FormulaValue], ctx: &EvaluationContext) -> Ret {
    let seconds = try_value!(seconds_of_day(args, ctx));
    Ok(FormulaValue::Number((seconds / 3600) as f64))
}

/// MINUTE(serial_number)
pub fn fn_minute(args: &[FormulaValue], ctx: &EvaluationContext) -> Ret {
    let seconds = try_value!(seconds_of_day(args, ctx));
    Ok(FormulaValue::Number((seconds / 60 % 60) as f64))
}

/// SECOND(serial_number)
pub fn fn_second(args: &[FormulaValue], ctx: &EvaluationContext) -> Ret {
    let seconds = try_value!(seconds_of_day(args, ctx));
    Ok(FormulaValue::Number((seconds % 60) as f64))
}

/// WEEKDAY(serial_number, [return_type])
///
/// Return types 1 (Sunday = 1), 2 (Monday = 1), 3 (Monday = 0) and
/// 11 to 17 (Monday to Sunday = 1).
pub fn fn_weekday(args: &[FormulaValue], ctx: &EvaluationContext) -> Ret {
    let date_1904 = ctx.date_1904();
    let mut serial = try_value!(serial_arg(&args[0], date_1904)).floor();
    if date_1904 {
        serial += DAYS_1900_TO_1904;
    }
    // 0 = Sunday; serial 1 reads as a Sunday in the 1900 system
    let day = ((serial as i64 + 6) % 7) as f64;
    let return_type = try_value!(number_or(args, 1, 1.0)).trunc() as i64;

    let result = match return_type {
        1 => day + 1.0,
        2 => (day + 6.0) % 7.0 + 1.0,
        3 => (day + 6.0) % 7.0,
        11..=17 => {
            let first = ((return_type - 10) % 7) as f64;
            (day - first).rem_euclid(7.0) + 1.0
        }
        _ => return Ok(FormulaValue::Error(CellError::Num)),
    };
    Ok(FormulaValue::Number(result))
}

/// TODAY()
pub fn fn_today(_args: &[FormulaValue], ctx: &EvaluationContext) -> Ret {
    let today = Local::now().date_naive();
    match date_to_excel(today, ctx.date_1904()) {
        Some(serial) => Ok(FormulaValue::Number(serial)),
        None => Ok(FormulaValue::Error(CellError::Num)),
    }
}

/// NOW()
pub fn fn_now(_args: &[FormulaValue], ctx: &EvaluationContext) -> Ret {
    let now = Local::now().naive_local();
    match datetime_to_excel(now, ctx.date_1904()) {
        Some(serial) => Ok(FormulaValue::Number(serial)),
        None => Ok(FormulaValue::Error(CellError::Num)),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{eval, eval_with, num};
    use crate::evaluator::FormulaValue;
    use binsheets_core::{CellError, Workbook};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_date_serials() {
        assert_eq!(eval("=DATE(1900,1,1)"), num(1.0));
        assert_eq!(eval("=DATE(1900,2,29)"), num(60.0));
        assert_eq!(eval("=DATE(1900,3,1)"), num(61.0));
        assert_eq!(eval("=DATE(2024,1,15)"), num(45306.0));
        assert_eq!(eval("=DATE(2023,14,1)"), eval("=DATE(2024,2,1)"));
        assert_eq!(eval("=DATE(2024,3,0)"), eval("=DATE(2024,2,29)"));
        assert_eq!(eval("=DATE(124,1,15)"), num(45306.0));
        assert_eq!(eval("=DATE(10000,1,1)"), FormulaValue::Error(CellError::Num));
    }

    #[test]
    fn test_date_parts_around_phantom_leap_day() {
        assert_eq!(eval("=DAY(60)"), num(29.0));
        assert_eq!(eval("=MONTH(60)"), num(2.0));
        assert_eq!(eval("=DAY(61)"), num(1.0));
        assert_eq!(eval("=DAY(0)"), num(0.0));
        assert_eq!(eval("=YEAR(45306)"), num(2024.0));
        assert_eq!(eval("=MONTH(\"2024-07-04\")"), num(7.0));
        assert_eq!(eval("=YEAR(-1)"), FormulaValue::Error(CellError::Num));
        assert_eq!(eval("=YEAR(\"soon\")"), FormulaValue::Error(CellError::Value));
    }

    #[test]
    fn test_1904_date_system() {
        let mut wb = Workbook::new();
        wb.settings_mut().date_1904 = true;
        assert_eq!(eval_with(&wb, "=DATE(1904,1,1)"), num(0.0));
        assert_eq!(eval_with(&wb, "=DATE(2024,1,15)"), num(45306.0 - 1462.0));
        assert_eq!(eval_with(&wb, "=YEAR(0)"), num(1904.0));
        assert_eq!(eval_with(&wb, "=WEEKDAY(0)"), num(6.0));
    }

    #[test]
    fn test_time_parts() {
        assert_eq!(eval("=TIME(12,0,0)"), num(0.5));
        assert_eq!(eval("=TIME(25,0,0)"), eval("=TIME(1,0,0)"));
        assert_eq!(eval("=HOUR(0.75)"), num(18.0));
        assert_eq!(eval("=MINUTE(TIME(10,45,30))"), num(45.0));
        assert_eq!(eval("=SECOND(TIME(10,45,30))"), num(30.0));
        assert_eq!(eval("=TIME(-1,0,0)"), FormulaValue::Error(CellError::Num));
    }

    #[test]
    fn test_weekday() {
        // 2024-01-15 was a Monday
        assert_eq!(eval("=WEEKDAY(45306)"), num(2.0));
        assert_eq!(eval("=WEEKDAY(45306,2)"), num(1.0));
        assert_eq!(eval("=WEEKDAY(45306,3)"), num(0.0));
        assert_eq!(eval("=WEEKDAY(45306,16)"), num(3.0));
        assert_eq!(eval("=WEEKDAY(45306,9)"), FormulaValue::Error(CellError::Num));
    }

    #[test]
    fn test_today_is_a_whole_serial() {
        match eval("=TODAY()") {
            FormulaValue::Number(n) => {
                assert_eq!(n.fract(), 0.0);
                assert!(n > 45000.0);
            }
            other => panic!("expected number, got {:?}", other),
        }
    }
}
