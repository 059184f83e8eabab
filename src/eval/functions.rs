//! Built-in scalar function library (spec.md §4.4/§4.6): string, array,
//! and date/time functions. `CAST` is not here — it is its own AST node
//! (`Expr::Cast`) and is evaluated in `eval::cast`.

use crate::error::ExecutorError;
use crate::value::DataValue;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};

const DATE_FMT: &str = "%Y-%m-%d";
const TIME_FMT: &str = "%H:%M:%S%.3f";
const DATETIME_FMT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

pub fn call_scalar(name: &str, args: &[DataValue]) -> Result<DataValue, ExecutorError> {
    match name.to_uppercase().as_str() {
        "UPPER" => Ok(string_unary(&args[0], |s| s.to_uppercase())),
        "LOWER" => Ok(string_unary(&args[0], |s| s.to_lowercase())),
        "LENGTH" => Ok(match args[0].as_str() {
            Some(s) => DataValue::Number(s.chars().count() as f64),
            None if args[0].is_null() => DataValue::Null,
            None => DataValue::Null,
        }),
        "TRIM" => Ok(string_unary(&args[0], |s| s.trim().to_string())),
        "CONCAT" => Ok(concat(args)),
        "SUBSTRING" => substring(args),
        "ARRAY_LENGTH" | "CARDINALITY" => Ok(match args[0].as_array() {
            Some(items) => DataValue::Number(items.len() as f64),
            None => DataValue::Null,
        }),
        "ARRAY_POSITION" => Ok(array_position(&args[0], &args[1])),
        "ARRAY_SORT" => Ok(array_sort(&args[0])),
        "CURRENT_DATE" => Ok(DataValue::String(Utc::now().format(DATE_FMT).to_string())),
        "CURRENT_TIME" => Ok(DataValue::String(Utc::now().format(TIME_FMT).to_string())),
        "CURRENT_TIMESTAMP" => Ok(DataValue::String(Utc::now().format(DATETIME_FMT).to_string())),
        "DATE_ADD" => Ok(date_add_days(&args[0], &args[1])),
        "DATE_SUB" => Ok(date_add_days(&args[0], &neg(&args[1]))),
        "DATE_DIFF" => Ok(date_diff(&args[0], &args[1])),
        other => Err(ExecutorError::runtime(format!("unimplemented built-in function \"{other}\""))),
    }
}

fn string_unary(v: &DataValue, f: impl FnOnce(&str) -> String) -> DataValue {
    match v.as_str() {
        Some(s) => DataValue::String(f(s)),
        None => DataValue::Null,
    }
}

fn concat(args: &[DataValue]) -> DataValue {
    let mut out = String::new();
    for a in args {
        if a.is_null() {
            return DataValue::Null;
        }
        out.push_str(&a.to_string());
    }
    DataValue::String(out)
}

/// `SUBSTRING(s, start[, len])`, 1-based and clamped to the string's
/// bounds (spec.md §4.6 supplement — the two call shapes a usable
/// `SUBSTRING` must support).
fn substring(args: &[DataValue]) -> Result<DataValue, ExecutorError> {
    let Some(s) = args[0].as_str() else {
        return Ok(DataValue::Null);
    };
    let Some(start) = args[1].as_f64() else {
        return Ok(DataValue::Null);
    };
    let chars: Vec<char> = s.chars().collect();
    let len_total = chars.len() as i64;
    let start_idx = (start as i64 - 1).clamp(0, len_total);
    let end_idx = if args.len() == 3 {
        let Some(len) = args[2].as_f64() else {
            return Ok(DataValue::Null);
        };
        (start_idx + (len as i64).max(0)).clamp(0, len_total)
    } else {
        len_total
    };
    if end_idx <= start_idx {
        return Ok(DataValue::String(String::new()));
    }
    let out: String = chars[start_idx as usize..end_idx as usize].iter().collect();
    Ok(DataValue::String(out))
}

fn array_position(haystack: &DataValue, needle: &DataValue) -> DataValue {
    if needle.is_null() {
        return DataValue::Null;
    }
    let Some(items) = haystack.as_array() else {
        return DataValue::Null;
    };
    for (i, item) in items.iter().enumerate() {
        if item.equals(needle) == Some(true) {
            return DataValue::Number((i + 1) as f64);
        }
    }
    DataValue::Null
}

/// Ascending sort with NULLs last; never mutates the input (spec.md §4.6,
/// §8 "ARRAY_SORT is idempotent ... never mutates its input").
fn array_sort(v: &DataValue) -> DataValue {
    let Some(items) = v.as_array() else {
        return DataValue::Null;
    };
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| match (a.is_null(), b.is_null()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => a.compare(b).unwrap_or(std::cmp::Ordering::Equal),
    });
    DataValue::Array(sorted)
}

fn neg(v: &DataValue) -> DataValue {
    match v.as_f64() {
        Some(n) => DataValue::Number(-n),
        None => DataValue::Null,
    }
}

/// Parses either a bare date (`YYYY-MM-DD`) or the ISO datetime this
/// engine emits (`YYYY-MM-DDTHH:MM:SS.sssZ`).
enum Parsed {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

fn parse_datelike(s: &str) -> Option<Parsed> {
    if let Ok(d) = NaiveDate::parse_from_str(s, DATE_FMT) {
        return Some(Parsed::Date(d));
    }
    let trimmed = s.trim_end_matches('Z');
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Parsed::DateTime(dt));
    }
    None
}

fn date_add_days(date: &DataValue, days: &DataValue) -> DataValue {
    let (Some(s), Some(n)) = (date.as_str(), days.as_f64()) else {
        return DataValue::Null;
    };
    match parse_datelike(s) {
        Some(Parsed::Date(d)) => match d.checked_add_signed(Duration::days(n as i64)) {
            Some(d2) => DataValue::String(d2.format(DATE_FMT).to_string()),
            None => DataValue::Null,
        },
        Some(Parsed::DateTime(dt)) => match dt.checked_add_signed(Duration::days(n as i64)) {
            Some(dt2) => DataValue::String(format!("{}Z", dt2.format("%Y-%m-%dT%H:%M:%S%.3f"))),
            None => DataValue::Null,
        },
        None => DataValue::Null,
    }
}

fn date_diff(a: &DataValue, b: &DataValue) -> DataValue {
    let (Some(sa), Some(sb)) = (a.as_str(), b.as_str()) else {
        return DataValue::Null;
    };
    match (parse_datelike(sa), parse_datelike(sb)) {
        (Some(Parsed::Date(da)), Some(Parsed::Date(db))) => {
            DataValue::Number((da - db).num_days() as f64)
        }
        (Some(pa), Some(pb)) => {
            let dta = to_datetime(pa);
            let dtb = to_datetime(pb);
            DataValue::Number((dta - dtb).num_seconds() as f64 / 86400.0)
        }
        _ => DataValue::Null,
    }
}

fn to_datetime(p: Parsed) -> NaiveDateTime {
    match p {
        Parsed::Date(d) => d.and_hms_opt(0, 0, 0).unwrap(),
        Parsed::DateTime(dt) => dt,
    }
}

/// Calendar-aware `date ± INTERVAL n unit` (spec.md §4.6): month/year
/// arithmetic preserves day-of-month where possible, clamping into the
/// target month when it doesn't (Jan 31 + 1 month -> Feb 28/29).
pub fn add_interval_months(date: &DataValue, months: i64) -> DataValue {
    let Some(s) = date.as_str() else { return DataValue::Null };
    match parse_datelike(s) {
        Some(Parsed::Date(d)) => DataValue::String(shift_months(d, months).format(DATE_FMT).to_string()),
        Some(Parsed::DateTime(dt)) => {
            let shifted = shift_months(dt.date(), months);
            let time = dt.time();
            DataValue::String(format!(
                "{}Z",
                NaiveDateTime::new(shifted, time).format("%Y-%m-%dT%H:%M:%S%.3f")
            ))
        }
        None => DataValue::Null,
    }
}

fn shift_months(d: NaiveDate, months: i64) -> NaiveDate {
    let total = d.year() as i64 * 12 + (d.month() as i64 - 1) + months;
    let year = total.div_euclid(12) as i32;
    let month = (total.rem_euclid(12) + 1) as u32;
    let day = d.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (ny, nm) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(ny, nm, 1)
        .unwrap()
        .pred_opt()
        .unwrap()
        .day()
}

pub fn add_interval_duration(date: &DataValue, duration: Duration) -> DataValue {
    let Some(s) = date.as_str() else { return DataValue::Null };
    match parse_datelike(s) {
        Some(Parsed::Date(d)) => {
            let dt = NaiveDateTime::new(d, NaiveTime::from_hms_opt(0, 0, 0).unwrap());
            match dt.checked_add_signed(duration) {
                Some(dt2) if dt2.time() == NaiveTime::from_hms_opt(0, 0, 0).unwrap() => {
                    DataValue::String(dt2.date().format(DATE_FMT).to_string())
                }
                Some(dt2) => DataValue::String(format!("{}Z", dt2.format("%Y-%m-%dT%H:%M:%S%.3f"))),
                None => DataValue::Null,
            }
        }
        Some(Parsed::DateTime(dt)) => match dt.checked_add_signed(duration) {
            Some(dt2) => DataValue::String(format!("{}Z", dt2.format("%Y-%m-%dT%H:%M:%S%.3f"))),
            None => DataValue::Null,
        },
        None => DataValue::Null,
    }
}

/// `LIKE` pattern matching (spec.md §4.6): `%` matches any sequence, `_`
/// any single character, anchored to the whole value, case-sensitive.
pub fn like_matches(value: &str, pattern: &str) -> bool {
    let v: Vec<char> = value.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    let mut memo = vec![vec![None; p.len() + 1]; v.len() + 1];
    like_rec(&v, &p, 0, 0, &mut memo)
}

fn like_rec(v: &[char], p: &[char], vi: usize, pi: usize, memo: &mut Vec<Vec<Option<bool>>>) -> bool {
    if let Some(cached) = memo[vi][pi] {
        return cached;
    }
    let result = if pi == p.len() {
        vi == v.len()
    } else {
        match p[pi] {
            '%' => (vi..=v.len()).any(|k| like_rec(v, p, k, pi + 1, memo)),
            '_' => vi < v.len() && like_rec(v, p, vi + 1, pi + 1, memo),
            c => vi < v.len() && v[vi] == c && like_rec(v, p, vi + 1, pi + 1, memo),
        }
    };
    memo[vi][pi] = Some(result);
    result
}
