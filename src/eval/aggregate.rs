//! Aggregate reduction rules (spec.md §4.6 "Aggregates"): `COUNT`, `SUM`,
//! `AVG`, `MIN`, `MAX`. Each is a small streaming accumulator fed one value
//! at a time by `exec::aggregate`, so no operator needs to materialize the
//! per-group value list just to reduce it.

use crate::value::DataValue;
use std::cmp::Ordering;

pub trait Accumulator: Send {
    fn update(&mut self, value: &DataValue);
    fn finish(&self) -> DataValue;
}

struct CountAccumulator {
    star: bool,
    count: u64,
}

impl Accumulator for CountAccumulator {
    fn update(&mut self, value: &DataValue) {
        if self.star || !value.is_null() {
            self.count += 1;
        }
    }

    fn finish(&self) -> DataValue {
        DataValue::Number(self.count as f64)
    }
}

struct SumAccumulator {
    sum: f64,
    saw_any: bool,
}

impl Accumulator for SumAccumulator {
    fn update(&mut self, value: &DataValue) {
        if let Some(n) = value.as_f64() {
            self.sum += n;
            self.saw_any = true;
        }
    }

    fn finish(&self) -> DataValue {
        if self.saw_any {
            DataValue::Number(self.sum)
        } else {
            DataValue::Null
        }
    }
}

struct AvgAccumulator {
    sum: f64,
    count: u64,
}

impl Accumulator for AvgAccumulator {
    fn update(&mut self, value: &DataValue) {
        if let Some(n) = value.as_f64() {
            self.sum += n;
            self.count += 1;
        }
    }

    fn finish(&self) -> DataValue {
        if self.count == 0 {
            DataValue::Null
        } else {
            DataValue::Number(self.sum / self.count as f64)
        }
    }
}

struct MinMaxAccumulator {
    current: Option<DataValue>,
    is_min: bool,
}

impl Accumulator for MinMaxAccumulator {
    fn update(&mut self, value: &DataValue) {
        if value.is_null() {
            return;
        }
        match &self.current {
            None => self.current = Some(value.clone()),
            Some(cur) => {
                if let Some(ord) = value.compare(cur) {
                    let replace = if self.is_min {
                        ord == Ordering::Less
                    } else {
                        ord == Ordering::Greater
                    };
                    if replace {
                        self.current = Some(value.clone());
                    }
                }
            }
        }
    }

    fn finish(&self) -> DataValue {
        self.current.clone().unwrap_or(DataValue::Null)
    }
}

/// `is_star` distinguishes `COUNT(*)` (counts every row) from `COUNT(x)`
/// (counts non-null `x`); it is ignored by every accumulator but `COUNT`.
pub fn build_accumulator(name: &str, is_star: bool) -> Box<dyn Accumulator> {
    match name.to_uppercase().as_str() {
        "COUNT" => Box::new(CountAccumulator { star: is_star, count: 0 }),
        "SUM" => Box::new(SumAccumulator { sum: 0.0, saw_any: false }),
        "AVG" => Box::new(AvgAccumulator { sum: 0.0, count: 0 }),
        "MIN" => Box::new(MinMaxAccumulator { current: None, is_min: true }),
        "MAX" => Box::new(MinMaxAccumulator { current: None, is_min: false }),
        other => panic!("build_accumulator called with non-aggregate name {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_star_counts_nulls_count_x_skips_them() {
        let mut count_star = build_accumulator("COUNT", true);
        let mut count_x = build_accumulator("COUNT", false);
        for v in [DataValue::Number(1.0), DataValue::Null, DataValue::Number(2.0)] {
            count_star.update(&v);
            count_x.update(&v);
        }
        assert_eq!(count_star.finish(), DataValue::Number(3.0));
        assert_eq!(count_x.finish(), DataValue::Number(2.0));
    }

    #[test]
    fn sum_avg_skip_nulls_empty_is_null() {
        let mut sum = build_accumulator("SUM", false);
        let mut avg = build_accumulator("AVG", false);
        assert_eq!(sum.finish(), DataValue::Null);
        assert_eq!(avg.finish(), DataValue::Null);
        for v in [DataValue::Number(10.0), DataValue::Null, DataValue::Number(20.0)] {
            sum.update(&v);
            avg.update(&v);
        }
        assert_eq!(sum.finish(), DataValue::Number(30.0));
        assert_eq!(avg.finish(), DataValue::Number(15.0));
    }

    #[test]
    fn min_max_ignore_nulls() {
        let mut min = build_accumulator("MIN", false);
        let mut max = build_accumulator("MAX", false);
        for v in [DataValue::Number(3.0), DataValue::Null, DataValue::Number(1.0), DataValue::Number(2.0)] {
            min.update(&v);
            max.update(&v);
        }
        assert_eq!(min.finish(), DataValue::Number(1.0));
        assert_eq!(max.finish(), DataValue::Number(3.0));
    }
}
