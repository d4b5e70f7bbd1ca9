// src/builders/stats_builder.rs
// The registry's minimum viable builder: re-emits the same
// {total_games, by_time_control, by_year} triple the Loader already
// computes, just as a named, file-writing builder in its own right.

use serde_json::{json, Value};

use crate::loader;
use crate::model::ColumnarRow;

use super::Builder;

pub struct StatsBuilder;

impl Builder for StatsBuilder {
    fn name(&self) -> &'static str {
        "stats"
    }

    fn build(&self, rows: &[ColumnarRow]) -> Value {
        let stats = loader::stats_for_rows(rows);
        json!({
            "total_games": stats.total_games,
            "by_time_control": stats.by_time_control,
            "by_year": stats.by_year,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_zero_games() {
        let payload = StatsBuilder.build(&[]);
        assert_eq!(payload["total_games"], 0);
    }
}
