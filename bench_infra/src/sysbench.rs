// Copyright © 2026 The node-bench Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Parser for the text `sysbench` prints after a `cpu` or `fileio` run.
//!
//! The output is classified into one of two schemas by marker text, then
//! every field of that schema is looked up independently. A field missing
//! from the text is missing from the result; only unclassifiable input is an
//! error.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("unsupported benchmark output format")]
    UnsupportedFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Schema {
    Cpu,
    FileIo,
}

impl Schema {
    /// Marker based classification, file I/O first.
    pub fn classify(output: &str) -> Option<Schema> {
        if output.contains("File operations") {
            Some(Schema::FileIo)
        } else if output.contains("CPU speed") || output.contains("events per second") {
            Some(Schema::Cpu)
        } else {
            None
        }
    }

    fn fields(self) -> &'static [Field] {
        match self {
            Schema::Cpu => CPU_FIELDS,
            Schema::FileIo => FILEIO_FIELDS,
        }
    }

    /// Canonical keys of every field this schema can produce, in table order.
    pub fn keys(self) -> impl Iterator<Item = &'static str> {
        self.fields().iter().map(|f| f.key)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Schema::Cpu => write!(f, "cpu"),
            Schema::FileIo => write!(f, "fileio"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Metric {
    Integer(u64),
    Float(f64),
}

impl Metric {
    /// Integer iff the literal has no decimal point.
    fn parse(literal: &str) -> Option<Metric> {
        if literal.contains('.') {
            literal.parse().ok().map(Metric::Float)
        } else {
            literal.parse().ok().map(Metric::Integer)
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Metric::Integer(v) => v as f64,
            Metric::Float(v) => v,
        }
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Metric::Integer(v) => serializer.serialize_u64(*v),
            Metric::Float(v) => serializer.serialize_f64(*v),
        }
    }
}

/// Shape of the number following a field label.
#[derive(Clone, Copy, Debug)]
enum Capture {
    Decimal,
    Integer,
    /// Decimal with a trailing `s` unit.
    Seconds,
    /// First half of an `avg/stddev` pair.
    Avg,
    /// Second half of an `avg/stddev` pair.
    Stddev,
}

struct Field {
    label: &'static str,
    key: &'static str,
    capture: Capture,
}

impl Field {
    const fn new(label: &'static str, key: &'static str, capture: Capture) -> Self {
        Field {
            label,
            key,
            capture,
        }
    }

    fn pattern(&self) -> String {
        let label = regex::escape(self.label);
        match self.capture {
            Capture::Decimal => format!(r"{label}:\s+(\d+\.\d+)"),
            Capture::Integer => format!(r"{label}:\s+(\d+)"),
            Capture::Seconds => format!(r"{label}:\s+(\d+\.\d+)s"),
            Capture::Avg => format!(r"{label}:\s+(\d+\.\d+)"),
            Capture::Stddev => format!(r"{label}:\s+\d+\.\d+/([\d.]+)"),
        }
    }
}

const CPU_FIELDS: &[Field] = &[
    Field::new("events per second", "events_per_second", Capture::Decimal),
    Field::new("total time", "total_time", Capture::Seconds),
    Field::new("total number of events", "total_events", Capture::Integer),
    Field::new("min", "latency_min", Capture::Decimal),
    Field::new("avg", "latency_avg", Capture::Decimal),
    Field::new("max", "latency_max", Capture::Decimal),
    Field::new("95th percentile", "latency_95th", Capture::Decimal),
    Field::new("sum", "latency_sum", Capture::Decimal),
];

const FILEIO_FIELDS: &[Field] = &[
    Field::new("reads/s", "reads/s", Capture::Decimal),
    Field::new("writes/s", "writes/s", Capture::Decimal),
    Field::new("fsyncs/s", "fsyncs/s", Capture::Decimal),
    Field::new("read, MiB/s", "read_mib/s", Capture::Decimal),
    Field::new("written, MiB/s", "written_mib/s", Capture::Decimal),
    Field::new("total time", "total_time", Capture::Seconds),
    Field::new("total number of events", "total_events", Capture::Integer),
    Field::new("min", "latency_min", Capture::Decimal),
    Field::new("avg", "latency_avg", Capture::Decimal),
    Field::new("max", "latency_max", Capture::Decimal),
    Field::new("95th percentile", "latency_95th", Capture::Decimal),
    Field::new("sum", "latency_sum", Capture::Decimal),
    Field::new("events (avg/stddev)", "events_avg", Capture::Avg),
    Field::new("events (avg/stddev)", "events_stddev", Capture::Stddev),
    Field::new("execution time (avg/stddev)", "execution_time_avg", Capture::Avg),
    Field::new(
        "execution time (avg/stddev)",
        "execution_time_stddev",
        Capture::Stddev,
    ),
];

fn compile(fields: &'static [Field]) -> Vec<(&'static str, Regex)> {
    fields
        .iter()
        .map(|f| {
            let re = Regex::new(&f.pattern()).expect("field patterns are valid regexes");
            (f.key, re)
        })
        .collect()
}

static CPU_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> =
    LazyLock::new(|| compile(CPU_FIELDS));
static FILEIO_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> =
    LazyLock::new(|| compile(FILEIO_FIELDS));

/// The numbers extracted from one `sysbench` run, in field table order.
#[derive(Clone, Debug, PartialEq)]
pub struct Metrics {
    schema: Schema,
    values: Vec<(&'static str, Metric)>,
}

impl Metrics {
    pub fn schema(&self) -> Schema {
        self.schema
    }

    pub fn get(&self, key: &str) -> Option<Metric> {
        self.values.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Metric)> + '_ {
        self.values.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Serialize for Metrics {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (key, value) in &self.values {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

pub fn parse(output: &str) -> Result<Metrics, Error> {
    let schema = Schema::classify(output).ok_or(Error::UnsupportedFormat)?;
    let patterns = match schema {
        Schema::Cpu => &*CPU_PATTERNS,
        Schema::FileIo => &*FILEIO_PATTERNS,
    };

    let mut values = Vec::new();
    for (key, re) in patterns {
        let Some(literal) = re.captures(output).and_then(|c| c.get(1)) else {
            continue;
        };
        match Metric::parse(literal.as_str()) {
            Some(metric) => values.push((*key, metric)),
            None => warn!("Ignoring malformed value {:?} for {key}", literal.as_str()),
        }
    }

    Ok(Metrics { schema, values })
}
