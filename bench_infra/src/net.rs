// Copyright © 2026 The node-bench Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use std::sync::LazyLock;

use regex::Regex;

use crate::stats::{mean, percentile};

static IPERF3_SUM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[SUM\].*?\s+(\d+(?:\.\d+)?)\s+(Kbits|Mbits|Gbits)").expect("valid regex")
});
// End of run totals, one per stream plus a [SUM] line when there are
// several streams. The [SUM] line is printed last.
static IPERF3_RECEIVER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\[\s*(?:SUM|\d+)\].*?\s+(\d+(?:\.\d+)?)\s+(Kbits|Mbits|Gbits)/sec.*receiver\s*$",
    )
    .expect("valid regex")
});
static PING_RTT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"time=(\d+\.\d+) ms").expect("valid regex"));
static HPING3_RTT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"rtt=(\d+\.\d+) ms").expect("valid regex"));

fn to_mbits(value: f64, unit: &str) -> f64 {
    match unit {
        "Gbits" => value * 1000.0,
        "Kbits" => value / 1000.0,
        _ => value,
    }
}

/// Bandwidth reported by an `iperf3` client run, in Mbits/sec. This is the
/// receiver total of the whole run; per interval `[SUM]` lines are only used
/// when no total was printed.
pub fn parse_iperf3_bandwidth(output: &str) -> Option<f64> {
    let caps = IPERF3_RECEIVER_RE
        .captures_iter(output)
        .last()
        .or_else(|| IPERF3_SUM_RE.captures_iter(output).last())?;
    let value: f64 = caps[1].parse().ok()?;
    Some(to_mbits(value, &caps[2]))
}

fn rtt_samples(re: &Regex, output: &str) -> Vec<f64> {
    re.captures_iter(output)
        .filter_map(|c| c[1].parse().ok())
        .collect()
}

/// Round-trip times in ms, one per reply line of `ping`.
pub fn parse_ping_rtts(output: &str) -> Vec<f64> {
    rtt_samples(&PING_RTT_RE, output)
}

/// Round-trip times in ms, one per reply line of `hping3`.
pub fn parse_hping3_rtts(output: &str) -> Vec<f64> {
    rtt_samples(&HPING3_RTT_RE, output)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatencySummary {
    pub avg: f64,
    pub p95: f64,
}

pub fn summarize_latency(samples: &[f64]) -> Option<LatencySummary> {
    Some(LatencySummary {
        avg: mean(samples)?,
        p95: percentile(samples, 95.0)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(value: Option<f64>, expected: f64) {
        let value = value.unwrap();
        assert!((value - expected).abs() < 1e-9, "{value} != {expected}");
    }

    const IPERF3_MULTI_STREAM: &str = "\
Connecting to host 10.0.0.2, port 5201
[  5] local 10.0.0.1 port 40000 connected to 10.0.0.2 port 5201
[  7] local 10.0.0.1 port 40002 connected to 10.0.0.2 port 5201
[ ID] Interval           Transfer     Bitrate         Retr
[SUM]   0.00-10.00  sec  2.91 GBytes  2.50 Gbits/sec    0             sender
[SUM]   0.00-10.00  sec  2.90 GBytes  2.49 Gbits/sec                  receiver

iperf Done.
";

    const IPERF3_WITH_INTERVALS: &str = "\
[ ID] Interval           Transfer     Bitrate         Retr
[  5]   0.00-1.00   sec   120 MBytes  1.00 Gbits/sec    0
[  7]   0.00-1.00   sec   119 MBytes  1.00 Gbits/sec    0
[SUM]   0.00-1.00   sec   239 MBytes  2.00 Gbits/sec    0
- - - - - - - - - - - - - - - - - - - - - - - - -
[  5]   1.00-2.00   sec   179 MBytes  1.50 Gbits/sec    0
[  7]   1.00-2.00   sec   179 MBytes  1.50 Gbits/sec    0
[SUM]   1.00-2.00   sec   358 MBytes  3.00 Gbits/sec    0
- - - - - - - - - - - - - - - - - - - - - - - - -
[ ID] Interval           Transfer     Bitrate         Retr
[  5]   0.00-2.00   sec   299 MBytes  1.25 Gbits/sec    0             sender
[  5]   0.00-2.04   sec   297 MBytes  1.24 Gbits/sec                  receiver
[  7]   0.00-2.00   sec   298 MBytes  1.25 Gbits/sec    0             sender
[  7]   0.00-2.04   sec   297 MBytes  1.25 Gbits/sec                  receiver
[SUM]   0.00-2.00   sec   597 MBytes  2.50 Gbits/sec    0             sender
[SUM]   0.00-2.04   sec   594 MBytes  2.49 Gbits/sec                  receiver

iperf Done.
";

    const IPERF3_SINGLE_STREAM: &str = "\
[ ID] Interval           Transfer     Bitrate         Retr
[  5]   0.00-10.00  sec  1.10 GBytes   943 Mbits/sec    0             sender
[  5]   0.00-10.04  sec  1.09 GBytes   938 Mbits/sec                  receiver
";

    const PING_OUTPUT: &str = "\
PING peer (10.0.0.2) 56(84) bytes of data.
64 bytes from 10.0.0.2: icmp_seq=1 ttl=64 time=0.123 ms
64 bytes from 10.0.0.2: icmp_seq=2 ttl=64 time=0.321 ms
64 bytes from 10.0.0.2: icmp_seq=3 ttl=64 time=0.200 ms

--- peer ping statistics ---
3 packets transmitted, 3 received, 0% packet loss, time 2003ms
";

    #[test]
    fn test_iperf3_bandwidth() {
        assert_eq!(parse_iperf3_bandwidth("[SUM] 100 Mbits"), Some(100.0));
        assert_eq!(parse_iperf3_bandwidth("[SUM] 2.5 Gbits"), Some(2500.0));
        assert_close(parse_iperf3_bandwidth(IPERF3_MULTI_STREAM), 2490.0);
        assert_eq!(parse_iperf3_bandwidth(IPERF3_SINGLE_STREAM), Some(938.0));
        assert_eq!(parse_iperf3_bandwidth("[SUM] 800 Kbits"), Some(0.8));
        assert_eq!(parse_iperf3_bandwidth("iperf3: error - unable to connect"), None);
        assert_eq!(parse_iperf3_bandwidth(""), None);
    }

    #[test]
    fn test_iperf3_bandwidth_ignores_intervals() {
        assert_close(parse_iperf3_bandwidth(IPERF3_WITH_INTERVALS), 2490.0);

        // Interrupted before the totals: the latest interval is all there is.
        let totals = IPERF3_WITH_INTERVALS.rfind("[ ID]").unwrap();
        assert_eq!(
            parse_iperf3_bandwidth(&IPERF3_WITH_INTERVALS[..totals]),
            Some(3000.0)
        );
    }

    #[test]
    fn test_rtt_samples() {
        assert_eq!(parse_ping_rtts(PING_OUTPUT), vec![0.123, 0.321, 0.2]);
        assert_eq!(parse_hping3_rtts(PING_OUTPUT), Vec::<f64>::new());
        assert_eq!(
            parse_hping3_rtts(
                "len=46 ip=10.0.0.2 ttl=64 DF id=0 sport=80 flags=SA seq=0 win=64240 rtt=0.456 ms\n\
                 len=46 ip=10.0.0.2 ttl=64 DF id=0 sport=80 flags=SA seq=1 win=64240 rtt=1.500 ms"
            ),
            vec![0.456, 1.5]
        );
    }

    #[test]
    fn test_summarize_latency() {
        assert_eq!(summarize_latency(&[]), None);
        let summary = summarize_latency(&[0.456]).unwrap();
        assert_eq!(summary.avg, 0.456);
        assert_eq!(summary.p95, 0.456);

        let summary = summarize_latency(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert!((summary.avg - 3.0).abs() < 1e-9);
        assert!((summary.p95 - 4.8).abs() < 1e-9);
    }
}
